use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::detector::{Detector, PredictRequest};
use super::{create_dir, move_label_files, RUN_NAME};
use crate::error::KplabelError;

/// Inputs of an interactive auto-label run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AutoLabelRequest {
    pub model: PathBuf,
    pub image_dir: PathBuf,
    pub labels_dir: PathBuf,
}

/// Result of a finished interactive run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AutoLabelReport {
    pub labels_dir: PathBuf,
    /// Label files moved into `labels_dir`.
    pub moved: Vec<PathBuf>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JobState {
    #[default]
    Idle,
    Running,
}

/// Runs the detector over `request.image_dir` into a scratch project and
/// moves the produced labels into `request.labels_dir`.
///
/// No rendered images and no confidence column are requested. Existing
/// label files of the same name are replaced.
pub fn run_interactive(
    detector: &dyn Detector,
    request: &AutoLabelRequest,
) -> Result<AutoLabelReport, KplabelError> {
    let scratch = tempfile::Builder::new().prefix("auto_annot_").tempdir()?;
    let predict = PredictRequest {
        model: request.model.clone(),
        source: request.image_dir.clone(),
        project: scratch.path().to_path_buf(),
        name: RUN_NAME.to_string(),
        save_visuals: false,
        save_conf: false,
    };

    detector.predict(&predict)?;

    create_dir(&request.labels_dir)?;
    let produced = predict.labels_dir();
    let moved = if produced.is_dir() {
        move_label_files(&produced, &request.labels_dir)?
    } else {
        Vec::new()
    };

    tracing::info!(
        count = moved.len(),
        labels_dir = %request.labels_dir.display(),
        "auto-label run finished"
    );
    Ok(AutoLabelReport {
        labels_dir: request.labels_dir.clone(),
        moved,
    })
}

type JobOutcome = Result<AutoLabelReport, KplabelError>;

/// A single auto-label run on a worker thread.
///
/// Only one run may be in flight; completion is observed by polling from
/// the owning thread.
#[derive(Debug, Default)]
pub struct AutoLabelJob {
    state: JobState,
    result_rx: Option<Receiver<JobOutcome>>,
    handle: Option<JoinHandle<()>>,
}

impl AutoLabelJob {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == JobState::Running
    }

    /// Spawns the worker. Fails with `AutoLabelBusy` while a run is active.
    pub fn start(
        &mut self,
        detector: Arc<dyn Detector>,
        request: AutoLabelRequest,
    ) -> Result<(), KplabelError> {
        if self.is_running() {
            return Err(KplabelError::AutoLabelBusy);
        }

        let (result_tx, result_rx) = mpsc::channel::<JobOutcome>();
        let handle = thread::Builder::new()
            .name("auto-label".to_string())
            .spawn(move || {
                tracing::debug!(image_dir = %request.image_dir.display(), "auto-label worker started");
                let outcome = run_interactive(detector.as_ref(), &request);
                // The receiver is gone only if the job was dropped.
                let _ = result_tx.send(outcome);
            })?;

        self.result_rx = Some(result_rx);
        self.handle = Some(handle);
        self.state = JobState::Running;
        Ok(())
    }

    /// Non-blocking. Returns the outcome once, when the worker has finished.
    pub fn poll(&mut self) -> Option<JobOutcome> {
        let rx = self.result_rx.as_ref()?;
        let outcome = match rx.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err(worker_lost()),
        };
        self.finish();
        Some(outcome)
    }

    /// Blocks until the running worker finishes. Returns `None` when idle.
    pub fn wait(&mut self) -> Option<JobOutcome> {
        let rx = self.result_rx.as_ref()?;
        let outcome = rx.recv().unwrap_or_else(|_| Err(worker_lost()));
        self.finish();
        Some(outcome)
    }

    fn finish(&mut self) {
        self.result_rx = None;
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("auto-label worker panicked");
            }
        }
        self.state = JobState::Idle;
    }
}

fn worker_lost() -> KplabelError {
    KplabelError::ModelInvocation("auto-label worker stopped without a result".to_string())
}

impl AutoLabelRequest {
    pub fn new(model: &Path, image_dir: &Path, labels_dir: &Path) -> Self {
        Self {
            model: model.to_path_buf(),
            image_dir: image_dir.to_path_buf(),
            labels_dir: labels_dir.to_path_buf(),
        }
    }
}
