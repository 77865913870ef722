//! One labelling workspace: an image folder, its label folder, the category
//! registry and the annotation session of the selected image.
//!
//! This is the surface an interactive front end drives. Selecting an image
//! loads its labels, edits go through [`EditCommand`], saving encodes the
//! session back to disk, and a finished auto-label run is normalized and
//! reloaded.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::autolabel::{AutoLabelJob, AutoLabelReport, AutoLabelRequest, Detector, JobState};
use crate::error::KplabelError;
use crate::fixup::fix_precision_in_dir;
use crate::ir::io_yolo_pose::{read_label_file, write_label_file};
use crate::ir::{CategoryRegistry, ClassId, ImageSize, VisibilityPolicy};
use crate::layout::{label_path_for, list_images, read_image_size, resolve_labels_dir};
use crate::session::{AnnotationSession, EditCommand, EditOutcome};

#[derive(Debug, Default)]
pub struct Workspace {
    registry: CategoryRegistry,
    session: AnnotationSession,
    policy: VisibilityPolicy,
    image_dir: Option<PathBuf>,
    labels_override: Option<PathBuf>,
    images: Vec<PathBuf>,
    current: Option<usize>,
    image_size: Option<ImageSize>,
    job: AutoLabelJob,
}

impl Workspace {
    pub fn new(registry: CategoryRegistry) -> Self {
        Self {
            registry,
            ..Self::default()
        }
    }

    pub fn with_policy(mut self, policy: VisibilityPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn registry(&self) -> &CategoryRegistry {
        &self.registry
    }

    pub fn session(&self) -> &AnnotationSession {
        &self.session
    }

    pub fn images(&self) -> &[PathBuf] {
        &self.images
    }

    pub fn current_image(&self) -> Option<&Path> {
        self.current
            .and_then(|idx| self.images.get(idx))
            .map(PathBuf::as_path)
    }

    pub fn image_size(&self) -> Option<ImageSize> {
        self.image_size
    }

    pub fn add_category<S: Into<String>>(
        &mut self,
        name: &str,
        keypoints: Vec<S>,
    ) -> Result<ClassId, KplabelError> {
        self.registry.add_category(name, keypoints)
    }

    pub fn edit_category<S: Into<String>>(
        &mut self,
        class_id: ClassId,
        name: &str,
        keypoints: Vec<S>,
    ) -> Result<(), KplabelError> {
        self.registry.edit_category(class_id, name, keypoints)
    }

    /// Lists the images of `dir` and deselects everything. Returns the
    /// number of images found.
    pub fn open_image_dir(&mut self, dir: &Path) -> Result<usize, KplabelError> {
        self.images = list_images(dir)?;
        self.image_dir = Some(dir.to_path_buf());
        self.current = None;
        self.image_size = None;
        self.session.clear();
        tracing::info!(dir = %dir.display(), count = self.images.len(), "opened image directory");
        Ok(self.images.len())
    }

    /// Overrides the conventional label directory; `None` restores it.
    pub fn set_labels_dir(&mut self, dir: Option<PathBuf>) {
        self.labels_override = dir;
    }

    /// Label directory of the open image folder, created if needed.
    pub fn labels_dir(&self) -> Result<PathBuf, KplabelError> {
        let image_dir = self.image_dir.as_deref().ok_or(KplabelError::NoImageSelected)?;
        resolve_labels_dir(image_dir, self.labels_override.as_deref())
    }

    /// Label file of the selected image.
    pub fn label_path(&self) -> Result<PathBuf, KplabelError> {
        let image = self.current_image().ok_or(KplabelError::NoImageSelected)?;
        Ok(label_path_for(&self.labels_dir()?, image))
    }

    /// Selects an image, reads its size and loads its labels if a label
    /// file exists. Without one the session is simply empty.
    pub fn select_image(&mut self, index: usize) -> Result<(), KplabelError> {
        let image = self
            .images
            .get(index)
            .ok_or(KplabelError::ImageIndexOutOfRange {
                index,
                len: self.images.len(),
            })?;
        let size = read_image_size(image)?;

        self.current = Some(index);
        self.image_size = Some(size);
        self.session.clear();

        if self.label_path()?.is_file() {
            self.load_labels(false)?;
        }
        Ok(())
    }

    /// Decodes the selected image's label file into the session.
    ///
    /// A missing file is created empty when `create_if_missing` is set and
    /// reported as `LabelFileMissing` otherwise. A decode failure leaves the
    /// session empty and the registry unchanged.
    pub fn load_labels(&mut self, create_if_missing: bool) -> Result<usize, KplabelError> {
        let size = self.image_size.ok_or(KplabelError::NoImageSelected)?;
        let path = self.label_path()?;

        if !path.is_file() {
            if !create_if_missing {
                return Err(KplabelError::LabelFileMissing { path });
            }
            fs::write(&path, "").map_err(|source| KplabelError::FileAccess {
                path: path.clone(),
                source,
            })?;
            self.session.clear();
            tracing::info!(path = %path.display(), "created empty label file");
            return Ok(0);
        }

        match read_label_file(&path, size, &mut self.registry, self.policy) {
            Ok(annotations) => {
                let count = annotations.len();
                self.session.replace_all(annotations);
                tracing::info!(path = %path.display(), count, "loaded labels");
                Ok(count)
            }
            Err(err) => {
                self.session.clear();
                Err(err)
            }
        }
    }

    /// Encodes the session into the selected image's label file.
    pub fn save_labels(&self) -> Result<PathBuf, KplabelError> {
        let size = self.image_size.ok_or(KplabelError::NoImageSelected)?;
        let path = self.label_path()?;
        write_label_file(&path, self.session.annotations(), &self.registry, size)?;
        tracing::info!(
            path = %path.display(),
            count = self.session.annotations().len(),
            "saved labels"
        );
        Ok(path)
    }

    pub fn apply(&mut self, command: EditCommand) -> Result<EditOutcome, KplabelError> {
        self.session.apply(command, &self.registry)
    }

    /// Hit-tests a normalized position against the active record.
    pub fn hit_test(&self, x: f64, y: f64, radius_px: f64) -> Option<usize> {
        self.session.hit_test(x, y, self.image_size?, radius_px)
    }

    pub fn auto_label_state(&self) -> JobState {
        self.job.state()
    }

    /// Starts an auto-label run over the open image folder.
    pub fn start_auto_label(
        &mut self,
        detector: Arc<dyn Detector>,
        model: &Path,
    ) -> Result<(), KplabelError> {
        if self.job.is_running() {
            return Err(KplabelError::AutoLabelBusy);
        }
        let image_dir = self.image_dir.clone().ok_or(KplabelError::NoImageSelected)?;
        let labels_dir = self.labels_dir()?;
        self.job
            .start(detector, AutoLabelRequest::new(model, &image_dir, &labels_dir))
    }

    /// Non-blocking check for a finished auto-label run.
    pub fn poll_auto_label(&mut self) -> Option<Result<AutoLabelReport, KplabelError>> {
        let outcome = self.job.poll()?;
        Some(self.complete_auto_label(outcome))
    }

    /// Blocks until the running auto-label run finishes.
    pub fn wait_auto_label(&mut self) -> Option<Result<AutoLabelReport, KplabelError>> {
        let outcome = self.job.wait()?;
        Some(self.complete_auto_label(outcome))
    }

    fn complete_auto_label(
        &mut self,
        outcome: Result<AutoLabelReport, KplabelError>,
    ) -> Result<AutoLabelReport, KplabelError> {
        let report = outcome?;
        fix_precision_in_dir(&report.labels_dir)?;
        if self.image_size.is_some() {
            if self.label_path()?.is_file() {
                self.load_labels(false)?;
            } else {
                self.session.clear();
            }
        }
        Ok(report)
    }
}
