use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::KplabelError;

/// One detector run over a directory of images.
///
/// Label files are expected under `<project>/<name>/labels/` and rendered
/// images directly under `<project>/<name>/`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PredictRequest {
    pub model: PathBuf,
    pub source: PathBuf,
    pub project: PathBuf,
    pub name: String,
    pub save_visuals: bool,
    pub save_conf: bool,
}

impl PredictRequest {
    pub fn run_dir(&self) -> PathBuf {
        self.project.join(&self.name)
    }

    pub fn labels_dir(&self) -> PathBuf {
        self.run_dir().join("labels")
    }
}

/// A pose detector that writes one label file per image with detections.
pub trait Detector: Send + Sync {
    fn predict(&self, request: &PredictRequest) -> Result<(), KplabelError>;
}

/// Runs predictions through the Ultralytics `yolo` command line.
#[derive(Clone, Debug)]
pub struct YoloCli {
    program: PathBuf,
}

impl Default for YoloCli {
    fn default() -> Self {
        Self::new("yolo")
    }
}

impl YoloCli {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Arguments passed to the executable for `request`.
    pub fn arguments(request: &PredictRequest) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["predict".into()];
        args.push(key_value("model", request.model.as_os_str()));
        args.push(key_value("source", request.source.as_os_str()));
        args.push(key_value("project", request.project.as_os_str()));
        args.push(format!("name={}", request.name).into());
        args.push("save_txt=True".into());
        args.push(format!("save={}", python_bool(request.save_visuals)).into());
        args.push(format!("save_conf={}", python_bool(request.save_conf)).into());
        args.push("exist_ok=True".into());
        args
    }
}

impl Detector for YoloCli {
    fn predict(&self, request: &PredictRequest) -> Result<(), KplabelError> {
        check_inputs(request)?;

        let args = Self::arguments(request);
        tracing::debug!(program = %self.program.display(), ?args, "running detector");

        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|err| match err.kind() {
                ErrorKind::NotFound => KplabelError::ModelInvocation(format!(
                    "detector executable '{}' was not found",
                    self.program.display()
                )),
                _ => KplabelError::ModelInvocation(format!(
                    "failed to start '{}': {err}",
                    self.program.display()
                )),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = stderr
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .unwrap_or("no error output");
            return Err(KplabelError::ModelInvocation(format!(
                "'{}' exited with {}: {}",
                self.program.display(),
                output.status,
                detail.trim()
            )));
        }

        Ok(())
    }
}

/// Fails when the model file or the image source is missing.
pub(crate) fn check_inputs(request: &PredictRequest) -> Result<(), KplabelError> {
    if !request.model.is_file() {
        return Err(KplabelError::ModelInvocation(format!(
            "model file not found: {}",
            request.model.display()
        )));
    }
    if !request.source.exists() {
        return Err(KplabelError::ModelInvocation(format!(
            "image source not found: {}",
            request.source.display()
        )));
    }
    Ok(())
}

fn key_value(key: &str, value: &std::ffi::OsStr) -> OsString {
    let mut arg = OsString::from(key);
    arg.push("=");
    arg.push(value);
    arg
}

fn python_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}
