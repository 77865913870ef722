//! Detector-driven pre-labelling.
//!
//! This module owns everything that talks to a pose detector: the
//! [`Detector`] seam and its command-line implementation, the batch
//! pre-label pipeline, and the background job used by an interactive
//! session. Label text handling stays in `crate::ir` and `crate::fixup`.

pub mod batch;
pub mod detector;
pub mod job;

pub use batch::{auto_annotate, BatchOptions, BatchSummary, ColumnCheck};
pub use detector::{Detector, PredictRequest, YoloCli};
pub use job::{run_interactive, AutoLabelJob, AutoLabelReport, AutoLabelRequest, JobState};

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::KplabelError;
use crate::layout::list_label_files;

/// Run name used for every detector invocation.
pub const RUN_NAME: &str = "predictions";

/// Moves every label file in `from` into `to`, replacing files of the same
/// name. Returns the moved destinations in file-name order.
pub(crate) fn move_label_files(from: &Path, to: &Path) -> Result<Vec<PathBuf>, KplabelError> {
    let mut moved = Vec::new();
    for file in list_label_files(from)? {
        let Some(name) = file.file_name() else {
            continue;
        };
        let target = to.join(name);
        move_file(&file, &target)?;
        moved.push(target);
    }
    Ok(moved)
}

/// Renames `from` to `to`, falling back to copy and delete across
/// file systems.
pub(crate) fn move_file(from: &Path, to: &Path) -> Result<(), KplabelError> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to).map_err(|source| KplabelError::FileAccess {
        path: to.to_path_buf(),
        source,
    })?;
    fs::remove_file(from).map_err(|source| KplabelError::FileAccess {
        path: from.to_path_buf(),
        source,
    })
}

pub(crate) fn create_dir(path: &Path) -> Result<(), KplabelError> {
    fs::create_dir_all(path).map_err(|source| KplabelError::FileAccess {
        path: path.to_path_buf(),
        source,
    })
}
