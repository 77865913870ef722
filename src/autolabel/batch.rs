//! Batch pre-labelling of an unlabelled image folder.
//!
//! The pipeline runs the detector once over `source`, forces the produced
//! label files to a fixed column count, and gathers the result under
//! `output`:
//!
//! ```text
//! <output>/labels/   label files
//! <output>/images/   copies of the source images that received labels
//! <output>/vis/      rendered predictions (optional)
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::detector::{check_inputs, Detector, PredictRequest};
use super::{create_dir, move_file, move_label_files, RUN_NAME};
use crate::error::KplabelError;
use crate::fixup::{fix_columns_in_dir, DEFAULT_EXPECTED_COLUMNS};
use crate::layout::{has_extension, list_label_files};

/// Extensions probed, in order, when looking up the source image of a label.
const SOURCE_IMAGE_EXTENSIONS: [&str; 8] =
    ["jpg", "jpeg", "png", "bmp", "JPG", "JPEG", "PNG", "BMP"];

/// Extensions of rendered prediction images.
const VISUAL_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// Inputs of a batch run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchOptions {
    pub model: PathBuf,
    pub source: PathBuf,
    pub output: PathBuf,
    pub save_visuals: bool,
    pub save_conf: bool,
    pub expected_columns: usize,
}

impl BatchOptions {
    pub fn new(model: impl Into<PathBuf>, source: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            model: model.into(),
            source: source.into(),
            output: output.into(),
            save_visuals: true,
            save_conf: true,
            expected_columns: DEFAULT_EXPECTED_COLUMNS,
        }
    }

    pub fn labels_dir(&self) -> PathBuf {
        self.output.join("labels")
    }

    pub fn images_dir(&self) -> PathBuf {
        self.output.join("images")
    }

    pub fn vis_dir(&self) -> PathBuf {
        self.output.join("vis")
    }
}

/// Column count of the first line of one produced label file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnCheck {
    pub file: PathBuf,
    pub columns: usize,
    pub expected: usize,
}

impl ColumnCheck {
    pub fn is_ok(&self) -> bool {
        self.columns == self.expected
    }
}

/// What a batch run produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchSummary {
    pub labels_dir: PathBuf,
    pub images_dir: PathBuf,
    pub vis_dir: Option<PathBuf>,
    pub labels_count: usize,
    pub images_count: usize,
    pub vis_count: usize,
    /// Lines rewritten by the column fix-up.
    pub lines_fixed: usize,
    /// Label files whose source image could not be found.
    pub missing_images: Vec<String>,
    pub sample: Option<ColumnCheck>,
}

/// Runs `detector` over `options.source` and collects the results under
/// `options.output`.
pub fn auto_annotate(
    detector: &dyn Detector,
    options: &BatchOptions,
) -> Result<BatchSummary, KplabelError> {
    let request = PredictRequest {
        model: options.model.clone(),
        source: options.source.clone(),
        project: options.output.clone(),
        name: RUN_NAME.to_string(),
        save_visuals: options.save_visuals,
        save_conf: options.save_conf,
    };
    check_inputs(&request)?;
    if !options.source.is_dir() {
        return Err(KplabelError::ModelInvocation(format!(
            "image source is not a directory: {}",
            options.source.display()
        )));
    }

    let labels_dir = options.labels_dir();
    let images_dir = options.images_dir();
    let vis_dir = options.save_visuals.then(|| options.vis_dir());
    create_dir(&labels_dir)?;
    create_dir(&images_dir)?;
    if let Some(vis_dir) = &vis_dir {
        create_dir(vis_dir)?;
    }

    tracing::info!(
        model = %options.model.display(),
        source = %options.source.display(),
        output = %options.output.display(),
        expected_columns = options.expected_columns,
        "starting batch pre-label run"
    );
    detector.predict(&request)?;

    let run_dir = request.run_dir();
    let predicted_labels = request.labels_dir();
    let mut lines_fixed = 0;
    let mut missing_images = Vec::new();

    if predicted_labels.is_dir() {
        lines_fixed = fix_columns_in_dir(&predicted_labels, options.expected_columns)?.lines_changed;
        missing_images = copy_source_images(&predicted_labels, &options.source, &images_dir)?;
        let moved = move_label_files(&predicted_labels, &labels_dir)?;
        tracing::info!(count = moved.len(), "moved label files");
        let _ = fs::remove_dir(&predicted_labels);
    }

    if let Some(vis_dir) = &vis_dir {
        if run_dir.is_dir() {
            let moved = move_visuals(&run_dir, vis_dir)?;
            tracing::info!(count = moved, "moved rendered predictions");
        }
    }

    if run_dir.is_dir() && fs::remove_dir(&run_dir).is_err() {
        tracing::info!(path = %run_dir.display(), "prediction directory is not empty; left in place");
    }

    let label_files = list_label_files(&labels_dir)?;
    let sample = match label_files.first() {
        Some(file) => Some(check_columns(file, options.expected_columns)?),
        None => None,
    };
    if let Some(check) = &sample {
        if !check.is_ok() {
            tracing::warn!(
                file = %check.file.display(),
                columns = check.columns,
                expected = check.expected,
                "sample label has an unexpected column count"
            );
        }
    }

    let summary = BatchSummary {
        labels_count: label_files.len(),
        images_count: count_files_with_extension(&images_dir)?,
        vis_count: match &vis_dir {
            Some(dir) => count_files_with_extension(dir)?,
            None => 0,
        },
        labels_dir,
        images_dir,
        vis_dir,
        lines_fixed,
        missing_images,
        sample,
    };
    tracing::info!(
        labels = summary.labels_count,
        images = summary.images_count,
        vis = summary.vis_count,
        "batch pre-label run finished"
    );
    Ok(summary)
}

/// Copies the source image of every label in `labels_dir` into `images_dir`.
/// Returns the names of label files without a matching image.
fn copy_source_images(
    labels_dir: &Path,
    source: &Path,
    images_dir: &Path,
) -> Result<Vec<String>, KplabelError> {
    let mut missing = Vec::new();
    let mut copied = 0;

    for label in list_label_files(labels_dir)? {
        let Some(stem) = label.file_stem().map(|stem| stem.to_string_lossy().into_owned()) else {
            continue;
        };

        let found = SOURCE_IMAGE_EXTENSIONS
            .iter()
            .map(|ext| format!("{stem}.{ext}"))
            .find(|name| source.join(name).is_file());

        match found {
            Some(name) => {
                fs::copy(source.join(&name), images_dir.join(&name)).map_err(|source_err| {
                    KplabelError::FileAccess {
                        path: images_dir.join(&name),
                        source: source_err,
                    }
                })?;
                copied += 1;
            }
            None => {
                let name = label.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or(stem);
                tracing::warn!(label = %name, "no source image found for label file");
                missing.push(name);
            }
        }
    }

    tracing::info!(count = copied, "copied labelled source images");
    Ok(missing)
}

fn move_visuals(run_dir: &Path, vis_dir: &Path) -> Result<usize, KplabelError> {
    let mut moved = 0;
    for path in files_in(run_dir)? {
        if has_extension(&path, &VISUAL_EXTENSIONS) {
            if let Some(name) = path.file_name() {
                move_file(&path, &vis_dir.join(name))?;
                moved += 1;
            }
        }
    }
    Ok(moved)
}

fn check_columns(file: &Path, expected: usize) -> Result<ColumnCheck, KplabelError> {
    let text = fs::read_to_string(file).map_err(|source| KplabelError::FileAccess {
        path: file.to_path_buf(),
        source,
    })?;
    let columns = text
        .lines()
        .next()
        .map(|line| line.split_whitespace().count())
        .unwrap_or(0);
    Ok(ColumnCheck {
        file: file.to_path_buf(),
        columns,
        expected,
    })
}

fn count_files_with_extension(dir: &Path) -> Result<usize, KplabelError> {
    Ok(files_in(dir)?
        .iter()
        .filter(|path| path.extension().is_some())
        .count())
}

fn files_in(dir: &Path) -> Result<Vec<PathBuf>, KplabelError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|source| KplabelError::FileAccess {
            path: dir.to_path_buf(),
            source: source.into(),
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autolabel::testing::{FailingDetector, FakeDetector};

    struct Fixture {
        _temp: tempfile::TempDir,
        options: BatchOptions,
    }

    fn fixture(images: &[&str]) -> Fixture {
        let temp = tempfile::tempdir().expect("create temp dir");
        let source = temp.path().join("raw");
        fs::create_dir_all(&source).unwrap();
        for name in images {
            fs::write(source.join(name), b"img").unwrap();
        }
        let model = temp.path().join("last.pt");
        fs::write(&model, b"weights").unwrap();
        let options = BatchOptions::new(model, source, temp.path().join("out"));
        Fixture {
            _temp: temp,
            options,
        }
    }

    #[test]
    fn collects_labels_images_and_visuals() {
        let fx = fixture(&["a.jpg", "b.PNG", "c.jpg"]);
        let mut detector = FakeDetector::new(&[
            ("a", "0 0.5 0.5 0.2 0.2 0.1 0.1 0.2 0.2 0.3 0.3 0.4 0.4 0.93\n"),
            ("b", "0 0.5 0.5 0.2 0.2\n"),
        ]);
        detector.visuals = vec!["a.jpg".into(), "b.png".into()];

        let summary = auto_annotate(&detector, &fx.options).expect("batch run");

        assert_eq!(detector.calls(), 1);
        assert_eq!(summary.labels_count, 2);
        assert_eq!(summary.images_count, 2);
        assert_eq!(summary.vis_count, 2);
        assert_eq!(summary.lines_fixed, 2);
        assert!(summary.missing_images.is_empty());
        assert!(fx.options.images_dir().join("b.PNG").is_file());
        assert!(!fx.options.images_dir().join("c.jpg").exists());

        let a = fs::read_to_string(fx.options.labels_dir().join("a.txt")).unwrap();
        assert_eq!(a.split_whitespace().count(), 13);
        let check = summary.sample.expect("sample check");
        assert!(check.is_ok());
        assert_eq!(check.file, fx.options.labels_dir().join("a.txt"));

        assert!(!fx.options.output.join(RUN_NAME).exists());
    }

    #[test]
    fn reports_labels_without_source_images() {
        let fx = fixture(&["a.jpg"]);
        let detector = FakeDetector::new(&[("a", "0 0 0 0 0\n"), ("ghost", "0 0 0 0 0\n")]);
        let mut options = fx.options.clone();
        options.save_visuals = false;

        let summary = auto_annotate(&detector, &options).expect("batch run");
        assert_eq!(summary.missing_images, vec!["ghost.txt".to_string()]);
        assert_eq!(summary.labels_count, 2);
        assert_eq!(summary.images_count, 1);
        assert_eq!(summary.vis_dir, None);
        assert!(!options.vis_dir().exists());
    }

    #[test]
    fn detections_free_run_yields_empty_summary() {
        let fx = fixture(&["a.jpg"]);
        let summary = auto_annotate(&FakeDetector::new(&[]), &fx.options).expect("batch run");
        assert_eq!(summary.labels_count, 0);
        assert_eq!(summary.sample, None);
    }

    #[test]
    fn missing_model_fails_before_creating_output() {
        let fx = fixture(&[]);
        let mut options = fx.options.clone();
        options.model = options.output.join("missing.pt");

        let err = auto_annotate(&FakeDetector::new(&[]), &options).unwrap_err();
        assert!(matches!(err, KplabelError::ModelInvocation(_)));
        assert!(!options.labels_dir().exists());
    }

    #[test]
    fn detector_failure_propagates() {
        let fx = fixture(&["a.jpg"]);
        let err = auto_annotate(&FailingDetector, &fx.options).unwrap_err();
        assert!(matches!(err, KplabelError::ModelInvocation(msg) if msg.contains("corrupt")));
    }
}
