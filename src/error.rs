use std::path::PathBuf;
use thiserror::Error;

/// The main error type for kplabel operations.
#[derive(Debug, Error)]
pub enum KplabelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Category index {index} is out of range for a registry with {len} categories")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Category name must not be empty")]
    EmptyCategoryName,

    #[error("Invalid image size {width}x{height}; both dimensions must be non-zero")]
    InvalidImageSize { width: u32, height: u32 },

    #[error("Failed to parse label line {line}{}: {message}", display_path(.path))]
    LabelParse {
        path: Option<PathBuf>,
        line: usize,
        message: String,
    },

    #[error("Failed to access {path}: {source}")]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Label file {path} does not exist")]
    LabelFileMissing { path: PathBuf },

    #[error("Failed to read image dimensions from {path}: {source}")]
    ImageDimensionRead {
        path: PathBuf,
        #[source]
        source: imagesize::ImageError,
    },

    #[error("Image {path} is too large ({width}x{height})")]
    ImageTooLarge {
        path: PathBuf,
        width: usize,
        height: usize,
    },

    #[error("Failed to parse category schema from {path}: {source}")]
    SchemaParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to write category schema to {path}: {source}")]
    SchemaWrite {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to serialize report as JSON: {source}")]
    ReportJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("Model invocation failed: {0}")]
    ModelInvocation(String),

    #[error("An auto-label job is already running")]
    AutoLabelBusy,

    #[error("No image is selected")]
    NoImageSelected,

    #[error("Image index {index} is out of range for {len} image(s)")]
    ImageIndexOutOfRange { index: usize, len: usize },

    #[error("No annotation is active")]
    NoActiveAnnotation,

    #[error("Annotation index {index} is out of range for {len} annotation(s)")]
    AnnotationIndexOutOfRange { index: usize, len: usize },

    #[error("Keypoint slot {index} is out of range for {len} slot(s)")]
    KeypointIndexOutOfRange { index: usize, len: usize },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

fn display_path(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => format!(" in {}", path.display()),
        None => String::new(),
    }
}

impl KplabelError {
    /// Attaches a file path to a label parse error produced from in-memory text.
    pub(crate) fn with_label_path(self, file: &std::path::Path) -> Self {
        match self {
            KplabelError::LabelParse {
                path: None,
                line,
                message,
            } => KplabelError::LabelParse {
                path: Some(file.to_path_buf()),
                line,
                message,
            },
            other => other,
        }
    }
}
