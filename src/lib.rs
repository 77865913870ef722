//! kplabel: keypoint annotation core.
//!
//! kplabel reads and writes YOLO-pose label files against a category schema,
//! keeps an editable annotation session per image, and drives an external
//! pose detector to pre-label image folders.
//!
//! # Modules
//!
//! - [`ir`]: Annotation model, category registry and the label/schema codecs
//! - [`layout`]: Image and label directory conventions
//! - [`fixup`]: Column and precision passes over detector output
//! - [`session`]: Edit commands on the annotations of one image
//! - [`autolabel`]: Detector seam, batch pre-labelling and background runs
//! - [`workspace`]: Ties the above together for an interactive front end
//! - [`error`]: Error types for kplabel operations

pub mod autolabel;
pub mod error;
pub mod fixup;
pub mod ir;
pub mod layout;
pub mod session;
pub mod workspace;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use error::KplabelError;

use ir::io_schema_yaml::{read_schema_yaml, write_schema_yaml};
use ir::io_yolo_pose::{read_label_file, write_label_file};
use ir::{parse_keypoint_names, Annotation, CategoryRegistry, ClassId, ImageSize, VisibilityPolicy};

/// The kplabel CLI application.
#[derive(Parser)]
#[command(name = "kplabel")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    /// Log debug output to stderr (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Decode the label file of an image and print its records.
    Decode(DecodeArgs),
    /// Rewrite the label file of an image in canonical form.
    Normalize(LabelFileArgs),
    /// Force every label line in a directory to a fixed column count.
    FixColumns(FixColumnsArgs),
    /// Rewrite numeric label columns with six decimals.
    FixPrecision(FixPrecisionArgs),
    /// Pre-label a folder of images with a pose detector.
    AutoLabel(AutoLabelArgs),
    /// Print (and create) the label directory of an image directory.
    LabelsDir(LabelsDirArgs),
    /// List or change the categories of a schema file.
    #[command(subcommand)]
    Category(CategoryCommand),
}

/// Category schema maintenance.
#[derive(Subcommand)]
enum CategoryCommand {
    /// List categories and their keypoint names.
    List(SchemaFileArgs),
    /// Append a category.
    Add(CategoryAddArgs),
    /// Rename a category and replace its keypoint names.
    Edit(CategoryEditArgs),
}

#[derive(clap::Args)]
struct SchemaFileArgs {
    /// Category schema (YAML). A missing file starts an empty schema.
    #[arg(long, env = "KPLABEL_SCHEMA")]
    schema: PathBuf,
}

#[derive(clap::Args)]
struct CategoryAddArgs {
    #[command(flatten)]
    file: SchemaFileArgs,

    /// Category name.
    name: String,

    /// Comma-separated keypoint names, e.g. "top,left,bottom,right".
    #[arg(long, default_value = "")]
    keypoints: String,
}

#[derive(clap::Args)]
struct CategoryEditArgs {
    #[command(flatten)]
    file: SchemaFileArgs,

    /// Class id of the category.
    id: usize,

    /// New category name.
    name: String,

    /// Comma-separated keypoint names replacing the current ones.
    #[arg(long, default_value = "")]
    keypoints: String,
}

/// Arguments shared by commands that read one image's label file.
#[derive(clap::Args)]
struct LabelFileArgs {
    /// Image whose label file is read.
    image: PathBuf,

    /// Label directory (defaults to the one paired with the image folder).
    #[arg(long, env = "KPLABEL_LABELS_DIR")]
    labels_dir: Option<PathBuf>,

    /// Category schema (YAML). A missing file starts an empty schema.
    #[arg(long, env = "KPLABEL_SCHEMA")]
    schema: Option<PathBuf>,

    /// Keep the visibility flag of `x y v` triples instead of forcing visible.
    #[arg(long)]
    keep_visibility: bool,

    /// Write categories added while decoding back to the schema file.
    #[arg(long, requires = "schema")]
    update_schema: bool,
}

/// Arguments for the decode subcommand.
#[derive(clap::Args)]
struct DecodeArgs {
    #[command(flatten)]
    labels: LabelFileArgs,

    /// Output format ('text' or 'json').
    #[arg(long, default_value = "text")]
    output: String,
}

/// Arguments for the fix-columns subcommand.
#[derive(clap::Args)]
struct FixColumnsArgs {
    /// Directory of label files.
    dir: PathBuf,

    /// Number of columns every line must have.
    #[arg(long, default_value_t = fixup::DEFAULT_EXPECTED_COLUMNS)]
    columns: usize,
}

/// Arguments for the fix-precision subcommand.
#[derive(clap::Args)]
struct FixPrecisionArgs {
    /// Directory of label files.
    dir: PathBuf,
}

/// Arguments for the auto-label subcommand.
#[derive(clap::Args)]
struct AutoLabelArgs {
    /// Trained pose model weights.
    #[arg(long)]
    model: PathBuf,

    /// Directory of unlabelled images.
    #[arg(long)]
    source: PathBuf,

    /// Output root for labels, images and rendered predictions.
    #[arg(long)]
    output: PathBuf,

    /// Do not keep rendered prediction images.
    #[arg(long)]
    no_vis: bool,

    /// Do not ask the detector for a confidence column.
    #[arg(long)]
    no_conf: bool,

    /// Number of columns every label line is forced to.
    #[arg(long, default_value_t = fixup::DEFAULT_EXPECTED_COLUMNS)]
    columns: usize,

    /// Detector executable.
    #[arg(long, env = "KPLABEL_YOLO_BIN", default_value = "yolo")]
    yolo_bin: PathBuf,
}

/// Arguments for the labels-dir subcommand.
#[derive(clap::Args)]
struct LabelsDirArgs {
    /// Image directory.
    image_dir: PathBuf,

    /// Explicit label directory.
    #[arg(long, env = "KPLABEL_LABELS_DIR")]
    labels_dir: Option<PathBuf>,
}

/// Run the kplabel CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), KplabelError> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Some(Commands::Decode(args)) => run_decode(args),
        Some(Commands::Normalize(args)) => run_normalize(args),
        Some(Commands::FixColumns(args)) => run_fix_columns(args),
        Some(Commands::FixPrecision(args)) => run_fix_precision(args),
        Some(Commands::AutoLabel(args)) => run_auto_label(args),
        Some(Commands::LabelsDir(args)) => run_labels_dir(args),
        Some(Commands::Category(command)) => run_category(command),
        None => {
            println!("kplabel {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Keypoint annotation core.");
            println!();
            println!("Run 'kplabel --help' for usage information.");
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "kplabel=debug" } else { "kplabel=info" };
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// A decoded label file plus the schema it was read against.
struct LoadedLabels {
    label_file: PathBuf,
    image_size: ImageSize,
    registry: CategoryRegistry,
    annotations: Vec<Annotation>,
    schema_extended: bool,
}

fn load_for_image(args: &LabelFileArgs) -> Result<LoadedLabels, KplabelError> {
    let image_size = layout::read_image_size(&args.image)?;
    let labels_dir = match &args.labels_dir {
        Some(dir) => dir.clone(),
        None => layout::labels_dir_for(args.image.parent().unwrap_or(Path::new("."))),
    };
    let label_file = layout::label_path_for(&labels_dir, &args.image);
    if !label_file.is_file() {
        return Err(KplabelError::LabelFileMissing { path: label_file });
    }

    let mut registry = match &args.schema {
        Some(path) => read_schema_or_empty(path)?,
        None => CategoryRegistry::new(),
    };
    let before = registry.clone();
    let policy = if args.keep_visibility {
        VisibilityPolicy::FromFile
    } else {
        VisibilityPolicy::ForceVisible
    };

    let annotations = read_label_file(&label_file, image_size, &mut registry, policy)?;
    let schema_extended = registry != before;

    if args.update_schema && schema_extended {
        if let Some(path) = &args.schema {
            write_schema_yaml(path, &registry)?;
            tracing::info!(path = %path.display(), categories = registry.len(), "updated schema");
        }
    }

    Ok(LoadedLabels {
        label_file,
        image_size,
        registry,
        annotations,
        schema_extended,
    })
}

#[derive(Serialize)]
struct DecodeReport<'a> {
    image: &'a Path,
    label_file: &'a Path,
    image_size: ImageSize,
    schema_extended: bool,
    categories: &'a CategoryRegistry,
    annotations: &'a [Annotation],
}

/// Execute the decode subcommand.
fn run_decode(args: DecodeArgs) -> Result<(), KplabelError> {
    let loaded = load_for_image(&args.labels)?;

    match args.output.as_str() {
        "json" => {
            let report = DecodeReport {
                image: &args.labels.image,
                label_file: &loaded.label_file,
                image_size: loaded.image_size,
                schema_extended: loaded.schema_extended,
                categories: &loaded.registry,
                annotations: &loaded.annotations,
            };
            let json = serde_json::to_string_pretty(&report)
                .map_err(|source| KplabelError::ReportJson { source })?;
            println!("{json}");
        }
        "text" => print_decode_text(&args.labels.image, &loaded),
        other => {
            return Err(KplabelError::UnsupportedFormat(format!(
                "'{}' (supported: text, json)",
                other
            )));
        }
    }

    Ok(())
}

fn print_decode_text(image: &Path, loaded: &LoadedLabels) {
    println!(
        "{} ({}x{})",
        image.display(),
        loaded.image_size.width,
        loaded.image_size.height
    );
    println!("labels: {}", loaded.label_file.display());
    if loaded.schema_extended {
        println!("schema: extended to {} categories", loaded.registry.len());
    }
    println!("records: {}", loaded.annotations.len());

    let names = |annotation: &Annotation| {
        loaded
            .registry
            .get(annotation.class_id)
            .map(|category| category.keypoints.clone())
            .unwrap_or_default()
    };

    for (idx, annotation) in loaded.annotations.iter().enumerate() {
        let slot_names = names(annotation);
        println!(
            "  [{idx}] {} (class {}): {}/{} visible",
            loaded.registry.display_name(annotation.class_id),
            annotation.class_id,
            annotation.visible_keypoints().count(),
            annotation.keypoints.len()
        );
        for (slot, kp) in annotation.keypoints.iter().enumerate() {
            let name = slot_names.get(slot).map(String::as_str).unwrap_or("?");
            if kp.is_visible() {
                println!("      {name}: {:.6} {:.6} v={}", kp.x, kp.y, kp.v);
            } else {
                println!("      {name}: absent");
            }
        }
    }
}

/// Execute the normalize subcommand.
fn run_normalize(args: LabelFileArgs) -> Result<(), KplabelError> {
    let loaded = load_for_image(&args)?;
    write_label_file(
        &loaded.label_file,
        &loaded.annotations,
        &loaded.registry,
        loaded.image_size,
    )?;

    let written = loaded
        .annotations
        .iter()
        .filter(|annotation| annotation.visible_keypoints().next().is_some())
        .count();
    println!(
        "Normalized {} -> {} record(s) written ({} without visible keypoints dropped)",
        loaded.label_file.display(),
        written,
        loaded.annotations.len() - written
    );
    Ok(())
}

/// Execute the fix-columns subcommand.
fn run_fix_columns(args: FixColumnsArgs) -> Result<(), KplabelError> {
    let summary = fixup::fix_columns_in_dir(&args.dir, args.columns)?;
    println!(
        "Checked {} label file(s); fixed {} line(s) to {} columns",
        summary.files, summary.lines_changed, args.columns
    );
    Ok(())
}

/// Execute the fix-precision subcommand.
fn run_fix_precision(args: FixPrecisionArgs) -> Result<(), KplabelError> {
    let summary = fixup::fix_precision_in_dir(&args.dir)?;
    println!(
        "Checked {} label file(s); rewrote {} line(s)",
        summary.files, summary.lines_changed
    );
    Ok(())
}

/// Execute the auto-label subcommand.
fn run_auto_label(args: AutoLabelArgs) -> Result<(), KplabelError> {
    let detector = autolabel::YoloCli::new(args.yolo_bin);
    let mut options = autolabel::BatchOptions::new(args.model, args.source, args.output);
    options.save_visuals = !args.no_vis;
    options.save_conf = !args.no_conf;
    options.expected_columns = args.columns;

    let summary = autolabel::auto_annotate(&detector, &options)?;

    println!(
        "Label files: {} ({})",
        summary.labels_count,
        summary.labels_dir.display()
    );
    println!(
        "Labelled images: {} ({})",
        summary.images_count,
        summary.images_dir.display()
    );
    if let Some(vis_dir) = &summary.vis_dir {
        println!("Rendered predictions: {} ({})", summary.vis_count, vis_dir.display());
    }
    if summary.lines_fixed > 0 {
        println!("Fixed column count on {} line(s)", summary.lines_fixed);
    }
    for name in &summary.missing_images {
        println!("No source image for {name}");
    }
    if let Some(check) = &summary.sample {
        println!(
            "Sample {}: {} columns (expected {}) {}",
            check.file.display(),
            check.columns,
            check.expected,
            if check.is_ok() { "ok" } else { "MISMATCH" }
        );
    }
    Ok(())
}

/// Execute the labels-dir subcommand.
fn run_labels_dir(args: LabelsDirArgs) -> Result<(), KplabelError> {
    let dir = layout::resolve_labels_dir(&args.image_dir, args.labels_dir.as_deref())?;
    println!("{}", dir.display());
    Ok(())
}

fn read_schema_or_empty(path: &Path) -> Result<CategoryRegistry, KplabelError> {
    if path.is_file() {
        read_schema_yaml(path)
    } else {
        Ok(CategoryRegistry::new())
    }
}

/// Execute the category subcommands.
fn run_category(command: CategoryCommand) -> Result<(), KplabelError> {
    match command {
        CategoryCommand::List(args) => {
            let registry = read_schema_or_empty(&args.schema)?;
            for (class_id, category) in registry.iter() {
                println!(
                    "{}: {} [{}]",
                    class_id,
                    category.name,
                    category.keypoints.join(", ")
                );
            }
            Ok(())
        }
        CategoryCommand::Add(args) => {
            let mut registry = read_schema_or_empty(&args.file.schema)?;
            let keypoints = parse_keypoint_names(&args.keypoints);
            let count = keypoints.len();
            let class_id = registry.add_category(&args.name, keypoints)?;
            write_schema_yaml(&args.file.schema, &registry)?;
            println!(
                "Added category {}: {} ({} keypoint(s))",
                class_id, args.name, count
            );
            Ok(())
        }
        CategoryCommand::Edit(args) => {
            let mut registry = read_schema_or_empty(&args.file.schema)?;
            let keypoints = parse_keypoint_names(&args.keypoints);
            let count = keypoints.len();
            registry.edit_category(ClassId(args.id), &args.name, keypoints)?;
            write_schema_yaml(&args.file.schema, &registry)?;
            println!(
                "Updated category {}: {} ({} keypoint(s))",
                args.id, args.name, count
            );
            Ok(())
        }
    }
}
