//! Image and label directory conventions.
//!
//! Label files sit in a directory parallel to the images: an image directory
//! whose path contains `images` maps to the same path with `labels`
//! substituted, anything else maps to a `labels` directory next to it. An
//! explicitly chosen label directory always wins.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::KplabelError;
use crate::ir::ImageSize;

/// Image extensions listed in an image directory.
pub const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "tiff"];
pub const LABEL_EXTENSION: &str = "txt";

/// Conventional label directory for `image_dir`. Does not touch the disk.
///
/// The `images` substitution only applies to UTF-8 paths; other paths use the
/// sibling rule.
pub fn labels_dir_for(image_dir: &Path) -> PathBuf {
    if let Some(raw) = image_dir.to_str() {
        if raw.contains("images") {
            return PathBuf::from(raw.replace("images", "labels"));
        }
    }
    match image_dir.parent() {
        Some(parent) => parent.join("labels"),
        None => PathBuf::from("labels"),
    }
}

/// Label directory to use for `image_dir`, created if absent.
///
/// `override_dir` takes precedence over the naming convention.
pub fn resolve_labels_dir(
    image_dir: &Path,
    override_dir: Option<&Path>,
) -> Result<PathBuf, KplabelError> {
    let dir = match override_dir {
        Some(dir) => dir.to_path_buf(),
        None => labels_dir_for(image_dir),
    };
    if !dir.is_dir() {
        fs::create_dir_all(&dir).map_err(|source| KplabelError::FileAccess {
            path: dir.clone(),
            source,
        })?;
        tracing::info!(path = %dir.display(), "created label directory");
    }
    Ok(dir)
}

/// Label file for an image: same stem, `.txt`, inside `labels_dir`.
pub fn label_path_for(labels_dir: &Path, image_file: &Path) -> PathBuf {
    let mut name = image_file
        .file_stem()
        .unwrap_or(image_file.as_os_str())
        .to_os_string();
    name.push(".");
    name.push(LABEL_EXTENSION);
    labels_dir.join(name)
}

/// Image files directly inside `dir`, sorted by file name.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>, KplabelError> {
    list_files_with_extensions(dir, &IMAGE_EXTENSIONS)
}

/// Label files directly inside `dir`, sorted by file name.
pub fn list_label_files(dir: &Path) -> Result<Vec<PathBuf>, KplabelError> {
    list_files_with_extensions(dir, &[LABEL_EXTENSION])
}

/// Reads the pixel size of an image from its header.
pub fn read_image_size(path: &Path) -> Result<ImageSize, KplabelError> {
    let size = imagesize::size(path).map_err(|source| KplabelError::ImageDimensionRead {
        path: path.to_path_buf(),
        source,
    })?;

    let (Ok(width), Ok(height)) = (u32::try_from(size.width), u32::try_from(size.height)) else {
        return Err(KplabelError::ImageTooLarge {
            path: path.to_path_buf(),
            width: size.width,
            height: size.height,
        });
    };

    ImageSize::new(width, height)
}

/// Non-recursive listing of files in `dir` with one of `extensions`.
pub(crate) fn list_files_with_extensions(
    dir: &Path,
    extensions: &[&str],
) -> Result<Vec<PathBuf>, KplabelError> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|source| KplabelError::FileAccess {
            path: dir.to_path_buf(),
            source: source.into(),
        })?;

        if entry.file_type().is_file() && has_extension(entry.path(), extensions) {
            files.push(entry.path().to_path_buf());
        }
    }

    Ok(files)
}

pub(crate) fn has_extension(path: &Path, allowed: &[&str]) -> bool {
    let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
        return false;
    };

    allowed
        .iter()
        .any(|allowed_ext| ext.eq_ignore_ascii_case(allowed_ext))
}

/// Replaces `path` with `contents` through a temporary file in the same
/// directory. On failure the previous file is left as it was.
///
/// An existing file keeps its permissions. A new file gets the usual
/// `0o644` minus the process umask instead of the temp file's `0o600`.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<(), KplabelError> {
    let access = |source: std::io::Error| KplabelError::FileAccess {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut builder = tempfile::Builder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(0o644));
    }
    let mut tmp = builder.tempfile_in(dir).map_err(access)?;
    tmp.write_all(contents.as_bytes()).map_err(access)?;
    if let Ok(existing) = fs::metadata(path) {
        tmp.as_file()
            .set_permissions(existing.permissions())
            .map_err(access)?;
    }
    tmp.persist(path).map_err(|err| access(err.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_dir_replaces_images_segment() {
        assert_eq!(
            labels_dir_for(Path::new("/data/set/images/train")),
            PathBuf::from("/data/set/labels/train")
        );
    }

    #[test]
    fn labels_dir_falls_back_to_sibling() {
        assert_eq!(
            labels_dir_for(Path::new("/data/frames")),
            PathBuf::from("/data/labels")
        );
    }

    #[test]
    fn resolve_prefers_override_and_creates_it() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let images = temp.path().join("images");
        let custom = temp.path().join("custom/labels");

        let dir = resolve_labels_dir(&images, Some(&custom)).expect("resolve");
        assert_eq!(dir, custom);
        assert!(custom.is_dir());
        assert!(!temp.path().join("labels").exists());
    }

    #[test]
    fn resolve_creates_conventional_dir() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let frames = temp.path().join("frames");
        fs::create_dir_all(&frames).expect("create frames dir");

        let dir = resolve_labels_dir(&frames, None).expect("resolve");
        assert_eq!(dir, temp.path().join("labels"));
        assert!(dir.is_dir());
    }

    #[test]
    fn label_path_swaps_extension() {
        assert_eq!(
            label_path_for(Path::new("/l"), Path::new("/i/frame.001.jpg")),
            PathBuf::from("/l/frame.001.txt")
        );
    }

    #[test]
    fn list_images_filters_and_sorts() {
        let temp = tempfile::tempdir().expect("create temp dir");
        for name in ["b.PNG", "a.jpg", "notes.txt", "c.tiff"] {
            fs::write(temp.path().join(name), b"x").expect("write file");
        }
        fs::create_dir_all(temp.path().join("nested.jpg")).expect("create dir");
        fs::write(temp.path().join("nested.jpg/d.jpg"), b"x").expect("write nested");

        let names: Vec<String> = list_images(temp.path())
            .expect("list images")
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.PNG", "c.tiff"]);
    }

    #[test]
    fn write_atomic_replaces_contents() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let path = temp.path().join("f.txt");
        fs::write(&path, "old").expect("write file");

        write_atomic(&path, "new\n").expect("atomic write");
        assert_eq!(fs::read_to_string(&path).unwrap(), "new\n");
    }

    #[cfg(unix)]
    #[test]
    fn write_atomic_keeps_existing_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().expect("create temp dir");
        for mode in [0o644, 0o640, 0o664] {
            let path = temp.path().join(format!("{mode:o}.txt"));
            fs::write(&path, "old").expect("write file");
            fs::set_permissions(&path, fs::Permissions::from_mode(mode)).expect("chmod");

            write_atomic(&path, "new\n").expect("atomic write");
            let after = fs::metadata(&path).expect("metadata").permissions().mode() & 0o777;
            assert_eq!(after, mode);
        }
    }

    #[cfg(unix)]
    #[test]
    fn write_atomic_new_file_is_not_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().expect("create temp dir");
        let plain = temp.path().join("plain.txt");
        fs::write(&plain, "x").expect("write file");
        let default_mode = fs::metadata(&plain).unwrap().permissions().mode() & 0o666;

        let path = temp.path().join("fresh.txt");
        write_atomic(&path, "new\n").expect("atomic write");
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, default_mode & 0o644);
    }

    #[cfg(unix)]
    #[test]
    fn labels_dir_for_non_utf8_path_uses_sibling_rule() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = Path::new(OsStr::from_bytes(b"/data/images/\xffset"));
        assert_eq!(labels_dir_for(dir), PathBuf::from("/data/images/labels"));
    }

    #[test]
    fn write_atomic_into_missing_dir_fails_cleanly() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let err = write_atomic(&temp.path().join("missing/f.txt"), "x").unwrap_err();
        assert!(matches!(err, KplabelError::FileAccess { .. }));
    }
}
