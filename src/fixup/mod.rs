//! Post-processing passes for label files written by a detector run.
//!
//! Two independent passes exist and they are not interchangeable:
//!
//! - **Column fix-up** forces every line to a fixed number of
//!   whitespace-separated columns, padding with `0` or truncating. It runs
//!   after a batch pre-label run, whose output may carry a confidence column
//!   or a different keypoint count than the target schema.
//! - **Precision fix-up** rewrites every numeric column with exactly six
//!   decimals (the class column as a plain integer). It runs after an
//!   interactive auto-label run so that detector output matches what the
//!   label writer produces.

use std::fs;
use std::path::Path;

use crate::error::KplabelError;
use crate::layout::{list_label_files, write_atomic};

/// Default column count for the batch pre-label pass: class, four box
/// values, four keypoint pairs.
pub const DEFAULT_EXPECTED_COLUMNS: usize = 13;

/// Outcome of a directory pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FixupSummary {
    /// Label files visited.
    pub files: usize,
    /// Lines whose text changed.
    pub lines_changed: usize,
}

/// Pads with `"0"` or truncates to exactly `expected_columns` tokens,
/// joined by single spaces.
pub fn fix_columns_line(line: &str, expected_columns: usize) -> String {
    let mut parts: Vec<&str> = line.split_whitespace().collect();
    parts.resize(expected_columns, "0");
    parts.join(" ")
}

/// Column fix-up over a whole file's text. A blank line is short like any
/// other and becomes a row of zeros.
///
/// Returns the new text and the number of lines that had the wrong column
/// count.
pub fn fix_columns_text(text: &str, expected_columns: usize) -> (String, usize) {
    let mut out = String::with_capacity(text.len());
    let mut fixed = 0;

    for line in text.lines() {
        if line.split_whitespace().count() != expected_columns {
            fixed += 1;
        }
        out.push_str(&fix_columns_line(line, expected_columns));
        out.push('\n');
    }

    (out, fixed)
}

/// Rewrites numeric tokens with six decimals; the first token becomes an
/// integer. Tokens that are not finite numbers are kept as they are.
pub fn fix_precision_line(line: &str) -> String {
    line.split_whitespace()
        .enumerate()
        .map(|(idx, token)| match token.parse::<f64>() {
            Ok(value) if value.is_finite() => {
                if idx == 0 {
                    // `+ 0.0` turns -0 into 0.
                    format!("{:.0}", value.trunc() + 0.0)
                } else {
                    format!("{:.6}", value)
                }
            }
            _ => token.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Precision fix-up over a whole file's text. Blank lines stay blank.
///
/// Returns the new text and the number of lines that changed.
pub fn fix_precision_text(text: &str) -> (String, usize) {
    let mut out = String::with_capacity(text.len());
    let mut changed = 0;

    for line in text.lines() {
        let fixed = fix_precision_line(line);
        if fixed != line {
            changed += 1;
        }
        out.push_str(&fixed);
        out.push('\n');
    }

    (out, changed)
}

/// Applies the column fix-up to every `.txt` file directly inside `dir`.
pub fn fix_columns_in_dir(
    dir: &Path,
    expected_columns: usize,
) -> Result<FixupSummary, KplabelError> {
    let summary = rewrite_label_files(dir, |text| fix_columns_text(text, expected_columns))?;
    tracing::info!(
        dir = %dir.display(),
        files = summary.files,
        lines = summary.lines_changed,
        expected_columns,
        "column fix-up finished"
    );
    Ok(summary)
}

/// Applies the precision fix-up to every `.txt` file directly inside `dir`.
pub fn fix_precision_in_dir(dir: &Path) -> Result<FixupSummary, KplabelError> {
    let summary = rewrite_label_files(dir, fix_precision_text)?;
    tracing::info!(
        dir = %dir.display(),
        files = summary.files,
        lines = summary.lines_changed,
        "precision fix-up finished"
    );
    Ok(summary)
}

fn rewrite_label_files<F>(dir: &Path, mut fix: F) -> Result<FixupSummary, KplabelError>
where
    F: FnMut(&str) -> (String, usize),
{
    let mut summary = FixupSummary::default();

    for path in list_label_files(dir)? {
        let text = fs::read_to_string(&path).map_err(|source| KplabelError::FileAccess {
            path: path.clone(),
            source,
        })?;
        let (fixed, changed) = fix(&text);
        if fixed != text {
            write_atomic(&path, &fixed)?;
        }
        if changed > 0 {
            tracing::debug!(file = %path.display(), lines = changed, "rewrote label file");
        }
        summary.files += 1;
        summary.lines_changed += changed;
    }

    Ok(summary)
}
