//! YOLO-pose label reader and writer.
//!
//! One text file per image, one object per line:
//!
//! ```text
//! <class_id> <cx> <cy> <w> <h> [<kx> <ky>]*
//! ```
//!
//! The reader also accepts `(x, y, v)` triples after the box, pixel-scale
//! values, and lines written under a different category schema. Schema
//! mismatches are reconciled against the [`CategoryRegistry`] passed in,
//! which may be extended as a side effect. The writer always emits
//! normalized `x y` pairs with six decimals and a box recomputed from the
//! visible keypoints.

use std::fs;
use std::path::Path;

use super::bbox::BBoxXYXY;
use super::coord::Coord;
use super::ids::ClassId;
use super::model::{Annotation, ImageSize, Keypoint};
use super::registry::CategoryRegistry;
use super::space::Normalized;
use crate::error::KplabelError;
use crate::layout::write_atomic;

/// Number of leading columns before the keypoint payload.
pub const BOX_COLUMNS: usize = 5;

/// Largest class id accepted on read. Unknown ids create placeholder
/// categories for every lower id, so the range is bounded.
pub const MAX_CLASS_ID: usize = 65_535;

/// How the flag of an `(x, y, v)` triple is interpreted on read.
///
/// Files in the wild use the third value inconsistently, so the choice is
/// explicit. [`VisibilityPolicy::ForceVisible`] is the default.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VisibilityPolicy {
    /// Every triple is read as a visible point (`v = 2`), whatever the file
    /// says.
    #[default]
    ForceVisible,
    /// The file's flag is kept, truncated to an integer. Non-positive flags
    /// produce absent points.
    FromFile,
}

#[derive(Debug, PartialEq)]
struct LabelRow {
    class_id: ClassId,
    cx: f64,
    cy: f64,
    w: f64,
    h: f64,
    keypoints: Vec<Keypoint>,
}

/// Decode label text into annotation records.
///
/// The registry is extended for unknown class ids and for categories that
/// have more keypoint values in the file than slot names. Records are padded
/// with absent keypoints up to their category's slot count and are never
/// truncated.
///
/// Lines with fewer than five tokens are skipped. Any other parse failure
/// aborts the whole decode; in that case neither records nor registry
/// changes are kept.
pub fn decode_labels(
    text: &str,
    image_size: ImageSize,
    registry: &mut CategoryRegistry,
    policy: VisibilityPolicy,
) -> Result<Vec<Annotation>, KplabelError> {
    let mut staged = registry.clone();
    let mut annotations = Vec::new();

    for (line_idx, line) in text.lines().enumerate() {
        let Some(row) = parse_label_line(line, line_idx + 1, image_size, policy)? else {
            continue;
        };

        staged.ensure_category_exists(row.class_id, row.keypoints.len());
        let needed = staged.keypoint_count(row.class_id).unwrap_or(0);

        let mut annotation = Annotation::new(row.class_id, row.keypoints);
        annotation.bbox = Some(BBoxXYXY::from_cxcywh(row.cx, row.cy, row.w, row.h));
        annotation.pad_to(needed);
        annotations.push(annotation);
    }

    *registry = staged;
    Ok(annotations)
}

/// Encode annotation records as label text.
///
/// Records without any visible keypoint produce no line.
pub fn encode_labels(
    annotations: &[Annotation],
    registry: &CategoryRegistry,
    image_size: ImageSize,
) -> String {
    let mut out = String::new();
    for annotation in annotations {
        if let Some(line) = encode_annotation(annotation, registry, image_size) {
            out.push_str(&line);
            out.push('\n');
        }
    }
    out
}

/// Encode one record as a label line (without the trailing newline).
///
/// The keypoint list is padded or truncated to the category's slot count
/// (or left at its own length when the category is unknown). The stored
/// `bbox` is ignored; the box is the extent of the visible keypoints.
pub fn encode_annotation(
    annotation: &Annotation,
    registry: &CategoryRegistry,
    image_size: ImageSize,
) -> Option<String> {
    let needed = registry
        .keypoint_count(annotation.class_id)
        .unwrap_or(annotation.keypoints.len());

    let mut keypoints = annotation.keypoints.clone();
    keypoints.resize(needed, Keypoint::absent());

    let slots: Vec<Option<Coord<Normalized>>> = keypoints
        .iter()
        .map(|kp| {
            kp.is_visible()
                .then(|| Coord::<Normalized>::from_raw(kp.x, kp.y, image_size))
        })
        .collect();

    let bbox = BBoxXYXY::enclosing(slots.iter().flatten().copied())?;
    let (cx, cy, w, h) = bbox.to_cxcywh();

    let mut line = format!(
        "{} {:.6} {:.6} {:.6} {:.6}",
        annotation.class_id, cx, cy, w, h
    );
    for slot in &slots {
        match slot {
            Some(c) => line.push_str(&format!(" {:.6} {:.6}", c.x, c.y)),
            None => line.push_str(" 0.000000 0.000000"),
        }
    }
    Some(line)
}

/// Read and decode a label file.
pub fn read_label_file(
    path: &Path,
    image_size: ImageSize,
    registry: &mut CategoryRegistry,
    policy: VisibilityPolicy,
) -> Result<Vec<Annotation>, KplabelError> {
    let content = fs::read_to_string(path).map_err(|source| KplabelError::FileAccess {
        path: path.to_path_buf(),
        source,
    })?;
    decode_labels(&content, image_size, registry, policy).map_err(|err| err.with_label_path(path))
}

/// Encode records and replace the label file at `path`.
///
/// The text is produced in full before the file is touched and is swapped in
/// through a temporary file, so a failure leaves the previous contents.
pub fn write_label_file(
    path: &Path,
    annotations: &[Annotation],
    registry: &CategoryRegistry,
    image_size: ImageSize,
) -> Result<(), KplabelError> {
    let text = encode_labels(annotations, registry, image_size);
    write_atomic(path, &text)
}

fn parse_label_line(
    line: &str,
    line_num: usize,
    image_size: ImageSize,
    policy: VisibilityPolicy,
) -> Result<Option<LabelRow>, KplabelError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < BOX_COLUMNS {
        return Ok(None);
    }

    let class_id = tokens[0]
        .parse::<usize>()
        .map_err(|_| KplabelError::LabelParse {
            path: None,
            line: line_num,
            message: format!(
                "invalid class_id '{}'; expected non-negative integer",
                tokens[0]
            ),
        })?;
    if class_id > MAX_CLASS_ID {
        return Err(KplabelError::LabelParse {
            path: None,
            line: line_num,
            message: format!("class_id {class_id} exceeds the maximum of {MAX_CLASS_ID}"),
        });
    }

    let cx = parse_f64_token(tokens[1], "x_center", line_num)?;
    let cy = parse_f64_token(tokens[2], "y_center", line_num)?;
    let w = parse_f64_token(tokens[3], "width", line_num)?;
    let h = parse_f64_token(tokens[4], "height", line_num)?;

    let payload = tokens[BOX_COLUMNS..]
        .iter()
        .map(|raw| parse_f64_token(raw, "keypoint value", line_num))
        .collect::<Result<Vec<f64>, _>>()?;

    Ok(Some(LabelRow {
        class_id: ClassId(class_id),
        cx,
        cy,
        w,
        h,
        keypoints: parse_keypoint_payload(&payload, image_size, policy),
    }))
}

/// Split the values after the box into keypoints.
///
/// A count divisible by three is read as `(x, y, v)` triples, otherwise a
/// count divisible by two as `(x, y)` pairs, otherwise as nothing. Pairs get
/// a synthesized flag: visible unless either coordinate is zero.
fn parse_keypoint_payload(
    values: &[f64],
    image_size: ImageSize,
    policy: VisibilityPolicy,
) -> Vec<Keypoint> {
    let point = |x: f64, y: f64, v: i32| {
        let c = Coord::<Normalized>::from_raw(x, y, image_size);
        Keypoint::new(c.x, c.y, v)
    };

    if values.len() % 3 == 0 {
        values
            .chunks_exact(3)
            .map(|t| {
                let v = match policy {
                    VisibilityPolicy::ForceVisible => Keypoint::VISIBLE,
                    VisibilityPolicy::FromFile => t[2] as i32,
                };
                point(t[0], t[1], v)
            })
            .collect()
    } else if values.len() % 2 == 0 {
        values
            .chunks_exact(2)
            .map(|p| {
                let v = if p[0] != 0.0 && p[1] != 0.0 {
                    Keypoint::VISIBLE
                } else {
                    0
                };
                point(p[0], p[1], v)
            })
            .collect()
    } else {
        Vec::new()
    }
}

fn parse_f64_token(raw: &str, field_name: &str, line_num: usize) -> Result<f64, KplabelError> {
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(KplabelError::LabelParse {
            path: None,
            line: line_num,
            message: format!("invalid {field_name} '{raw}'; expected finite floating-point number"),
        }),
    }
}

/// Fuzz-only entrypoint for label text decoding.
#[cfg(feature = "fuzzing")]
pub fn fuzz_decode_labels(input: &str) -> Result<(), KplabelError> {
    let mut registry = CategoryRegistry::new();
    let size = ImageSize::new(640, 480)?;
    let annotations = decode_labels(input, size, &mut registry, VisibilityPolicy::default())?;
    let _ = encode_labels(&annotations, &registry, size);
    Ok(())
}
