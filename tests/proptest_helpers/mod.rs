#![allow(dead_code)]

use kplabel::ir::{Annotation, Category, CategoryRegistry, ClassId, ImageSize, Keypoint};
use proptest::prelude::*;
use proptest::strategy::BoxedStrategy;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

/// Six written decimals bound the round-trip error of a normalized value.
pub const EPS_LABEL: f64 = 1e-6;

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

pub fn arb_image_size() -> BoxedStrategy<ImageSize> {
    (2u32..=4096, 2u32..=4096)
        .prop_map(|(w, h)| ImageSize::new(w, h).expect("non-zero size"))
        .boxed()
}

/// Slot counts whose pair encoding is not re-read as triples.
pub fn arb_pair_safe_slot_count() -> BoxedStrategy<usize> {
    (1usize..=17)
        .prop_filter("pair count divisible by three", |n| n % 3 != 0)
        .boxed()
}

/// Strictly inside (0, 1] so that pairs stay visible after a round trip.
pub fn arb_normalized() -> BoxedStrategy<f64> {
    (1u32..=1_000_000).prop_map(|v| v as f64 / 1_000_000.0).boxed()
}

pub fn arb_keypoint() -> BoxedStrategy<Keypoint> {
    prop_oneof![
        3 => (arb_normalized(), arb_normalized()).prop_map(|(x, y)| Keypoint::visible(x, y)),
        1 => Just(Keypoint::absent()),
    ]
    .boxed()
}

/// A registry with `categories` entries of the same slot count, and records
/// of those categories with at least one visible keypoint each.
pub fn arb_labelled_image(
    max_categories: usize,
    max_records: usize,
) -> BoxedStrategy<(CategoryRegistry, Vec<Annotation>, ImageSize)> {
    (1usize..=max_categories, arb_pair_safe_slot_count(), arb_image_size())
        .prop_flat_map(move |(category_count, slots, size)| {
            let registry = CategoryRegistry::from_categories(
                (0..category_count)
                    .map(|idx| Category::placeholder(ClassId(idx), slots))
                    .collect(),
            );
            let record = (
                0..category_count,
                proptest::collection::vec(arb_keypoint(), slots..=slots),
                arb_normalized(),
                arb_normalized(),
            )
                .prop_map(|(class, mut keypoints, x, y)| {
                    if !keypoints.iter().any(Keypoint::is_visible) {
                        keypoints[0] = Keypoint::visible(x, y);
                    }
                    Annotation::new(ClassId(class), keypoints)
                });
            (
                Just(registry),
                proptest::collection::vec(record, 0..=max_records),
                Just(size),
            )
        })
        .boxed()
}

pub fn assert_keypoints_close(left: &[Keypoint], right: &[Keypoint], eps: f64) -> Result<(), String> {
    if left.len() != right.len() {
        return Err(format!(
            "keypoint count mismatch: left={} right={}",
            left.len(),
            right.len()
        ));
    }
    for (slot, (a, b)) in left.iter().zip(right).enumerate() {
        if a.is_visible() != b.is_visible() {
            return Err(format!("slot {slot}: visibility differs ({a:?} vs {b:?})"));
        }
        if (a.x - b.x).abs() > eps || (a.y - b.y).abs() > eps {
            return Err(format!("slot {slot}: {a:?} vs {b:?} beyond eps={eps}"));
        }
    }
    Ok(())
}
