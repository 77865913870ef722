//! Category schema registry.
//!
//! An ordered catalog of categories, each with an ordered list of keypoint
//! slot names. Categories are referenced only by position ([`ClassId`]); a
//! slot is identified only by its index, names are descriptive.
//!
//! The registry grows in two ways: explicit [`add_category`] /
//! [`edit_category`] calls, and [`ensure_category_exists`] when decoded label
//! files reference more structure than is currently known. It never shrinks
//! on its own.
//!
//! [`add_category`]: CategoryRegistry::add_category
//! [`edit_category`]: CategoryRegistry::edit_category
//! [`ensure_category_exists`]: CategoryRegistry::ensure_category_exists

use serde::{Deserialize, Serialize};

use super::ids::ClassId;
use crate::error::KplabelError;

/// An object category and its keypoint slot names.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,

    #[serde(default)]
    pub keypoints: Vec<String>,
}

impl Category {
    pub fn new<S: Into<String>>(name: impl Into<String>, keypoints: Vec<S>) -> Self {
        Self {
            name: name.into(),
            keypoints: keypoints.into_iter().map(Into::into).collect(),
        }
    }

    /// A category created to hold an unrecognized class id.
    pub fn placeholder(class_id: ClassId, keypoint_count: usize) -> Self {
        Self {
            name: placeholder_name(class_id),
            keypoints: (0..keypoint_count).map(synthetic_keypoint_name).collect(),
        }
    }
}

/// Ordered category catalog, indexed by [`ClassId`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRegistry {
    #[serde(default)]
    categories: Vec<Category>,
}

impl CategoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_categories(categories: Vec<Category>) -> Self {
        Self { categories }
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn get(&self, class_id: ClassId) -> Option<&Category> {
        self.categories.get(class_id.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = (ClassId, &Category)> {
        self.categories
            .iter()
            .enumerate()
            .map(|(idx, cat)| (ClassId(idx), cat))
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Number of keypoint slots for `class_id`, if the category exists.
    pub fn keypoint_count(&self, class_id: ClassId) -> Option<usize> {
        self.get(class_id).map(|cat| cat.keypoints.len())
    }

    /// Name to show for `class_id`, falling back to the placeholder name for
    /// ids the registry does not know yet.
    pub fn display_name(&self, class_id: ClassId) -> String {
        match self.get(class_id) {
            Some(cat) => cat.name.clone(),
            None => placeholder_name(class_id),
        }
    }

    /// Appends a category and returns its id.
    ///
    /// Names need not be unique; an empty (or whitespace-only) name is
    /// rejected. A category with no keypoints is allowed.
    pub fn add_category<S: Into<String>>(
        &mut self,
        name: &str,
        keypoint_names: Vec<S>,
    ) -> Result<ClassId, KplabelError> {
        if name.trim().is_empty() {
            return Err(KplabelError::EmptyCategoryName);
        }
        self.categories.push(Category::new(name, keypoint_names));
        Ok(ClassId(self.categories.len() - 1))
    }

    /// Replaces the name and keypoint list of an existing category.
    ///
    /// Existing annotation records are not touched; their keypoint arrays are
    /// reconciled the next time they pass through the codec.
    pub fn edit_category<S: Into<String>>(
        &mut self,
        class_id: ClassId,
        new_name: &str,
        new_keypoint_names: Vec<S>,
    ) -> Result<(), KplabelError> {
        let len = self.categories.len();
        let category =
            self.categories
                .get_mut(class_id.index())
                .ok_or(KplabelError::IndexOutOfRange {
                    index: class_id.index(),
                    len,
                })?;
        category.name = new_name.to_string();
        category.keypoints = new_keypoint_names.into_iter().map(Into::into).collect();
        Ok(())
    }

    /// Makes sure `class_id` exists with at least `min_keypoint_count` slots.
    ///
    /// Missing categories up to and including `class_id` are appended as
    /// placeholders with `max(1, min_keypoint_count)` synthetic slot names.
    /// An existing category with too few slots is extended with synthetic
    /// names continuing from its current length. Nothing is ever removed.
    pub fn ensure_category_exists(&mut self, class_id: ClassId, min_keypoint_count: usize) {
        let target = class_id.index();
        if target >= self.categories.len() {
            let seeded = min_keypoint_count.max(1);
            for idx in self.categories.len()..=target {
                self.categories
                    .push(Category::placeholder(ClassId(idx), seeded));
            }
            return;
        }

        let keypoints = &mut self.categories[target].keypoints;
        while keypoints.len() < min_keypoint_count {
            keypoints.push(synthetic_keypoint_name(keypoints.len()));
        }
    }
}

/// Splits a comma-separated keypoint name list, dropping empty entries.
pub fn parse_keypoint_names(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn placeholder_name(class_id: ClassId) -> String {
    format!("class_{}", class_id)
}

fn synthetic_keypoint_name(slot: usize) -> String {
    format!("kp{}", slot)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person() -> Category {
        Category::new("person", vec!["nose", "left_eye", "right_eye"])
    }

    #[test]
    fn add_category_appends_and_returns_index() {
        let mut reg = CategoryRegistry::new();
        assert_eq!(reg.add_category("person", vec!["nose"]).unwrap(), ClassId(0));
        assert_eq!(reg.add_category("person", Vec::<String>::new()).unwrap(), ClassId(1));
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.keypoint_count(ClassId(1)), Some(0));
    }

    #[test]
    fn add_category_rejects_empty_name() {
        let mut reg = CategoryRegistry::new();
        let err = reg.add_category("  ", vec!["a"]).unwrap_err();
        assert!(matches!(err, KplabelError::EmptyCategoryName));
        assert!(reg.is_empty());
    }

    #[test]
    fn edit_category_replaces_in_place() {
        let mut reg = CategoryRegistry::from_categories(vec![person()]);
        reg.edit_category(ClassId(0), "hand", vec!["wrist"]).unwrap();
        assert_eq!(reg.get(ClassId(0)), Some(&Category::new("hand", vec!["wrist"])));
    }

    #[test]
    fn edit_category_rejects_out_of_range() {
        let mut reg = CategoryRegistry::from_categories(vec![person()]);
        let err = reg.edit_category(ClassId(1), "x", vec!["y"]).unwrap_err();
        assert!(matches!(
            err,
            KplabelError::IndexOutOfRange { index: 1, len: 1 }
        ));
    }

    #[test]
    fn ensure_creates_placeholders_up_to_id() {
        let mut reg = CategoryRegistry::from_categories(vec![person()]);
        reg.ensure_category_exists(ClassId(3), 2);

        assert_eq!(reg.len(), 4);
        assert_eq!(reg.get(ClassId(0)), Some(&person()));
        for idx in 1..=3 {
            let cat = reg.get(ClassId(idx)).unwrap();
            assert_eq!(cat.name, format!("class_{idx}"));
            assert_eq!(cat.keypoints, vec!["kp0", "kp1"]);
        }
    }

    #[test]
    fn ensure_seeds_at_least_one_slot() {
        let mut reg = CategoryRegistry::new();
        reg.ensure_category_exists(ClassId(0), 0);
        assert_eq!(reg.get(ClassId(0)).unwrap().keypoints, vec!["kp0"]);
    }

    #[test]
    fn ensure_extends_existing_category_without_renaming() {
        let mut reg = CategoryRegistry::from_categories(vec![person()]);
        reg.ensure_category_exists(ClassId(0), 5);
        assert_eq!(
            reg.get(ClassId(0)).unwrap().keypoints,
            vec!["nose", "left_eye", "right_eye", "kp3", "kp4"]
        );
    }

    #[test]
    fn ensure_never_truncates_and_is_idempotent() {
        let mut reg = CategoryRegistry::from_categories(vec![person()]);
        reg.ensure_category_exists(ClassId(0), 1);
        reg.ensure_category_exists(ClassId(2), 4);
        let snapshot = reg.clone();
        reg.ensure_category_exists(ClassId(2), 4);
        reg.ensure_category_exists(ClassId(0), 1);
        assert_eq!(reg, snapshot);
        assert_eq!(reg.keypoint_count(ClassId(0)), Some(3));
    }

    #[test]
    fn display_name_falls_back_to_placeholder() {
        let reg = CategoryRegistry::from_categories(vec![person()]);
        assert_eq!(reg.display_name(ClassId(0)), "person");
        assert_eq!(reg.display_name(ClassId(9)), "class_9");
    }

    #[test]
    fn parse_keypoint_names_trims_and_drops_empties() {
        assert_eq!(
            parse_keypoint_names(" nose, left_eye ,,right_eye, "),
            vec!["nose", "left_eye", "right_eye"]
        );
        assert!(parse_keypoint_names("").is_empty());
    }
}
