//! Editing state for the annotations of one image.
//!
//! Every user action is an [`EditCommand`] applied to an
//! [`AnnotationSession`]. Commands only touch the record sequence and the
//! active selection, so they can be driven and tested without a rendering
//! surface. Coordinates in commands are normalized image coordinates.

use crate::error::KplabelError;
use crate::ir::{Annotation, CategoryRegistry, ClassId, Coord, ImageSize, Keypoint, Normalized};

/// Pick radius around a visible keypoint, in image pixels.
pub const PICK_RADIUS_PX: f64 = 10.0;

/// A single edit on the annotation sequence.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EditCommand {
    /// Append a record for `class_id` with every slot absent and make it
    /// active.
    NewAnnotation { class_id: ClassId },
    /// Place a point in the first absent slot of the active record.
    PlacePoint { x: f64, y: f64 },
    /// Move a visible slot of the active record.
    DragPoint { slot: usize, x: f64, y: f64 },
    /// Mark the last visible slot of the active record as absent.
    UndoLastVisible,
    /// Remove the active record; the last remaining one becomes active.
    ClearActive,
    /// Make the record at this index active.
    SwitchActive(usize),
    /// Change the active category and re-target the active record to it.
    SetCategory(ClassId),
}

/// What an applied command changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditOutcome {
    Created { index: usize },
    Placed { slot: usize },
    Moved { slot: usize },
    Undone { slot: usize },
    Cleared { index: usize },
    Switched { index: usize },
    Recategorized { slots: usize },
    /// The command was valid but had nothing to act on.
    Unchanged,
}

/// Annotation records of the current image plus the active selection.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnnotationSession {
    annotations: Vec<Annotation>,
    active: Option<usize>,
    active_category: ClassId,
}

impl AnnotationSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn active(&self) -> Option<&Annotation> {
        self.active.and_then(|idx| self.annotations.get(idx))
    }

    pub fn active_category(&self) -> ClassId {
        self.active_category
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    /// Replaces every record, e.g. after decoding a label file.
    ///
    /// The last record becomes active and its category becomes the active
    /// category. An empty input leaves the active category as it was.
    pub fn replace_all(&mut self, annotations: Vec<Annotation>) {
        self.annotations = annotations;
        self.active = self.annotations.len().checked_sub(1);
        if let Some(last) = self.annotations.last() {
            self.active_category = last.class_id;
        }
    }

    /// Drops every record.
    pub fn clear(&mut self) {
        self.annotations.clear();
        self.active = None;
    }

    /// Applies one command.
    pub fn apply(
        &mut self,
        command: EditCommand,
        registry: &CategoryRegistry,
    ) -> Result<EditOutcome, KplabelError> {
        let outcome = match command {
            EditCommand::NewAnnotation { class_id } => self.new_annotation(class_id, registry)?,
            EditCommand::PlacePoint { x, y } => self.place_point(x, y, registry)?,
            EditCommand::DragPoint { slot, x, y } => self.drag_point(slot, x, y)?,
            EditCommand::UndoLastVisible => self.undo_last_visible()?,
            EditCommand::ClearActive => self.clear_active()?,
            EditCommand::SwitchActive(index) => self.switch_active(index)?,
            EditCommand::SetCategory(class_id) => self.set_category(class_id, registry)?,
        };
        tracing::debug!(?command, ?outcome, "applied edit");
        Ok(outcome)
    }

    /// Finds a visible slot of the active record within `radius_px` pixels of
    /// the given normalized position.
    pub fn hit_test(&self, x: f64, y: f64, image_size: ImageSize, radius_px: f64) -> Option<usize> {
        let active = self.active()?;
        let target = Coord::<Normalized>::new(x, y).to_pixel(image_size);
        active.keypoints.iter().position(|kp| {
            if !kp.is_visible() {
                return false;
            }
            let point = kp.coord().to_pixel(image_size);
            (point.x - target.x).hypot(point.y - target.y) < radius_px
        })
    }

    fn active_mut(&mut self) -> Result<&mut Annotation, KplabelError> {
        self.active
            .and_then(|idx| self.annotations.get_mut(idx))
            .ok_or(KplabelError::NoActiveAnnotation)
    }

    fn new_annotation(
        &mut self,
        class_id: ClassId,
        registry: &CategoryRegistry,
    ) -> Result<EditOutcome, KplabelError> {
        let slots = registry
            .keypoint_count(class_id)
            .ok_or(KplabelError::IndexOutOfRange {
                index: class_id.index(),
                len: registry.len(),
            })?;
        self.annotations
            .push(Annotation::with_empty_slots(class_id, slots));
        let index = self.annotations.len() - 1;
        self.active = Some(index);
        self.active_category = class_id;
        Ok(EditOutcome::Created { index })
    }

    fn place_point(
        &mut self,
        x: f64,
        y: f64,
        registry: &CategoryRegistry,
    ) -> Result<EditOutcome, KplabelError> {
        let active = self.active_mut()?;
        let slots = registry.keypoint_count(active.class_id).unwrap_or(0);

        let free = (0..slots).find(|&slot| {
            active
                .keypoints
                .get(slot)
                .map_or(true, |kp| !kp.is_visible())
        });
        let Some(slot) = free else {
            return Ok(EditOutcome::Unchanged);
        };

        active.pad_to(slot + 1);
        active.keypoints[slot] = Keypoint::visible(x, y);
        Ok(EditOutcome::Placed { slot })
    }

    fn drag_point(&mut self, slot: usize, x: f64, y: f64) -> Result<EditOutcome, KplabelError> {
        let active = self.active_mut()?;
        let len = active.keypoints.len();
        let kp = active
            .keypoints
            .get_mut(slot)
            .ok_or(KplabelError::KeypointIndexOutOfRange { index: slot, len })?;
        if !kp.is_visible() {
            return Ok(EditOutcome::Unchanged);
        }
        kp.x = x;
        kp.y = y;
        Ok(EditOutcome::Moved { slot })
    }

    fn undo_last_visible(&mut self) -> Result<EditOutcome, KplabelError> {
        let active = self.active_mut()?;
        match active.keypoints.iter().rposition(Keypoint::is_visible) {
            Some(slot) => {
                active.keypoints[slot] = Keypoint::absent();
                Ok(EditOutcome::Undone { slot })
            }
            None => Ok(EditOutcome::Unchanged),
        }
    }

    fn clear_active(&mut self) -> Result<EditOutcome, KplabelError> {
        let index = self
            .active
            .filter(|&idx| idx < self.annotations.len())
            .ok_or(KplabelError::NoActiveAnnotation)?;
        self.annotations.remove(index);
        self.active = self.annotations.len().checked_sub(1);
        Ok(EditOutcome::Cleared { index })
    }

    fn switch_active(&mut self, index: usize) -> Result<EditOutcome, KplabelError> {
        let record = self
            .annotations
            .get(index)
            .ok_or(KplabelError::AnnotationIndexOutOfRange {
                index,
                len: self.annotations.len(),
            })?;
        self.active_category = record.class_id;
        self.active = Some(index);
        Ok(EditOutcome::Switched { index })
    }

    fn set_category(
        &mut self,
        class_id: ClassId,
        registry: &CategoryRegistry,
    ) -> Result<EditOutcome, KplabelError> {
        let slots = registry
            .keypoint_count(class_id)
            .ok_or(KplabelError::IndexOutOfRange {
                index: class_id.index(),
                len: registry.len(),
            })?;
        self.active_category = class_id;

        match self.active_mut() {
            Ok(active) => {
                active.class_id = class_id;
                active.resize_to(slots);
                Ok(EditOutcome::Recategorized { slots })
            }
            Err(_) => Ok(EditOutcome::Unchanged),
        }
    }
}
