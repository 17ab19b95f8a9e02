//! Annotation diffing between two recomputations.
//!
//! The map asks for a fresh annotation set on every pan and zoom step; handing the
//! renderer the whole set each time would tear down and recreate every marker. The
//! differ instead emits only what appeared and what disappeared, comparing annotations
//! by [`AnnotationKey`] identity in linear time, plus a sort of the changed entries.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::compute::cluster::{Annotation, AnnotationKey, AnnotationSet};

/// Minimal change turning one annotation set into another.
///
/// Both lists are ordered by annotation key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationDiff {
    pub to_remove: Vec<Annotation>,
    pub to_add: Vec<Annotation>,
}

impl AnnotationDiff {
    /// True when nothing changed.
    pub fn is_empty(&self) -> bool {
        self.to_remove.is_empty() && self.to_add.is_empty()
    }

    /// Apply the diff to a surface holding the previous set.
    pub fn apply(&self, surface: &mut AnnotationSet) {
        for annotation in &self.to_remove {
            surface.remove(&annotation.key());
        }
        surface.extend(self.to_add.iter().cloned());
    }
}

/// Receives diffs to draw. Implemented by the rendering collaborator.
pub trait RenderSink: Send {
    fn apply_diff(&mut self, to_remove: &[Annotation], to_add: &[Annotation]);
}

/// Render sink that keeps the rendered set in memory; useful for headless callers and
/// tests.
#[derive(Debug, Default)]
pub struct MemorySurface {
    pub rendered: AnnotationSet,
    pub applied: usize,
}

impl RenderSink for MemorySurface {
    fn apply_diff(&mut self, to_remove: &[Annotation], to_add: &[Annotation]) {
        for annotation in to_remove {
            self.rendered.remove(&annotation.key());
        }
        self.rendered.extend(to_add.iter().cloned());
        self.applied += 1;
    }
}

/// Lets a caller keep a handle on a sink the engine owns.
impl<S: RenderSink> RenderSink for Arc<Mutex<S>> {
    fn apply_diff(&mut self, to_remove: &[Annotation], to_add: &[Annotation]) {
        self.lock().apply_diff(to_remove, to_add);
    }
}

/// Compare `previous` against `next` by identity.
///
/// Annotations present in both sets are left out of both lists, even if their
/// coordinate moved. Finding the changes is linear in the size of both sets; both
/// lists are then sorted by key, which adds O(k log k) in the number of changes k.
///
/// # Examples
///
/// ```
/// use spotmap::compute::cluster::{Annotation, AnnotationSet, PointAnnotation};
/// use spotmap::compute::diff::diff;
/// use spotmap_types::point::GeoPoint;
/// use geo::Point;
///
/// let a = Annotation::Point(PointAnnotation::new(GeoPoint::new("a", Point::new(0.0, 0.0), "A")));
/// let b = Annotation::Point(PointAnnotation::new(GeoPoint::new("b", Point::new(1.0, 1.0), "B")));
///
/// let previous: AnnotationSet = [a.clone()].into_iter().collect();
/// let next: AnnotationSet = [a, b.clone()].into_iter().collect();
///
/// let changes = diff(&previous, &next);
/// assert!(changes.to_remove.is_empty());
/// assert_eq!(changes.to_add, vec![b]);
/// ```
pub fn diff(previous: &AnnotationSet, next: &AnnotationSet) -> AnnotationDiff {
    let mut to_remove: Vec<(&AnnotationKey, &Annotation)> = previous
        .iter()
        .filter(|(key, _)| !next.contains_key(key))
        .collect();
    let mut to_add: Vec<(&AnnotationKey, &Annotation)> = next
        .iter()
        .filter(|(key, _)| !previous.contains_key(key))
        .collect();

    to_remove.sort_by(|a, b| a.0.cmp(b.0));
    to_add.sort_by(|a, b| a.0.cmp(b.0));

    AnnotationDiff {
        to_remove: to_remove.into_iter().map(|(_, a)| a.clone()).collect(),
        to_add: to_add.into_iter().map(|(_, a)| a.clone()).collect(),
    }
}
