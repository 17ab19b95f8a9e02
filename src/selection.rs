//! Selection state: what the map is currently presenting.
//!
//! A single tagged state replaces separate "selected point" and "selected Spot" slots,
//! so both can never be set at once. Every transition is synchronous; the last
//! transition wins, and `dismiss` always returns to [`SelectionState::None`].
//!
//! Compound user actions (turning a tapped cluster into a Spot, for instance) should
//! run inside [`SelectionResolver::transaction`] and end with `show_group`, which makes
//! the Spot the visible outcome and notifies the sink once.

use geo::Point;
use spotmap_types::group::{Group, GroupId};
use spotmap_types::point::{GeoPoint, PointId};

/// Currently presented entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum SelectionState {
    #[default]
    None,
    Point {
        id: PointId,
        coordinate: Point<f64>,
    },
    Group {
        id: GroupId,
        coordinate: Point<f64>,
    },
}

impl SelectionState {
    /// Coordinate the camera should recenter on.
    pub fn focus_coordinate(&self) -> Option<Point<f64>> {
        match self {
            SelectionState::None => None,
            SelectionState::Point { coordinate, .. } | SelectionState::Group { coordinate, .. } => {
                Some(*coordinate)
            }
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, SelectionState::None)
    }

    pub fn point_id(&self) -> Option<&PointId> {
        match self {
            SelectionState::Point { id, .. } => Some(id),
            _ => None,
        }
    }

    pub fn group_id(&self) -> Option<&GroupId> {
        match self {
            SelectionState::Group { id, .. } => Some(id),
            _ => None,
        }
    }
}

/// Receives selection changes. Implemented by the camera / detail-panel collaborator.
pub trait SelectionSink: Send {
    fn on_selection_changed(&mut self, state: &SelectionState);
}

/// Transitions recorded inside [`SelectionResolver::transaction`].
#[derive(Debug)]
pub struct SelectionTransaction {
    state: SelectionState,
    selected: bool,
}

impl SelectionTransaction {
    pub fn show_point(&mut self, point: &GeoPoint) {
        self.show_point_at(point.id.clone(), point.coordinate);
    }

    pub fn show_point_at(&mut self, id: PointId, coordinate: Point<f64>) {
        self.state = SelectionState::Point { id, coordinate };
        self.selected = true;
    }

    pub fn show_group(&mut self, group: &Group) {
        self.state = SelectionState::Group {
            id: group.id.clone(),
            coordinate: group.coordinate,
        };
        self.selected = true;
    }

    pub fn dismiss(&mut self) {
        self.state = SelectionState::None;
        self.selected = false;
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }
}

/// Owner of the selection state.
pub struct SelectionResolver {
    state: SelectionState,
    panel_overlap_fraction: f64,
    fresh_selection: bool,
    sink: Option<Box<dyn SelectionSink>>,
}

impl SelectionResolver {
    pub fn new(panel_overlap_fraction: f64) -> Self {
        Self {
            state: SelectionState::None,
            panel_overlap_fraction,
            fresh_selection: false,
            sink: None,
        }
    }

    pub fn with_sink(mut self, sink: Box<dyn SelectionSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn set_sink(&mut self, sink: Box<dyn SelectionSink>) {
        self.sink = Some(sink);
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn focus_coordinate(&self) -> Option<Point<f64>> {
        self.state.focus_coordinate()
    }

    /// Select a discovery, clearing any selected Spot.
    pub fn show_point(&mut self, point: &GeoPoint) {
        self.transaction(|tx| tx.show_point(point));
    }

    pub fn show_point_at(&mut self, id: PointId, coordinate: Point<f64>) {
        self.transaction(|tx| tx.show_point_at(id, coordinate));
    }

    /// Select a Spot, clearing any selected discovery.
    pub fn show_group(&mut self, group: &Group) {
        self.transaction(|tx| tx.show_group(group));
    }

    /// Clear the selection, whatever it was.
    pub fn dismiss(&mut self) {
        self.transaction(|tx| tx.dismiss());
    }

    /// Apply several transitions as one logical update. The sink sees only the final
    /// state, and only if it differs from the state before the update.
    pub fn transaction<F, T>(&mut self, f: F) -> T
    where
        F: FnOnce(&mut SelectionTransaction) -> T,
    {
        let mut tx = self.begin();
        let result = f(&mut tx);
        self.commit(tx);
        result
    }

    /// Like [`Self::transaction`], but an `Err` from `f` discards every transition it
    /// recorded and the sink is not called.
    pub fn try_transaction<F, T, E>(&mut self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut SelectionTransaction) -> std::result::Result<T, E>,
    {
        let mut tx = self.begin();
        let value = f(&mut tx)?;
        self.commit(tx);
        Ok(value)
    }

    fn begin(&self) -> SelectionTransaction {
        SelectionTransaction {
            state: self.state.clone(),
            selected: false,
        }
    }

    fn commit(&mut self, tx: SelectionTransaction) {
        let changed = tx.state != self.state;
        self.state = tx.state;
        self.fresh_selection = if self.state.is_none() {
            false
        } else {
            tx.selected || self.fresh_selection
        };
        if changed && let Some(sink) = self.sink.as_mut() {
            sink.on_selection_changed(&self.state);
        }
    }

    /// Whether the detail panel should shrink: true only if a selection happened since
    /// the last call and the panel covers more than the configured fraction of the
    /// viewport height. Reading the hint consumes the pending selection.
    pub fn panel_shrink_hint(&mut self, panel_height: f64, viewport_height: f64) -> bool {
        let fresh = std::mem::take(&mut self.fresh_selection);
        if !fresh || !(viewport_height > 0.0) || !panel_height.is_finite() {
            return false;
        }
        panel_height / viewport_height > self.panel_overlap_fraction
    }
}

impl std::fmt::Debug for SelectionResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectionResolver")
            .field("state", &self.state)
            .field("panel_overlap_fraction", &self.panel_overlap_fraction)
            .field("fresh_selection", &self.fresh_selection)
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<SelectionState>>>);

    impl SelectionSink for Recorder {
        fn on_selection_changed(&mut self, state: &SelectionState) {
            self.0.lock().unwrap().push(state.clone());
        }
    }

    fn discovery(id: &str) -> GeoPoint {
        GeoPoint::new(id, Point::new(1.0, 2.0), id)
    }

    fn spot(id: &str) -> Group {
        Group::new(id, id, Point::new(3.0, 4.0))
    }

    #[test]
    fn test_initial_state_is_none() {
        let resolver = SelectionResolver::new(0.5);
        assert!(resolver.state().is_none());
        assert_eq!(resolver.focus_coordinate(), None);
    }

    #[test]
    fn test_show_group_clears_point() {
        let mut resolver = SelectionResolver::new(0.5);
        resolver.show_point(&discovery("x"));
        resolver.show_group(&spot("g"));

        assert_eq!(resolver.state().group_id(), Some(&GroupId::from("g")));
        assert_eq!(resolver.state().point_id(), None);
        assert_eq!(resolver.focus_coordinate(), Some(Point::new(3.0, 4.0)));
    }

    #[test]
    fn test_show_point_clears_group() {
        let mut resolver = SelectionResolver::new(0.5);
        resolver.show_group(&spot("g"));
        resolver.show_point(&discovery("x"));

        assert_eq!(resolver.state().point_id(), Some(&PointId::from("x")));
        assert_eq!(resolver.state().group_id(), None);
    }

    #[test]
    fn test_dismiss_from_any_state() {
        let mut resolver = SelectionResolver::new(0.5);
        resolver.dismiss();
        assert!(resolver.state().is_none());

        resolver.show_point(&discovery("x"));
        resolver.dismiss();
        assert!(resolver.state().is_none());

        resolver.show_group(&spot("g"));
        resolver.dismiss();
        assert!(resolver.state().is_none());
    }

    #[test]
    fn test_transaction_notifies_once_with_final_state() {
        let recorder = Recorder::default();
        let mut resolver = SelectionResolver::new(0.5).with_sink(Box::new(recorder.clone()));

        resolver.transaction(|tx| {
            tx.show_point(&discovery("x"));
            tx.dismiss();
            tx.show_group(&spot("g"));
        });

        let seen = recorder.0.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].group_id(), Some(&GroupId::from("g")));
    }

    #[test]
    fn test_unchanged_state_is_not_notified() {
        let recorder = Recorder::default();
        let mut resolver = SelectionResolver::new(0.5).with_sink(Box::new(recorder.clone()));

        resolver.dismiss();
        resolver.show_point(&discovery("x"));
        resolver.show_point(&discovery("x"));
        resolver.transaction(|tx| {
            tx.dismiss();
            tx.show_point(&discovery("x"));
        });

        let seen = recorder.0.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].point_id(), Some(&PointId::from("x")));
    }

    #[test]
    fn test_failed_transaction_rolls_back() {
        let recorder = Recorder::default();
        let mut resolver = SelectionResolver::new(0.5).with_sink(Box::new(recorder.clone()));
        resolver.show_point(&discovery("x"));
        resolver.panel_shrink_hint(0.0, 800.0);

        let result: Result<(), &str> = resolver.try_transaction(|tx| {
            tx.dismiss();
            tx.show_group(&spot("g"));
            Err("creation failed")
        });

        assert_eq!(result, Err("creation failed"));
        assert_eq!(resolver.state().point_id(), Some(&PointId::from("x")));
        assert_eq!(recorder.0.lock().unwrap().len(), 1);
        // no fresh selection was recorded
        assert!(!resolver.panel_shrink_hint(700.0, 800.0));
    }

    #[test]
    fn test_panel_shrink_requires_fresh_selection() {
        let mut resolver = SelectionResolver::new(0.5);
        assert!(!resolver.panel_shrink_hint(600.0, 800.0));

        resolver.show_point(&discovery("x"));
        assert!(resolver.panel_shrink_hint(600.0, 800.0));
        // consumed
        assert!(!resolver.panel_shrink_hint(600.0, 800.0));
    }

    #[test]
    fn test_panel_shrink_requires_large_panel() {
        let mut resolver = SelectionResolver::new(0.5);
        resolver.show_group(&spot("g"));
        assert!(!resolver.panel_shrink_hint(400.0, 800.0));

        resolver.show_group(&spot("g"));
        assert!(!resolver.panel_shrink_hint(600.0, 0.0));
    }

    #[test]
    fn test_dismiss_cancels_pending_shrink() {
        let mut resolver = SelectionResolver::new(0.5);
        resolver.show_point(&discovery("x"));
        resolver.dismiss();
        assert!(!resolver.panel_shrink_hint(700.0, 800.0));
    }
}
