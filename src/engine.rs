//! The map engine: stores, recompute pipeline and selection behind one handle.
//!
//! Every viewport change and every data change runs the same pipeline:
//! rebuild the grid (or reuse the cached one), resolve annotations, diff against the
//! previous set and hand the diff to the [`RenderSink`].
//!
//! One recomputation runs at a time. Requests that arrive while one is in flight
//! replace each other in a single pending slot, so a drag gesture never builds up a
//! backlog: the running worker picks up only the latest viewport, and a result
//! computed for a viewport that has since been replaced is discarded.
//!
//! ```rust
//! use spotmap::{EngineBuilder, RecomputeOutcome};
//! use spotmap_types::point::GeoPoint;
//! use spotmap_types::viewport::Viewport;
//! use geo::Point;
//!
//! let engine = EngineBuilder::new().build()?;
//! engine.upsert_point(GeoPoint::new("a", Point::new(0.0, 0.0), "A"))?;
//! engine.upsert_point(GeoPoint::new("b", Point::new(0.0001, 0.0), "B"))?;
//!
//! let outcome = engine.viewport_changed(Viewport::new(Point::new(0.0, 0.0), 0.1, 0.1, 14.0));
//! let RecomputeOutcome::Applied(diff) = outcome else { unreachable!() };
//! assert_eq!(diff.to_add.len(), 1);
//! assert_eq!(diff.to_add[0].count(), 2);
//! # Ok::<(), spotmap::SpotmapError>(())
//! ```

use parking_lot::Mutex;
use spotmap_types::group::{Group, GroupId};
use spotmap_types::point::{GeoPoint, PointId};
use spotmap_types::viewport::Viewport;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Receiver;
use std::time::SystemTime;

use crate::compute::absorption::absorption_candidates;
use crate::compute::cluster::{AnnotationSet, ClusterAnnotation, resolve};
use crate::compute::diff::{AnnotationDiff, MemorySurface, RenderSink, diff};
use crate::compute::grid::SpatialGrid;
use crate::compute::projection::zoom_bucket;
use crate::config::Config;
use crate::error::{Result, SpotmapError};
use crate::selection::{SelectionResolver, SelectionSink, SelectionState};
use crate::session::SessionResult;
use crate::store::{GroupStore, PointChange, PointStore};

/// What happened to a recompute request.
#[derive(Debug, Clone, PartialEq)]
pub enum RecomputeOutcome {
    /// This call ran the pipeline and applied the diff to the render sink.
    Applied(AnnotationDiff),
    /// This call's result was discarded because a newer request arrived meanwhile.
    Superseded,
    /// Another call was already recomputing and took over this request.
    Coalesced,
}

/// Pipeline counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub recomputations: u64,
    pub superseded: u64,
    pub coalesced: u64,
    pub grid_rebuilds: u64,
    pub last_diff_added: usize,
    pub last_diff_removed: usize,
}

#[derive(Debug)]
struct Request {
    seq: u64,
    /// `None` recomputes at the current viewport.
    viewport: Option<Viewport>,
}

#[derive(Debug)]
struct CachedGrid {
    generation: u64,
    grid: SpatialGrid,
}

/// Everything a recomputation reads or writes.
struct Pipeline {
    points: PointStore,
    groups: GroupStore,
    sink: Box<dyn RenderSink>,
    viewport: Option<Viewport>,
    previous: AnnotationSet,
    grid: Option<CachedGrid>,
    last_diff: (usize, usize),
}

impl Pipeline {
    fn grid_for(&mut self, config: &Config, viewport: &Viewport, rebuilds: &AtomicU64) -> &SpatialGrid {
        let generation = self.points.generation();
        let bucket = zoom_bucket(viewport.zoom);
        let cached = match self.grid.take() {
            Some(cached) if cached.generation == generation && cached.grid.zoom() == bucket => cached,
            _ => {
                rebuilds.fetch_add(1, Ordering::Relaxed);
                CachedGrid {
                    generation,
                    grid: SpatialGrid::rebuild(
                        self.points.iter(),
                        &config.cell_sizes,
                        viewport.zoom,
                        config.tile_size,
                    ),
                }
            }
        };
        &self.grid.insert(cached).grid
    }

    fn commit(&mut self, viewport: Viewport, next: AnnotationSet) -> AnnotationDiff {
        let changes = diff(&self.previous, &next);
        if !changes.is_empty() {
            self.sink.apply_diff(&changes.to_remove, &changes.to_add);
        }
        log::trace!(
            "Applied diff: {} removed, {} added",
            changes.to_remove.len(),
            changes.to_add.len()
        );
        self.last_diff = (changes.to_add.len(), changes.to_remove.len());
        self.previous = next;
        self.viewport = Some(viewport);
        changes
    }

    /// Newest discovery time among a group's members.
    fn newest_member_time(&self, group: &Group) -> Option<SystemTime> {
        group
            .member_ids
            .iter()
            .filter_map(|id| self.points.get(id))
            .map(|point| point.discovered_at)
            .max()
    }

    fn absorb(&mut self, config: &Config, id: &GroupId) -> Result<Vec<PointId>> {
        let group = self
            .groups
            .get(id)
            .ok_or_else(|| SpotmapError::UnknownGroup(id.to_string()))?;
        let anchor = self.newest_member_time(group);
        let candidates = self
            .points
            .iter()
            .filter(|point| !self.groups.is_grouped(&point.id));
        let absorbed = absorption_candidates(&config.absorption, group, anchor, candidates);

        if !absorbed.is_empty() {
            log::debug!("Absorbing {} discoveries into {}", absorbed.len(), id);
            self.groups.add_members(id, absorbed.iter().cloned())?;
        }
        Ok(absorbed)
    }
}

struct EngineState {
    pipeline: Pipeline,
    selection: SelectionResolver,
}

/// Thread-safe map engine.
///
/// All methods take `&self`; share it between threads with an `Arc`.
pub struct MapEngine {
    config: Config,
    state: Mutex<EngineState>,
    pending: Mutex<Option<Request>>,
    requested: AtomicU64,
    recomputations: AtomicU64,
    superseded: AtomicU64,
    coalesced: AtomicU64,
    grid_rebuilds: AtomicU64,
}

impl MapEngine {
    /// Create an engine with the given configuration and render sink.
    pub fn new(config: Config, sink: Box<dyn RenderSink>) -> Result<Self> {
        config.validate()?;
        let selection = SelectionResolver::new(config.panel_overlap_fraction);
        Ok(Self {
            state: Mutex::new(EngineState {
                pipeline: Pipeline {
                    points: PointStore::new(),
                    groups: GroupStore::new(),
                    sink,
                    viewport: None,
                    previous: AnnotationSet::new(),
                    grid: None,
                    last_diff: (0, 0),
                },
                selection,
            }),
            config,
            pending: Mutex::new(None),
            requested: AtomicU64::new(0),
            recomputations: AtomicU64::new(0),
            superseded: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
            grid_rebuilds: AtomicU64::new(0),
        })
    }

    /// Engine rendering into an in-memory surface.
    pub fn memory() -> Result<Self> {
        Self::new(Config::default(), Box::new(MemorySurface::default()))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn set_selection_sink(&self, sink: Box<dyn SelectionSink>) {
        self.with_state(|state| state.selection.set_sink(sink));
    }

    // ===== Recompute pipeline =====

    /// Recompute for a new viewport.
    ///
    /// Never blocks behind a running recomputation: if one is in flight, the request
    /// is left for it and `Coalesced` is returned.
    pub fn viewport_changed(&self, viewport: Viewport) -> RecomputeOutcome {
        self.post(Some(viewport));
        self.drive()
    }

    /// Recompute at the current viewport.
    pub fn refresh(&self) -> RecomputeOutcome {
        self.post(None);
        self.drive()
    }

    fn post(&self, viewport: Option<Viewport>) {
        let mut pending = self.pending.lock();
        let seq = self.requested.fetch_add(1, Ordering::SeqCst) + 1;
        let viewport = viewport.or_else(|| pending.take().and_then(|request| request.viewport));
        *pending = Some(Request { seq, viewport });
    }

    fn take_pending(&self) -> Option<Request> {
        self.pending.lock().take()
    }

    fn drive(&self) -> RecomputeOutcome {
        let mut outcome = None;
        while let Some(mut state) = self.state.try_lock() {
            while let Some(request) = self.take_pending() {
                outcome = Some(self.run(&mut state.pipeline, request));
            }
            drop(state);

            // a request posted after the last take but before unlock saw the lock held
            if self.pending.lock().is_none() {
                break;
            }
        }

        outcome.unwrap_or_else(|| {
            self.coalesced.fetch_add(1, Ordering::Relaxed);
            log::debug!("Recomputation in flight, coalescing request");
            RecomputeOutcome::Coalesced
        })
    }

    fn run(&self, pipeline: &mut Pipeline, request: Request) -> RecomputeOutcome {
        let Some(viewport) = request.viewport.or(pipeline.viewport) else {
            // nothing has been shown yet
            return RecomputeOutcome::Applied(AnnotationDiff::default());
        };

        let groups = pipeline.groups.list_groups();
        let grid = pipeline.grid_for(&self.config, &viewport, &self.grid_rebuilds);
        let next = resolve(grid, &viewport, &groups);

        if self.requested.load(Ordering::SeqCst) != request.seq {
            self.superseded.fetch_add(1, Ordering::Relaxed);
            log::debug!("Discarding stale recomputation #{}", request.seq);
            // a newer plain refresh still has to land on this viewport
            if let Some(newer) = self.pending.lock().as_mut()
                && newer.viewport.is_none()
            {
                newer.viewport = Some(viewport);
            }
            return RecomputeOutcome::Superseded;
        }

        self.recomputations.fetch_add(1, Ordering::Relaxed);
        RecomputeOutcome::Applied(pipeline.commit(viewport, next))
    }

    /// Recompute while already holding the state lock. Anything posted meanwhile is
    /// left for [`Self::drain`].
    fn refresh_locked(&self, pipeline: &mut Pipeline) {
        let request = {
            let mut pending = self.pending.lock();
            match pending.take() {
                Some(request) => request,
                None => Request {
                    seq: self.requested.fetch_add(1, Ordering::SeqCst) + 1,
                    viewport: None,
                },
            }
        };
        self.run(pipeline, request);
    }

    fn drain(&self) {
        if self.pending.lock().is_some() {
            self.drive();
        }
    }

    /// Run `f` under the state lock, then pick up any request that was coalesced
    /// because the lock was held.
    fn with_state<T>(&self, f: impl FnOnce(&mut EngineState) -> T) -> T {
        let result = {
            let mut state = self.state.lock();
            f(&mut *state)
        };
        self.drain();
        result
    }

    /// Snapshot of the annotations currently rendered.
    pub fn annotations(&self) -> AnnotationSet {
        self.with_state(|state| state.pipeline.previous.clone())
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.with_state(|state| state.pipeline.viewport)
    }

    pub fn stats(&self) -> EngineStats {
        let (last_diff_added, last_diff_removed) = self.with_state(|state| state.pipeline.last_diff);
        EngineStats {
            recomputations: self.recomputations.load(Ordering::Relaxed),
            superseded: self.superseded.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            grid_rebuilds: self.grid_rebuilds.load(Ordering::Relaxed),
            last_diff_added,
            last_diff_removed,
        }
    }

    // ===== Discoveries =====

    /// Insert or replace a discovery and recompute. Returns `true` if the id was new.
    pub fn upsert_point(&self, point: GeoPoint) -> Result<bool> {
        self.with_state(|state| -> Result<bool> {
            let inserted = state.pipeline.points.upsert(point)?;
            self.refresh_locked(&mut state.pipeline);
            Ok(inserted)
        })
    }

    /// Remove a discovery. Unknown ids are a no-op.
    pub fn remove_point(&self, id: &PointId) -> Option<GeoPoint> {
        self.with_state(|state| -> Option<GeoPoint> {
            let removed = state.pipeline.points.remove(id)?;
            state.pipeline.groups.remove_point(id);
            if state.selection.state().point_id() == Some(id) {
                state.selection.dismiss();
            }
            self.refresh_locked(&mut state.pipeline);
            Some(removed)
        })
    }

    /// Store the discovery produced by an accepted recognition session.
    pub fn commit_discovery(&self, result: SessionResult) -> Result<Option<PointId>> {
        match result {
            SessionResult::Discovered(point) => {
                let id = point.id.clone();
                self.upsert_point(point)?;
                Ok(Some(id))
            }
            SessionResult::NoMatch => {
                log::debug!("Recognition finished without a match");
                Ok(None)
            }
            SessionResult::Failed(reason) => {
                log::warn!("Recognition failed: {}", reason);
                Ok(None)
            }
        }
    }

    pub fn point(&self, id: &PointId) -> Option<GeoPoint> {
        self.with_state(|state| state.pipeline.points.get(id).cloned())
    }

    pub fn list_active_points(&self) -> Vec<GeoPoint> {
        self.with_state(|state| state.pipeline.points.list_active_points())
    }

    pub fn subscribe(&self) -> Receiver<PointChange> {
        self.with_state(|state| state.pipeline.points.subscribe())
    }

    // ===== Spots =====

    /// Add a Spot, apply the absorption policy and recompute.
    pub fn create_group(&self, group: Group) -> Result<GroupId> {
        self.with_state(|state| -> Result<GroupId> {
            let id = state.pipeline.groups.create(group)?;
            state.pipeline.absorb(&self.config, &id)?;
            self.refresh_locked(&mut state.pipeline);
            Ok(id)
        })
    }

    /// Turn a tapped cluster into a Spot.
    ///
    /// Clears the discovery selection, creates the Spot from the cluster's members,
    /// applies the absorption policy, recomputes so the members collapse into the Spot,
    /// and ends by selecting the new Spot. The selection sink is notified once. If the
    /// Spot cannot be created the selection is left as it was.
    pub fn group_cluster(
        &self,
        name: impl Into<String>,
        cluster: &ClusterAnnotation,
    ) -> Result<Group> {
        self.with_state(|state| -> Result<Group> {
            let pipeline = &mut state.pipeline;
            if let Some(missing) = cluster
                .member_ids
                .iter()
                .find(|id| !pipeline.points.contains(id))
            {
                return Err(SpotmapError::UnknownPoint(missing.to_string()));
            }

            state.selection.try_transaction(|tx| {
                if tx.state().point_id().is_some() {
                    tx.dismiss();
                }
                let group = self.create_from_cluster(pipeline, name, cluster)?;
                tx.show_group(&group);
                Ok(group)
            })
        })
    }

    fn create_from_cluster(
        &self,
        pipeline: &mut Pipeline,
        name: impl Into<String>,
        cluster: &ClusterAnnotation,
    ) -> Result<Group> {
        let created = pipeline.groups.create_from_cluster(name, cluster)?;
        pipeline.absorb(&self.config, &created.id)?;
        self.refresh_locked(pipeline);
        Ok(pipeline.groups.get(&created.id).cloned().unwrap_or(created))
    }

    /// Apply the absorption policy to an existing Spot. Returns the absorbed ids.
    pub fn absorb_nearby(&self, id: &GroupId) -> Result<Vec<PointId>> {
        self.with_state(|state| -> Result<Vec<PointId>> {
            let absorbed = state.pipeline.absorb(&self.config, id)?;
            if !absorbed.is_empty() {
                self.refresh_locked(&mut state.pipeline);
            }
            Ok(absorbed)
        })
    }

    /// Delete a Spot; its members reappear as discoveries. Unknown ids are a no-op.
    pub fn remove_group(&self, id: &GroupId) -> Option<Group> {
        self.with_state(|state| -> Option<Group> {
            let removed = state.pipeline.groups.remove(id)?;
            if state.selection.state().group_id() == Some(id) {
                state.selection.dismiss();
            }
            self.refresh_locked(&mut state.pipeline);
            Some(removed)
        })
    }

    pub fn group(&self, id: &GroupId) -> Option<Group> {
        self.with_state(|state| state.pipeline.groups.get(id).cloned())
    }

    pub fn list_groups(&self) -> Vec<Group> {
        self.with_state(|state| state.pipeline.groups.list_groups())
    }

    // ===== Selection =====

    pub fn select_point(&self, id: &PointId) -> Result<SelectionState> {
        self.with_state(|state| -> Result<SelectionState> {
            let point = state
                .pipeline
                .points
                .get(id)
                .ok_or_else(|| SpotmapError::UnknownPoint(id.to_string()))?;
            state.selection.show_point(point);
            Ok(state.selection.state().clone())
        })
    }

    pub fn select_group(&self, id: &GroupId) -> Result<SelectionState> {
        self.with_state(|state| -> Result<SelectionState> {
            let group = state
                .pipeline
                .groups
                .get(id)
                .ok_or_else(|| SpotmapError::UnknownGroup(id.to_string()))?;
            state.selection.show_group(group);
            Ok(state.selection.state().clone())
        })
    }

    pub fn dismiss_selection(&self) {
        self.with_state(|state| state.selection.dismiss());
    }

    pub fn selection(&self) -> SelectionState {
        self.with_state(|state| state.selection.state().clone())
    }

    pub fn panel_shrink_hint(&self, panel_height: f64, viewport_height: f64) -> bool {
        self.with_state(|state| {
            state
                .selection
                .panel_shrink_hint(panel_height, viewport_height)
        })
    }
}

impl std::fmt::Debug for MapEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapEngine")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
