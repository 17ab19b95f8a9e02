//! Zoom-aware clustering of music discoveries on a map.
//!
//! Discoveries are bucketed into a screen-space grid per zoom level, each visible cell
//! becomes a single point or a cluster, discoveries gathered into a named Spot are
//! shown once as the Spot, and only the difference to the previous frame is handed to
//! the renderer.
//!
//! ```rust
//! use spotmap::prelude::*;
//!
//! let engine = EngineBuilder::new().build()?;
//! engine.upsert_point(GeoPoint::new("a", Point::new(0.0, 0.0), "Song A"))?;
//! engine.upsert_point(GeoPoint::new("b", Point::new(0.0001, 0.0), "Song B"))?;
//!
//! // close together at street level
//! engine.viewport_changed(Viewport::new(Point::new(0.0, 0.0), 0.05, 0.05, 14.0));
//! assert_eq!(engine.annotations().len(), 1);
//!
//! // apart at building level
//! engine.viewport_changed(Viewport::new(Point::new(0.0, 0.0), 0.001, 0.001, 20.0));
//! assert_eq!(engine.annotations().len(), 2);
//! # Ok::<(), spotmap::SpotmapError>(())
//! ```

pub mod builder;
pub mod compute;
pub mod config;
pub mod engine;
pub mod error;
pub mod selection;
pub mod session;
pub mod store;

pub use builder::EngineBuilder;
pub use engine::{EngineStats, MapEngine, RecomputeOutcome};
pub use error::{Result, SpotmapError};

pub use geo::Point;

pub use compute::{
    Annotation, AnnotationDiff, AnnotationKey, AnnotationSet, ClusterAnnotation,
    GroupAnnotation, MemorySurface, PointAnnotation, RenderSink, SpatialGrid, diff, resolve,
};

pub use config::{AbsorptionPolicy, CellSizeTable, Config, SessionConfig, ZoomStep};

pub use selection::{SelectionResolver, SelectionSink, SelectionState};

pub use session::{
    CancelReason, CancellationToken, Delivery, DropReason, Match, RecognitionOutcome,
    SessionCommand, SessionHandle, SessionManager, SessionResult,
};

pub use store::{GroupStore, PointChange, PointStore};

pub use spotmap_types::group::{Group, GroupId};
pub use spotmap_types::point::{GeoPoint, PointId};
pub use spotmap_types::viewport::{Span, Viewport};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{EngineBuilder, MapEngine, RecomputeOutcome, Result, SpotmapError};

    pub use geo::Point;

    pub use crate::{Annotation, AnnotationDiff, AnnotationSet, ClusterAnnotation, RenderSink};

    pub use crate::{Config, SelectionState};

    pub use crate::{GeoPoint, Group, GroupId, PointId, Viewport};

    pub use crate::{RecognitionOutcome, SessionManager};

    pub use std::time::Duration;
}
