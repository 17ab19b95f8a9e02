//! Compute layer: the pure functions behind the map view.
//!
//! - `projection`: Web Mercator pixel projection
//! - `grid`: zoom-dependent spatial bucketing
//! - `cluster`: cells to annotations
//! - `diff`: minimal add/remove lists between two annotation sets
//! - `absorption`: nearby-discovery absorption into Spots
//!
//! None of these hold state; the engine owns caching and scheduling.

pub mod absorption;
pub mod cluster;
pub mod diff;
#[cfg(feature = "geojson")]
pub mod geojson;
pub mod grid;
pub mod projection;
pub mod validation;

pub use cluster::{
    Annotation, AnnotationKey, AnnotationSet, ClusterAnnotation, GroupAnnotation,
    PointAnnotation, resolve,
};
pub use diff::{AnnotationDiff, MemorySurface, RenderSink, diff};
pub use grid::{Cell, CellKey, SpatialGrid, cell_key};
