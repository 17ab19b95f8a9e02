//! # spotmap-types
//!
//! Core value types shared by the spotmap clustering engine and its collaborators:
//!
//! - **Point types**: `PointId`, `GeoPoint` (one music discovery on the map)
//! - **Group types**: `GroupId`, `Group` (a named Spot holding discoveries)
//! - **Viewport types**: `Viewport`, `Span`
//!
//! Coordinates are `geo::Point<f64>` with x = longitude and y = latitude, in degrees.
//! All types are serializable with Serde.
//!
//! ## Examples
//!
//! ```rust
//! use spotmap_types::point::GeoPoint;
//! use spotmap_types::viewport::Viewport;
//! use geo::Point;
//!
//! let discovery = GeoPoint::new("a", Point::new(-74.0060, 40.7128), "Harvest Moon");
//! let viewport = Viewport::new(Point::new(-74.0, 40.7), 0.5, 0.5, 14.0);
//! assert!(viewport.contains(&discovery.coordinate));
//! ```

pub mod group;
pub mod point;
pub mod viewport;
