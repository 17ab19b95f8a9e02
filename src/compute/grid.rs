//! Spatial grid index: zoom-dependent square buckets in map-pixel space.
//!
//! A point's cell is found by projecting it into the pixel plane of the current zoom
//! bucket, dividing by the cell edge and flooring. Cell keys only depend on the point,
//! the zoom bucket, the cell edge and the tile size, so rebuilding with the same input
//! always yields the same assignment.

use geo::Point;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use spotmap_types::point::{GeoPoint, PointId};
use spotmap_types::viewport::Viewport;
use std::sync::Arc;

use crate::compute::projection::{self, project_lat, world_size, zoom_bucket};
use crate::compute::validation::validate_geographic_point;
use crate::config::CellSizeTable;

/// Integer cell coordinates in the grid of one zoom bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellKey {
    pub x: i64,
    pub y: i64,
}

impl CellKey {
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Both cell coordinates packed into a single integer (x in the high half).
    ///
    /// Coordinates are non-negative and below 2^32 for every supported zoom bucket.
    #[inline]
    pub fn packed(&self) -> u64 {
        ((self.x as u64) << 32) | (self.y as u64 & 0xFFFF_FFFF)
    }
}

/// Cell of `point` at `zoom` for a given cell edge (map pixels) and tile size.
///
/// # Examples
///
/// ```
/// use spotmap::compute::grid::{cell_key, CellKey};
/// use geo::Point;
///
/// // Zoom 1, 256px tiles: the world is 512px wide; 64px cells give an 8x8 grid.
/// let key = cell_key(&Point::new(0.0, 0.0), 1.0, 64.0, 256.0);
/// assert_eq!(key, CellKey::new(4, 4));
/// assert_eq!(key, cell_key(&Point::new(0.0, 0.0), 1.0, 64.0, 256.0));
/// ```
pub fn cell_key(point: &Point<f64>, zoom: f64, cell_edge: f64, tile_size: f64) -> CellKey {
    let (x, y) = projection::project(point, zoom_bucket(zoom), tile_size);
    CellKey::new((x / cell_edge).floor() as i64, (y / cell_edge).floor() as i64)
}

/// A discovery placed in a cell, shared with the annotations built from it.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub point: Arc<GeoPoint>,
}

impl Member {
    pub fn id(&self) -> &PointId {
        &self.point.id
    }

    /// Coordinate the discovery was bucketed with.
    pub fn coordinate(&self) -> Point<f64> {
        self.point.coordinate
    }
}

/// One spatial bucket. Members are kept sorted by ascending id.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub key: CellKey,
    members: SmallVec<[Member; 4]>,
}

impl Cell {
    fn new(key: CellKey) -> Self {
        Self {
            key,
            members: SmallVec::new(),
        }
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, id: &PointId) -> bool {
        self.members
            .binary_search_by(|member| member.id().cmp(id))
            .is_ok()
    }
}

/// Points partitioned into cells for one zoom bucket.
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    zoom: u8,
    cell_edge: f64,
    tile_size: f64,
    cells: FxHashMap<CellKey, Cell>,
    point_count: usize,
}

impl SpatialGrid {
    /// Bucket `points` for the given zoom level. Points with invalid coordinates are
    /// skipped.
    pub fn rebuild<'a, I>(points: I, cell_sizes: &CellSizeTable, zoom: f64, tile_size: f64) -> Self
    where
        I: IntoIterator<Item = &'a GeoPoint>,
    {
        let bucket = zoom_bucket(zoom);
        let cell_edge = cell_sizes.cell_edge_for_zoom(f64::from(bucket));
        let mut cells: FxHashMap<CellKey, Cell> = FxHashMap::default();
        let mut point_count = 0;

        for point in points {
            if let Err(e) = validate_geographic_point(&point.coordinate) {
                log::warn!("Skipping point {} while building grid: {}", point.id, e);
                continue;
            }
            let key = cell_key(&point.coordinate, f64::from(bucket), cell_edge, tile_size);
            cells.entry(key).or_insert_with(|| Cell::new(key)).members.push(Member {
                point: Arc::new(point.clone()),
            });
            point_count += 1;
        }

        for cell in cells.values_mut() {
            cell.members.sort_by(|a, b| a.id().cmp(b.id()));
        }

        Self {
            zoom: bucket,
            cell_edge,
            tile_size,
            cells,
            point_count,
        }
    }

    /// Zoom bucket the grid was built for.
    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn cell_edge(&self) -> f64 {
        self.cell_edge
    }

    pub fn len(&self) -> usize {
        self.point_count
    }

    pub fn is_empty(&self) -> bool {
        self.point_count == 0
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn cell(&self, key: &CellKey) -> Option<&Cell> {
        self.cells.get(key)
    }

    /// Key a coordinate would have in this grid.
    pub fn key_for(&self, point: &Point<f64>) -> CellKey {
        cell_key(point, f64::from(self.zoom), self.cell_edge, self.tile_size)
    }

    /// All cells, ordered by key.
    pub fn cells(&self) -> Vec<&Cell> {
        let mut cells: Vec<&Cell> = self.cells.values().collect();
        cells.sort_by_key(|cell| cell.key);
        cells
    }

    /// Cells intersecting the viewport, ordered by key. An empty viewport intersects
    /// nothing.
    pub fn cells_in_viewport(&self, viewport: &Viewport) -> Vec<&Cell> {
        if viewport.is_empty() {
            return Vec::new();
        }

        let size = world_size(self.zoom, self.tile_size);
        let (south, north) = viewport.lat_range();
        let row_min = (project_lat(north, size) / self.cell_edge).floor() as i64;
        let row_max = (project_lat(south, size) / self.cell_edge).floor() as i64;

        let last_column = ((size / self.cell_edge).ceil() as i64 - 1).max(0);
        let columns: SmallVec<[(i64, i64); 3]> = viewport
            .lon_ranges()
            .into_iter()
            .flat_map(|(west, east)| {
                let x_min = (west + 180.0) / 360.0 * size;
                let x_max = (east + 180.0) / 360.0 * size;
                let first = ((x_min / self.cell_edge).floor() as i64).clamp(0, last_column);
                let last = ((x_max / self.cell_edge).floor() as i64).clamp(0, last_column);
                let mut ranges: SmallVec<[(i64, i64); 2]> = SmallVec::new();
                ranges.push((first, last));
                // longitude 180 projects onto column 0
                if x_max >= size {
                    ranges.push((0, 0));
                }
                ranges
            })
            .collect();

        let mut cells: Vec<&Cell> = self
            .cells
            .values()
            .filter(|cell| {
                (row_min..=row_max).contains(&cell.key.y)
                    && columns
                        .iter()
                        .any(|&(first, last)| (first..=last).contains(&cell.key.x))
            })
            .collect();
        cells.sort_by_key(|cell| cell.key);
        cells
    }
}
