//! Web Mercator projection into map-pixel space.
//!
//! Cell sizes are expressed in map pixels, so the grid projects coordinates into the
//! pixel plane of an integer zoom level: the world is `tile_size * 2^zoom` pixels wide,
//! x grows eastwards from the antimeridian and y grows southwards from the northern
//! Mercator limit.

use geo::Point;

/// Highest zoom bucket the grid projects at.
pub const MAX_ZOOM: u8 = 22;

/// Latitude limit of the Web Mercator projection.
pub const MAX_MERCATOR_LAT: f64 = 85.051_128_78;

/// Integer zoom bucket for a (possibly fractional) zoom level.
///
/// Non-finite zoom levels fall back to bucket 0.
///
/// # Examples
///
/// ```
/// use spotmap::compute::projection::zoom_bucket;
///
/// assert_eq!(zoom_bucket(14.7), 14);
/// assert_eq!(zoom_bucket(-3.0), 0);
/// assert_eq!(zoom_bucket(40.0), 22);
/// ```
pub fn zoom_bucket(zoom: f64) -> u8 {
    if !zoom.is_finite() {
        return 0;
    }
    zoom.floor().clamp(0.0, MAX_ZOOM as f64) as u8
}

/// Width (and height) of the world in pixels at a zoom bucket.
#[inline]
pub fn world_size(zoom: u8, tile_size: f64) -> f64 {
    tile_size * f64::from(1u32 << zoom.min(MAX_ZOOM))
}

/// Project a longitude/latitude point into pixel space at a zoom bucket.
///
/// Latitudes beyond the Mercator limit are clamped; longitude 180 wraps to the
/// western edge so both sides of the antimeridian share column 0.
pub fn project(point: &Point<f64>, zoom: u8, tile_size: f64) -> (f64, f64) {
    let size = world_size(zoom, tile_size);
    (project_lon(point.x(), size), project_lat(point.y(), size))
}

#[inline]
pub(crate) fn project_lon(lon: f64, size: f64) -> f64 {
    let x = (lon + 180.0) / 360.0 * size;
    if x >= size { x - size } else { x }
}

#[inline]
pub(crate) fn project_lat(lat: f64, size: f64) -> f64 {
    let lat = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
    let sin_lat = lat.to_radians().sin();
    let y = 0.5 - ((1.0 + sin_lat) / (1.0 - sin_lat)).ln() / (4.0 * std::f64::consts::PI);
    y * size
}
