//! Coordinate and distance checks shared by the stores, the grid and the session manager.

use crate::error::{Result, SpotmapError};
use geo::Point;

const MAX_LONGITUDE: f64 = 180.0;
const MAX_LATITUDE: f64 = 90.0;

/// Half the equatorial circumference: no two places on Earth are farther apart.
const MAX_SURFACE_DISTANCE_M: f64 = 20_037_508.34;

fn check_axis(axis: &str, value: f64, limit: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(SpotmapError::InvalidCoordinate(format!(
            "{} must be finite, got {}",
            axis, value
        )));
    }
    if value.abs() > limit {
        return Err(SpotmapError::InvalidCoordinate(format!(
            "{} {} is outside [-{}, {}]",
            axis, value, limit, limit
        )));
    }
    Ok(())
}

/// Check that a discovery, Spot or session location is a real place.
///
/// Longitude (x) must lie in [-180, 180] and latitude (y) in [-90, 90]; both
/// antimeridian values and both poles are accepted.
///
/// # Examples
///
/// ```
/// use spotmap::compute::validation::validate_geographic_point;
/// use geo::Point;
///
/// assert!(validate_geographic_point(&Point::new(-74.0060, 40.7128)).is_ok());
/// assert!(validate_geographic_point(&Point::new(-180.0, -90.0)).is_ok());
///
/// // latitude first is a common mistake
/// assert!(validate_geographic_point(&Point::new(40.7128, -174.0)).is_err());
/// ```
pub fn validate_geographic_point(point: &Point<f64>) -> Result<()> {
    check_axis("longitude", point.x(), MAX_LONGITUDE)?;
    check_axis("latitude", point.y(), MAX_LATITUDE)
}

/// Check an absorption radius in metres.
///
/// ```
/// use spotmap::compute::validation::validate_radius;
///
/// assert!(validate_radius(150.0).is_ok());
/// assert!(validate_radius(0.0).is_err());
/// assert!(validate_radius(f64::NAN).is_err());
/// ```
pub fn validate_radius(radius_m: f64) -> Result<()> {
    if !radius_m.is_finite() || radius_m <= 0.0 {
        return Err(SpotmapError::InvalidConfig(format!(
            "Radius must be a positive number of meters, got {}",
            radius_m
        )));
    }
    if radius_m > MAX_SURFACE_DISTANCE_M {
        return Err(SpotmapError::InvalidConfig(format!(
            "Radius {} m is larger than any distance on Earth",
            radius_m
        )));
    }
    Ok(())
}
