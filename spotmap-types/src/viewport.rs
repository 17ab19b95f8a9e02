use geo::Point;
use serde::{Deserialize, Serialize};

/// Angular extent of a viewport in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub lon_delta: f64,
    pub lat_delta: f64,
}

/// The visible map region (center + span) and the zoom level it is displayed at.
///
/// A viewport may straddle the antimeridian, in which case [`Viewport::lon_ranges`]
/// returns two ranges.
///
/// # Examples
///
/// ```
/// use spotmap_types::viewport::Viewport;
/// use geo::Point;
///
/// let vp = Viewport::new(Point::new(179.0, 0.0), 4.0, 2.0, 8.0);
/// assert_eq!(vp.lon_ranges(), vec![(177.0, 180.0), (-180.0, -179.0)]);
/// assert!(vp.contains(&Point::new(-179.5, 0.5)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub center: Point<f64>,
    pub span: Span,
    pub zoom: f64,
}

impl Viewport {
    pub fn new(center: Point<f64>, lon_delta: f64, lat_delta: f64, zoom: f64) -> Self {
        Self {
            center,
            span: Span {
                lon_delta,
                lat_delta,
            },
            zoom,
        }
    }

    /// Build a viewport from south-west and north-east corners.
    ///
    /// If `south_west` lies east of `north_east` the box is taken to cross the antimeridian.
    pub fn from_corners(south_west: Point<f64>, north_east: Point<f64>, zoom: f64) -> Self {
        let mut lon_delta = north_east.x() - south_west.x();
        if lon_delta < 0.0 {
            lon_delta += 360.0;
        }
        let lat_delta = north_east.y() - south_west.y();
        let mut center_lon = south_west.x() + lon_delta / 2.0;
        if center_lon > 180.0 {
            center_lon -= 360.0;
        }
        let center = Point::new(center_lon, south_west.y() + lat_delta / 2.0);
        Self::new(center, lon_delta, lat_delta, zoom)
    }

    /// True when the viewport covers no area (zero, negative or non-finite span).
    pub fn is_empty(&self) -> bool {
        let Span {
            lon_delta,
            lat_delta,
        } = self.span;
        !(lon_delta.is_finite() && lat_delta.is_finite())
            || lon_delta <= 0.0
            || lat_delta <= 0.0
            || !self.center.x().is_finite()
            || !self.center.y().is_finite()
    }

    /// Latitude bounds clamped to [-90, 90].
    pub fn lat_range(&self) -> (f64, f64) {
        let half = self.span.lat_delta / 2.0;
        (
            (self.center.y() - half).max(-90.0),
            (self.center.y() + half).min(90.0),
        )
    }

    /// Longitude bounds, split in two when the viewport crosses the antimeridian.
    pub fn lon_ranges(&self) -> Vec<(f64, f64)> {
        if self.span.lon_delta >= 360.0 {
            return vec![(-180.0, 180.0)];
        }
        let half = self.span.lon_delta / 2.0;
        let west = self.center.x() - half;
        let east = self.center.x() + half;
        if west < -180.0 {
            vec![(west + 360.0, 180.0), (-180.0, east)]
        } else if east > 180.0 {
            vec![(west, 180.0), (-180.0, east - 360.0)]
        } else {
            vec![(west, east)]
        }
    }

    /// Whether a coordinate lies inside the viewport (edges inclusive).
    pub fn contains(&self, point: &Point<f64>) -> bool {
        if self.is_empty() {
            return false;
        }
        let (south, north) = self.lat_range();
        if point.y() < south || point.y() > north {
            return false;
        }
        self.lon_ranges()
            .iter()
            .any(|&(west, east)| point.x() >= west && point.x() <= east)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_ranges() {
        let vp = Viewport::new(Point::new(10.0, 20.0), 2.0, 4.0, 12.0);
        assert_eq!(vp.lon_ranges(), vec![(9.0, 11.0)]);
        assert_eq!(vp.lat_range(), (18.0, 22.0));
        assert!(vp.contains(&Point::new(10.5, 21.0)));
        assert!(!vp.contains(&Point::new(12.0, 21.0)));
    }

    #[test]
    fn test_western_wrap() {
        let vp = Viewport::new(Point::new(-179.0, 0.0), 4.0, 2.0, 5.0);
        assert_eq!(vp.lon_ranges(), vec![(179.0, 180.0), (-180.0, -177.0)]);
        assert!(vp.contains(&Point::new(179.5, 0.0)));
    }

    #[test]
    fn test_latitude_clamped() {
        let vp = Viewport::new(Point::new(0.0, 89.0), 10.0, 10.0, 3.0);
        assert_eq!(vp.lat_range(), (84.0, 90.0));
    }

    #[test]
    fn test_empty_viewports() {
        assert!(Viewport::new(Point::new(0.0, 0.0), 0.0, 1.0, 3.0).is_empty());
        assert!(Viewport::new(Point::new(0.0, 0.0), 1.0, 0.0, 3.0).is_empty());
        assert!(Viewport::new(Point::new(0.0, 0.0), f64::NAN, 1.0, 3.0).is_empty());
        assert!(!Viewport::new(Point::new(0.0, 0.0), 1.0, 1.0, 3.0).is_empty());
        assert!(!Viewport::new(Point::new(0.0, 0.0), 0.0, 0.0, 3.0).contains(&Point::new(0.0, 0.0)));
    }

    #[test]
    fn test_from_corners_across_antimeridian() {
        let vp = Viewport::from_corners(Point::new(170.0, -5.0), Point::new(-170.0, 5.0), 4.0);
        assert_eq!(vp.span.lon_delta, 20.0);
        assert_eq!(vp.center.x(), 180.0);
        assert!(vp.contains(&Point::new(-175.0, 0.0)));
        assert!(vp.contains(&Point::new(175.0, 0.0)));
        assert!(!vp.contains(&Point::new(0.0, 0.0)));
    }
}
