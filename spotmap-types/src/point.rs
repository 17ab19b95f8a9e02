use geo::Point;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::SystemTime;

/// Stable, opaque identity of a discovery.
///
/// Ordering is plain lexicographic ordering of the underlying token, which is what
/// cluster member lists are sorted by.
///
/// # Examples
///
/// ```
/// use spotmap_types::point::PointId;
///
/// let a = PointId::from("a");
/// let b = PointId::from("b");
/// assert!(a < b);
///
/// let generated = PointId::generate();
/// assert_ne!(generated, PointId::generate());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PointId(String);

impl PointId {
    /// Create an id from any string-like token.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random (v4 UUID) id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PointId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for PointId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// One identifiable, georeferenced discovery.
///
/// `coordinate` is longitude (x) / latitude (y) in degrees. The engine validates it on
/// insertion; this type itself does not.
///
/// # Examples
///
/// ```
/// use spotmap_types::point::GeoPoint;
/// use geo::Point;
///
/// let discovery = GeoPoint::new("track-1", Point::new(2.3522, 48.8566), "La Vie en rose")
///     .with_subtitle("Edith Piaf")
///     .with_external_id("isrc", "FRZ014800100");
///
/// assert_eq!(discovery.lon(), 2.3522);
/// assert_eq!(discovery.lat(), 48.8566);
/// assert_eq!(discovery.subtitle.as_deref(), Some("Edith Piaf"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub id: PointId,
    pub coordinate: Point<f64>,
    pub display_title: String,
    /// Secondary line, usually the artist.
    #[serde(default)]
    pub subtitle: Option<String>,
    /// Artwork reference (URL or asset name), never resolved by the engine.
    #[serde(default)]
    pub image_ref: Option<String>,
    /// Identifiers in external catalogs, keyed by catalog name.
    #[serde(default)]
    pub external_ids: BTreeMap<String, String>,
    pub discovered_at: SystemTime,
}

impl GeoPoint {
    /// Create a discovery stamped with the current time.
    pub fn new(id: impl Into<PointId>, coordinate: Point<f64>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            coordinate,
            display_title: title.into(),
            subtitle: None,
            image_ref: None,
            external_ids: BTreeMap::new(),
            discovered_at: SystemTime::now(),
        }
    }

    pub fn with_subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = Some(subtitle.into());
        self
    }

    pub fn with_image_ref(mut self, image_ref: impl Into<String>) -> Self {
        self.image_ref = Some(image_ref.into());
        self
    }

    pub fn with_external_id(mut self, catalog: impl Into<String>, id: impl Into<String>) -> Self {
        self.external_ids.insert(catalog.into(), id.into());
        self
    }

    pub fn with_discovered_at(mut self, at: SystemTime) -> Self {
        self.discovered_at = at;
        self
    }

    /// Longitude in degrees.
    #[inline]
    pub fn lon(&self) -> f64 {
        self.coordinate.x()
    }

    /// Latitude in degrees.
    #[inline]
    pub fn lat(&self) -> f64 {
        self.coordinate.y()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_point_id_ordering_is_lexicographic() {
        let mut ids = vec![PointId::from("c"), PointId::from("a"), PointId::from("b")];
        ids.sort();
        assert_eq!(ids, vec![PointId::from("a"), PointId::from("b"), PointId::from("c")]);
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = PointId::generate();
        let b = PointId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn test_geo_point_builder() {
        let at = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let p = GeoPoint::new("x", Point::new(-0.1278, 51.5074), "Waterloo Sunset")
            .with_subtitle("The Kinks")
            .with_image_ref("https://example.invalid/art.jpg")
            .with_discovered_at(at);

        assert_eq!(p.id.as_str(), "x");
        assert_eq!(p.lon(), -0.1278);
        assert_eq!(p.lat(), 51.5074);
        assert_eq!(p.discovered_at, at);
        assert!(p.image_ref.is_some());
    }
}
