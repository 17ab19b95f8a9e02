//! Automatic absorption of nearby discoveries into a Spot.
//!
//! When enabled by [`AbsorptionPolicy`], creating a Spot also pulls in ungrouped
//! discoveries within a radius of the Spot's coordinate, optionally restricted to
//! those discovered close in time to the Spot's newest member.
//!
//! Candidates are pruned with an R-tree envelope query in degree space and then
//! filtered by exact Haversine distance. Envelopes that cross the antimeridian are
//! split in two.

use geo::{Distance, Haversine, Point};
use rstar::{AABB, RTree, RTreeObject};
use smallvec::{SmallVec, smallvec};
use spotmap_types::group::Group;
use spotmap_types::point::{GeoPoint, PointId};
use std::time::{Duration, SystemTime};

use crate::config::AbsorptionPolicy;

const EARTH_MEAN_RADIUS_M: f64 = 6_371_008.8;

/// Discovery entry in the candidate R-tree.
#[derive(Debug, Clone)]
struct IndexedDiscovery {
    id: PointId,
    position: Point<f64>,
    discovered_at: SystemTime,
}

impl RTreeObject for IndexedDiscovery {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.position.x(), self.position.y()])
    }
}

/// Degree offsets (latitude, longitude) covering `radius` meters around `lat`.
fn degree_extent(lat: f64, radius: f64) -> (f64, f64) {
    let lat_degrees = (radius / EARTH_MEAN_RADIUS_M).to_degrees();

    // keep cos(lat) away from zero near the poles
    let safe_lat = lat.abs().min(89.9);
    let lon_degrees = (radius / (EARTH_MEAN_RADIUS_M * safe_lat.to_radians().cos())).to_degrees();

    (lat_degrees, lon_degrees)
}

/// Longitude intervals covering `center_lon ± lon_degrees`, wrapped at ±180.
fn lon_intervals(center_lon: f64, lon_degrees: f64) -> SmallVec<[(f64, f64); 2]> {
    if lon_degrees >= 180.0 {
        return smallvec![(-180.0, 180.0)];
    }
    let (west, east) = (center_lon - lon_degrees, center_lon + lon_degrees);
    if west < -180.0 {
        smallvec![(west + 360.0, 180.0), (-180.0, east)]
    } else if east > 180.0 {
        smallvec![(west, 180.0), (-180.0, east - 360.0)]
    } else {
        smallvec![(west, east)]
    }
}

fn within_window(a: SystemTime, b: SystemTime, window: Duration) -> bool {
    let gap = a.duration_since(b).unwrap_or_else(|e| e.duration());
    gap <= window
}

/// Ids of `candidates` the policy would absorb into `group`, sorted ascending.
///
/// Returns nothing when the policy is disabled. Current members of `group` are never
/// returned. `anchor` is the reference time for the time window, normally the newest
/// member's discovery time; the group's creation time is used when it is `None`.
///
/// # Examples
///
/// ```
/// use spotmap::compute::absorption::absorption_candidates;
/// use spotmap::config::AbsorptionPolicy;
/// use spotmap_types::group::Group;
/// use spotmap_types::point::{GeoPoint, PointId};
/// use geo::Point;
///
/// let spot = Group::new("cafe", "Cafe", Point::new(-74.0, 40.7));
/// let nearby = GeoPoint::new("near", Point::new(-74.0005, 40.7), "Near");
/// let distant = GeoPoint::new("far", Point::new(-74.1, 40.7), "Far");
///
/// let policy = AbsorptionPolicy::within_radius(100.0);
/// let ids = absorption_candidates(&policy, &spot, None, [&nearby, &distant]);
/// assert_eq!(ids, vec![PointId::from("near")]);
/// ```
pub fn absorption_candidates<'a, I>(
    policy: &AbsorptionPolicy,
    group: &Group,
    anchor: Option<SystemTime>,
    candidates: I,
) -> Vec<PointId>
where
    I: IntoIterator<Item = &'a GeoPoint>,
{
    let Some(radius) = policy.radius_m else {
        return Vec::new();
    };

    let entries: Vec<IndexedDiscovery> = candidates
        .into_iter()
        .filter(|p| !group.contains(&p.id))
        .map(|p| IndexedDiscovery {
            id: p.id.clone(),
            position: p.coordinate,
            discovered_at: p.discovered_at,
        })
        .collect();
    if entries.is_empty() {
        return Vec::new();
    }
    let tree = RTree::bulk_load(entries);

    let center = group.coordinate;
    let (lat_degrees, lon_degrees) = degree_extent(center.y(), radius);
    let envelopes: SmallVec<[AABB<[f64; 2]>; 2]> = lon_intervals(center.x(), lon_degrees)
        .into_iter()
        .map(|(west, east)| {
            AABB::from_corners(
                [west, center.y() - lat_degrees],
                [east, center.y() + lat_degrees],
            )
        })
        .collect();

    let anchor = anchor.unwrap_or(group.created_at);
    let window = policy.time_window();

    let mut ids: Vec<PointId> = envelopes
        .iter()
        .flat_map(|envelope| tree.locate_in_envelope_intersecting(envelope))
        .filter(|entry| Haversine.distance(center, entry.position) <= radius)
        .filter(|entry| window.is_none_or(|w| within_window(entry.discovered_at, anchor, w)))
        .map(|entry| entry.id.clone())
        .collect();
    ids.sort();
    ids
}
