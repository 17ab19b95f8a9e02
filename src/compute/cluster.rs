//! Cluster resolution: turns grid cells into the annotations shown on the map.
//!
//! Each cell intersecting the viewport produces one annotation: a point annotation
//! when it holds a single ungrouped discovery, a cluster annotation when it holds
//! several. Discoveries that belong to a Spot never reach this layer; the Spot is drawn
//! once, at its own stored coordinate.

use geo::Point;
use rustc_hash::{FxHashMap, FxHashSet};
use spotmap_types::group::{Group, GroupId};
use spotmap_types::point::{GeoPoint, PointId};
use spotmap_types::viewport::Viewport;

use crate::compute::grid::{Member, SpatialGrid};

/// A single discovery drawn on its own. Carries the whole discovery so the renderer
/// has its title and artwork without going back to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct PointAnnotation {
    pub point: GeoPoint,
}

impl PointAnnotation {
    pub fn new(point: GeoPoint) -> Self {
        Self { point }
    }

    pub fn id(&self) -> &PointId {
        &self.point.id
    }
}

/// Two or more discoveries merged into one marker.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterAnnotation {
    /// Sorted ascending, no duplicates.
    pub member_ids: Vec<PointId>,
    /// Mean of the member coordinates.
    pub coordinate: Point<f64>,
}

impl ClusterAnnotation {
    pub fn count(&self) -> usize {
        self.member_ids.len()
    }
}

/// A Spot, drawn at its stored coordinate.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupAnnotation {
    pub group_id: GroupId,
    pub name: String,
    pub coordinate: Point<f64>,
    pub member_ids: Vec<PointId>,
}

/// Anything the rendering layer draws.
#[derive(Debug, Clone, PartialEq)]
pub enum Annotation {
    Point(PointAnnotation),
    Cluster(ClusterAnnotation),
    Group(GroupAnnotation),
}

/// Identity of an annotation across recomputations.
///
/// Points are identified by their discovery, clusters by their member set and Spots by
/// id plus member set. Coordinates take no part: a cluster whose centroid drifts is
/// still the same cluster, one that gained a member is not.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AnnotationKey {
    Point(PointId),
    Cluster(Vec<PointId>),
    Group(GroupId, Vec<PointId>),
}

impl Annotation {
    pub fn key(&self) -> AnnotationKey {
        match self {
            Annotation::Point(p) => AnnotationKey::Point(p.point.id.clone()),
            Annotation::Cluster(c) => AnnotationKey::Cluster(c.member_ids.clone()),
            Annotation::Group(g) => AnnotationKey::Group(g.group_id.clone(), g.member_ids.clone()),
        }
    }

    pub fn coordinate(&self) -> Point<f64> {
        match self {
            Annotation::Point(p) => p.point.coordinate,
            Annotation::Cluster(c) => c.coordinate,
            Annotation::Group(g) => g.coordinate,
        }
    }

    /// Number of discoveries behind this marker.
    pub fn count(&self) -> usize {
        match self {
            Annotation::Point(_) => 1,
            Annotation::Cluster(c) => c.count(),
            Annotation::Group(g) => g.member_ids.len(),
        }
    }

    /// Discoveries drawn directly by this marker (Spot members are not).
    pub fn point_ids(&self) -> &[PointId] {
        match self {
            Annotation::Point(p) => std::slice::from_ref(&p.point.id),
            Annotation::Cluster(c) => &c.member_ids,
            Annotation::Group(_) => &[],
        }
    }
}

/// A set of annotations keyed by identity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationSet {
    entries: FxHashMap<AnnotationKey, Annotation>,
}

impl AnnotationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an annotation, replacing one with the same identity.
    pub fn insert(&mut self, annotation: Annotation) -> Option<Annotation> {
        self.entries.insert(annotation.key(), annotation)
    }

    pub fn remove(&mut self, key: &AnnotationKey) -> Option<Annotation> {
        self.entries.remove(key)
    }

    pub fn get(&self, key: &AnnotationKey) -> Option<&Annotation> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &AnnotationKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&AnnotationKey, &Annotation)> {
        self.entries.iter()
    }

    /// Annotations ordered by key.
    pub fn sorted(&self) -> Vec<&Annotation> {
        let mut entries: Vec<(&AnnotationKey, &Annotation)> = self.entries.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries.into_iter().map(|(_, annotation)| annotation).collect()
    }

    /// Annotation that draws the given discovery, if any.
    pub fn find_point(&self, id: &PointId) -> Option<&Annotation> {
        self.entries
            .values()
            .find(|annotation| annotation.point_ids().contains(id))
    }
}

impl FromIterator<Annotation> for AnnotationSet {
    fn from_iter<T: IntoIterator<Item = Annotation>>(iter: T) -> Self {
        let mut set = AnnotationSet::new();
        for annotation in iter {
            set.insert(annotation);
        }
        set
    }
}

impl Extend<Annotation> for AnnotationSet {
    fn extend<T: IntoIterator<Item = Annotation>>(&mut self, iter: T) {
        for annotation in iter {
            self.insert(annotation);
        }
    }
}

/// Compute the annotations visible in `viewport`.
///
/// Members of `groups` are hidden from the point layer; each group whose coordinate
/// lies in the viewport yields one [`GroupAnnotation`]. An empty grid or an empty
/// viewport yields an empty set.
///
/// # Examples
///
/// ```
/// use spotmap::compute::cluster::{resolve, Annotation};
/// use spotmap::compute::grid::SpatialGrid;
/// use spotmap::config::CellSizeTable;
/// use spotmap_types::point::GeoPoint;
/// use spotmap_types::viewport::Viewport;
/// use geo::Point;
///
/// let points = vec![
///     GeoPoint::new("a", Point::new(0.0, 0.0), "A"),
///     GeoPoint::new("b", Point::new(0.0001, 0.0), "B"),
/// ];
/// let grid = SpatialGrid::rebuild(&points, &CellSizeTable::default(), 14.0, 256.0);
/// let viewport = Viewport::new(Point::new(0.0, 0.0), 0.1, 0.1, 14.0);
///
/// let annotations = resolve(&grid, &viewport, &[]);
/// assert_eq!(annotations.len(), 1);
/// assert!(matches!(annotations.sorted()[0], Annotation::Cluster(c) if c.count() == 2));
/// ```
pub fn resolve(grid: &SpatialGrid, viewport: &Viewport, groups: &[Group]) -> AnnotationSet {
    let mut annotations = AnnotationSet::new();
    if viewport.is_empty() {
        return annotations;
    }

    let mut grouped: FxHashSet<&PointId> = FxHashSet::default();
    for group in groups {
        grouped.extend(group.member_ids.iter());
        if viewport.contains(&group.coordinate) {
            annotations.insert(Annotation::Group(GroupAnnotation {
                group_id: group.id.clone(),
                name: group.name.clone(),
                coordinate: group.coordinate,
                member_ids: group.member_ids.iter().cloned().collect(),
            }));
        }
    }

    for cell in grid.cells_in_viewport(viewport) {
        let visible: Vec<&Member> = cell
            .members()
            .iter()
            .filter(|member| !grouped.contains(member.id()))
            .collect();

        match visible.as_slice() {
            [] => {}
            [single] => {
                annotations.insert(Annotation::Point(PointAnnotation::new(
                    GeoPoint::clone(&single.point),
                )));
            }
            members => {
                annotations.insert(Annotation::Cluster(ClusterAnnotation {
                    member_ids: members.iter().map(|m| m.id().clone()).collect(),
                    coordinate: centroid(members),
                }));
            }
        }
    }

    annotations
}

/// Arithmetic mean of member coordinates. Longitudes are unwrapped around the first
/// member so a cell touching the antimeridian does not average to the prime meridian.
fn centroid(members: &[&Member]) -> Point<f64> {
    let anchor = members[0].coordinate().x();
    let (mut lon_sum, mut lat_sum) = (0.0, 0.0);
    for member in members {
        let mut lon = member.coordinate().x();
        if lon - anchor > 180.0 {
            lon -= 360.0;
        } else if anchor - lon > 180.0 {
            lon += 360.0;
        }
        lon_sum += lon;
        lat_sum += member.coordinate().y();
    }
    let n = members.len() as f64;
    let mut lon = lon_sum / n;
    if lon > 180.0 {
        lon -= 360.0;
    } else if lon < -180.0 {
        lon += 360.0;
    }
    Point::new(lon, lat_sum / n)
}
