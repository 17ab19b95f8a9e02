use crate::point::PointId;
use geo::Point;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::time::SystemTime;

/// Identity of a Spot.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(String);

impl GroupId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GroupId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for GroupId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A named place holding a set of discoveries.
///
/// The group's coordinate is stored, not derived from its members: a Spot stays where
/// it was placed even if members are added or removed later.
///
/// # Examples
///
/// ```
/// use spotmap_types::group::Group;
/// use geo::Point;
///
/// let spot = Group::new("home", "Home", Point::new(-74.0, 40.7))
///     .with_members(["a", "b"]);
/// assert_eq!(spot.len(), 2);
/// assert!(spot.contains(&"a".into()));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub coordinate: Point<f64>,
    #[serde(default)]
    pub member_ids: BTreeSet<PointId>,
    pub created_at: SystemTime,
}

impl Group {
    pub fn new(id: impl Into<GroupId>, name: impl Into<String>, coordinate: Point<f64>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            coordinate,
            member_ids: BTreeSet::new(),
            created_at: SystemTime::now(),
        }
    }

    pub fn with_members<I, P>(mut self, members: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PointId>,
    {
        self.member_ids.extend(members.into_iter().map(Into::into));
        self
    }

    pub fn contains(&self, id: &PointId) -> bool {
        self.member_ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.member_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.member_ids.is_empty()
    }
}
