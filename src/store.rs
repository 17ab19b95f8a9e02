//! In-memory stores for discoveries and Spots.
//!
//! `PointStore` holds the current set of discoveries and counts every mutation in a
//! generation number, which the engine uses to invalidate its cached grid.
//! `GroupStore` holds Spots and the reverse index from discovery to Spot.

use rustc_hash::FxHashMap;
use spotmap_types::group::{Group, GroupId};
use spotmap_types::point::{GeoPoint, PointId};
use std::sync::mpsc::{Receiver, Sender, channel};

use crate::compute::cluster::ClusterAnnotation;
use crate::compute::validation::validate_geographic_point;
use crate::error::{Result, SpotmapError};

/// A change to the point set, as seen by subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum PointChange {
    Added(GeoPoint),
    Updated(GeoPoint),
    Removed(PointId),
}

/// Current set of discoveries with stable identity.
#[derive(Debug, Default)]
pub struct PointStore {
    points: FxHashMap<PointId, GeoPoint>,
    generation: u64,
    subscribers: Vec<Sender<PointChange>>,
}

impl PointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a discovery.
    ///
    /// Returns `true` when the id was new. Invalid coordinates are rejected and leave
    /// the store untouched.
    pub fn upsert(&mut self, point: GeoPoint) -> Result<bool> {
        if let Err(e) = validate_geographic_point(&point.coordinate) {
            log::warn!("Rejecting discovery {}: {}", point.id, e);
            return Err(e);
        }

        let change = point.clone();
        let inserted = self.points.insert(point.id.clone(), point).is_none();
        self.generation += 1;
        self.notify(if inserted {
            PointChange::Added(change)
        } else {
            PointChange::Updated(change)
        });
        Ok(inserted)
    }

    /// Remove a discovery. Unknown ids are a no-op and do not bump the generation.
    pub fn remove(&mut self, id: &PointId) -> Option<GeoPoint> {
        let removed = self.points.remove(id)?;
        self.generation += 1;
        self.notify(PointChange::Removed(id.clone()));
        Some(removed)
    }

    pub fn get(&self, id: &PointId) -> Option<&GeoPoint> {
        self.points.get(id)
    }

    pub fn contains(&self, id: &PointId) -> bool {
        self.points.contains_key(id)
    }

    /// All discoveries, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &GeoPoint> {
        self.points.values()
    }

    /// All discoveries ordered by id.
    pub fn all(&self) -> Vec<&GeoPoint> {
        let mut points: Vec<&GeoPoint> = self.points.values().collect();
        points.sort_by(|a, b| a.id.cmp(&b.id));
        points
    }

    /// Owned snapshot of the active discoveries, ordered by id.
    pub fn list_active_points(&self) -> Vec<GeoPoint> {
        self.all().into_iter().cloned().collect()
    }

    /// Number of mutations applied so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Stream of subsequent changes. Dropping the receiver unsubscribes.
    pub fn subscribe(&mut self) -> Receiver<PointChange> {
        let (tx, rx) = channel();
        self.subscribers.push(tx);
        rx
    }

    fn notify(&mut self, change: PointChange) {
        self.subscribers
            .retain(|subscriber| subscriber.send(change.clone()).is_ok());
    }
}

/// Spots and the discovery-to-Spot index. A discovery belongs to at most one Spot.
#[derive(Debug, Default)]
pub struct GroupStore {
    groups: FxHashMap<GroupId, Group>,
    membership: FxHashMap<PointId, GroupId>,
    generation: u64,
}

impl GroupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a Spot. Members already in another Spot move to this one; an existing Spot
    /// with the same id is replaced.
    pub fn create(&mut self, group: Group) -> Result<GroupId> {
        validate_geographic_point(&group.coordinate)?;

        if let Some(previous) = self.groups.remove(&group.id) {
            self.unindex(&previous);
        }
        let id = group.id.clone();
        for member in &group.member_ids {
            self.detach_from_other(member, &id);
            self.membership.insert(member.clone(), id.clone());
        }
        self.groups.insert(id.clone(), group);
        self.generation += 1;
        Ok(id)
    }

    /// Turn a tapped cluster into a Spot placed at the cluster's centroid.
    pub fn create_from_cluster(
        &mut self,
        name: impl Into<String>,
        cluster: &ClusterAnnotation,
    ) -> Result<Group> {
        let group = Group::new(GroupId::generate(), name, cluster.coordinate)
            .with_members(cluster.member_ids.iter().cloned());
        self.create(group.clone())?;
        Ok(group)
    }

    /// Replace an existing Spot.
    pub fn update(&mut self, group: Group) -> Result<()> {
        if !self.groups.contains_key(&group.id) {
            return Err(SpotmapError::UnknownGroup(group.id.to_string()));
        }
        self.create(group).map(|_| ())
    }

    /// Delete a Spot; its members become ungrouped. Unknown ids are a no-op.
    pub fn remove(&mut self, id: &GroupId) -> Option<Group> {
        let removed = self.groups.remove(id)?;
        self.unindex(&removed);
        self.generation += 1;
        Some(removed)
    }

    /// Add discoveries to an existing Spot.
    pub fn add_members<I>(&mut self, id: &GroupId, members: I) -> Result<()>
    where
        I: IntoIterator<Item = PointId>,
    {
        if !self.groups.contains_key(id) {
            return Err(SpotmapError::UnknownGroup(id.to_string()));
        }
        let mut changed = false;
        for member in members {
            self.detach_from_other(&member, id);
            if let Some(group) = self.groups.get_mut(id)
                && group.member_ids.insert(member.clone())
            {
                self.membership.insert(member, id.clone());
                changed = true;
            }
        }
        if changed {
            self.generation += 1;
        }
        Ok(())
    }

    /// Forget a deleted discovery. Returns the Spot it belonged to.
    pub fn remove_point(&mut self, point: &PointId) -> Option<GroupId> {
        let id = self.membership.remove(point)?;
        if let Some(group) = self.groups.get_mut(&id) {
            group.member_ids.remove(point);
        }
        self.generation += 1;
        Some(id)
    }

    pub fn get(&self, id: &GroupId) -> Option<&Group> {
        self.groups.get(id)
    }

    pub fn group_of(&self, point: &PointId) -> Option<&GroupId> {
        self.membership.get(point)
    }

    pub fn is_grouped(&self, point: &PointId) -> bool {
        self.membership.contains_key(point)
    }

    /// Spots ordered by id.
    pub fn list_groups(&self) -> Vec<Group> {
        let mut groups: Vec<Group> = self.groups.values().cloned().collect();
        groups.sort_by(|a, b| a.id.cmp(&b.id));
        groups
    }

    pub fn grouped_point_ids(&self) -> impl Iterator<Item = &PointId> {
        self.membership.keys()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    fn detach_from_other(&mut self, member: &PointId, keep: &GroupId) {
        if let Some(current) = self.membership.get(member)
            && current != keep
            && let Some(other) = self.groups.get_mut(current)
        {
            other.member_ids.remove(member);
        }
    }

    fn unindex(&mut self, group: &Group) {
        for member in &group.member_ids {
            if self.membership.get(member) == Some(&group.id) {
                self.membership.remove(member);
            }
        }
    }
}
