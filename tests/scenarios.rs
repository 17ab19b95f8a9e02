use spotmap::prelude::*;
use spotmap::{
    CellSizeTable, GroupAnnotation, MemorySurface, PointChange, PointStore, SelectionResolver,
    SpatialGrid, diff, resolve,
};
use parking_lot::Mutex;
use std::sync::Arc;

fn scenario_points() -> Vec<GeoPoint> {
    vec![
        GeoPoint::new("a", Point::new(0.0, 0.0), "A"),
        GeoPoint::new("b", Point::new(0.0001, 0.0), "B"),
        GeoPoint::new("c", Point::new(10.0, 10.0), "C"),
    ]
}

fn world(zoom: f64) -> Viewport {
    Viewport::new(Point::new(0.0, 0.0), 360.0, 170.0, zoom)
}

/// Two close points merge at street level and split at building level.
#[test]
fn test_scenario_a_cluster_then_split() {
    let points = scenario_points();
    let cells = CellSizeTable::default();

    let coarse = SpatialGrid::rebuild(&points, &cells, 14.0, 256.0);
    let annotations = resolve(&coarse, &world(14.0), &[]);
    let clusters: Vec<&ClusterAnnotation> = annotations
        .sorted()
        .into_iter()
        .filter_map(|a| match a {
            Annotation::Cluster(c) => Some(c),
            _ => None,
        })
        .collect();
    assert_eq!(annotations.len(), 2);
    assert_eq!(clusters.len(), 1);
    assert_eq!(clusters[0].member_ids, vec![PointId::from("a"), PointId::from("b")]);
    assert!(annotations.find_point(&PointId::from("c")).is_some());

    let fine = SpatialGrid::rebuild(&points, &cells, 20.0, 256.0);
    let annotations = resolve(&fine, &world(20.0), &[]);
    assert_eq!(annotations.len(), 3);
    assert!(
        annotations
            .iter()
            .all(|(_, a)| matches!(a, Annotation::Point(_)))
    );
}

/// Zooming in replaces a cluster with its members and leaves untouched points alone.
#[test]
fn test_scenario_b_diff_on_zoom_in() {
    let surface = Arc::new(Mutex::new(MemorySurface::default()));
    let engine = EngineBuilder::new()
        .render_sink(Box::new(surface.clone()))
        .build()
        .unwrap();

    engine
        .upsert_point(GeoPoint::new("a", Point::new(10.0, 10.0), "A"))
        .unwrap();
    engine
        .upsert_point(GeoPoint::new("b", Point::new(0.0, 0.0), "B"))
        .unwrap();
    engine
        .upsert_point(GeoPoint::new("c", Point::new(0.0001, 0.0), "C"))
        .unwrap();

    engine.viewport_changed(world(14.0));
    assert_eq!(surface.lock().rendered.len(), 2);

    let RecomputeOutcome::Applied(changes) = engine.viewport_changed(world(20.0)) else {
        panic!("expected the zoom-in to be applied");
    };
    assert_eq!(changes.to_remove.len(), 1);
    assert!(matches!(&changes.to_remove[0], Annotation::Cluster(c) if c.count() == 2));
    let added: Vec<String> = changes
        .to_add
        .iter()
        .flat_map(|a| a.point_ids().iter().map(|id| id.to_string()))
        .collect();
    assert_eq!(added, vec!["b".to_string(), "c".to_string()]);
    assert!(
        changes
            .to_add
            .iter()
            .chain(changes.to_remove.iter())
            .all(|a| a.point_ids() != [PointId::from("a")])
    );

    let rendered = surface.lock();
    assert_eq!(rendered.rendered.len(), 3);
    assert_eq!(rendered.rendered, engine.annotations());
}

/// Showing a point and then a Spot in one update ends on the Spot.
#[test]
fn test_scenario_c_group_wins() {
    let mut resolver = SelectionResolver::new(0.5);
    let point = GeoPoint::new("x", Point::new(1.0, 1.0), "X");
    let spot = Group::new("g", "Record store", Point::new(1.0, 1.0));

    resolver.transaction(|tx| {
        tx.show_point(&point);
        tx.show_group(&spot);
    });
    assert_eq!(
        resolver.state(),
        &SelectionState::Group {
            id: GroupId::from("g"),
            coordinate: Point::new(1.0, 1.0)
        }
    );

    let engine = EngineBuilder::new().build().unwrap();
    engine.upsert_point(point).unwrap();
    engine.create_group(spot).unwrap();
    engine.select_point(&PointId::from("x")).unwrap();
    let state = engine.select_group(&GroupId::from("g")).unwrap();
    assert_eq!(state.group_id(), Some(&GroupId::from("g")));
    assert_eq!(state.point_id(), None);
}

/// Removing an unknown id is a silent no-op.
#[test]
fn test_scenario_d_remove_unknown() {
    let mut store = PointStore::new();
    store
        .upsert(GeoPoint::new("a", Point::new(0.0, 0.0), "A"))
        .unwrap();
    let changes = store.subscribe();
    let generation = store.generation();

    assert!(store.remove(&PointId::from("missing")).is_none());
    assert_eq!(store.generation(), generation);
    assert_eq!(store.len(), 1);
    assert!(changes.try_recv().is_err());

    let engine = EngineBuilder::new().build().unwrap();
    let before = engine.stats();
    assert!(engine.remove_point(&PointId::from("missing")).is_none());
    assert_eq!(engine.stats(), before);
}

#[test]
fn test_tapped_cluster_becomes_spot() {
    let engine = EngineBuilder::new().build().unwrap();
    for point in scenario_points() {
        engine.upsert_point(point).unwrap();
    }
    engine.viewport_changed(world(14.0));
    engine.select_point(&PointId::from("c")).unwrap();

    let cluster = engine
        .annotations()
        .sorted()
        .into_iter()
        .find_map(|a| match a {
            Annotation::Cluster(c) => Some(c.clone()),
            _ => None,
        })
        .unwrap();

    let spot = engine.group_cluster("Corner cafe", &cluster).unwrap();
    assert_eq!(spot.len(), 2);
    assert_eq!(spot.coordinate, cluster.coordinate);

    let annotations = engine.annotations();
    assert_eq!(annotations.len(), 2);
    let groups: Vec<&GroupAnnotation> = annotations
        .iter()
        .filter_map(|(_, a)| match a {
            Annotation::Group(g) => Some(g),
            _ => None,
        })
        .collect();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].group_id, spot.id);
    assert!(annotations.find_point(&PointId::from("a")).is_none());

    assert_eq!(engine.selection().group_id(), Some(&spot.id));
    assert!(engine.panel_shrink_hint(500.0, 800.0));

    // ungrouping brings the cluster back
    engine.remove_group(&spot.id).unwrap();
    assert!(engine.selection().is_none());
    assert!(engine.annotations().contains_key(&Annotation::Cluster(cluster.clone()).key()));
}

#[test]
fn test_absorption_on_group_creation() {
    let config = Config::default()
        .with_absorption(spotmap::AbsorptionPolicy::within_radius(200.0));
    let engine = EngineBuilder::new().config(config).build().unwrap();

    engine
        .upsert_point(GeoPoint::new("near", Point::new(2.3530, 48.8566), "Near"))
        .unwrap();
    engine
        .upsert_point(GeoPoint::new("far", Point::new(2.40, 48.8566), "Far"))
        .unwrap();

    let id = engine
        .create_group(Group::new("s", "Canal", Point::new(2.3522, 48.8566)))
        .unwrap();
    let spot = engine.group(&id).unwrap();
    assert!(spot.contains(&PointId::from("near")));
    assert!(!spot.contains(&PointId::from("far")));
    assert!(engine.absorb_nearby(&id).unwrap().is_empty());
}

#[test]
fn test_point_changes_are_streamed() {
    let engine = EngineBuilder::new().build().unwrap();
    let changes = engine.subscribe();

    engine
        .upsert_point(GeoPoint::new("a", Point::new(0.0, 0.0), "A"))
        .unwrap();
    engine
        .upsert_point(GeoPoint::new("a", Point::new(1.0, 0.0), "A"))
        .unwrap();
    engine.remove_point(&PointId::from("a"));

    let received: Vec<PointChange> = changes.try_iter().collect();
    assert_eq!(received.len(), 3);
    assert!(matches!(received[0], PointChange::Added(_)));
    assert!(matches!(received[1], PointChange::Updated(ref p) if p.lon() == 1.0));
    assert_eq!(received[2], PointChange::Removed(PointId::from("a")));
}

#[test]
fn test_diff_against_itself_is_empty() {
    let points = scenario_points();
    let grid = SpatialGrid::rebuild(&points, &CellSizeTable::default(), 14.0, 256.0);
    let annotations = resolve(&grid, &world(14.0), &[]);
    assert!(diff(&annotations, &annotations).is_empty());
}
