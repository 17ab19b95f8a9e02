use spotmap::{
    Annotation, Config, EngineBuilder, GeoPoint, Point, PointId, RecomputeOutcome, Viewport,
};
use std::time::Duration;

/// Test 1: Large dataset
#[test]
fn test_large_dataset_clusters() {
    let engine = EngineBuilder::new().build().expect("Failed to create engine");

    // 10K discoveries on a diagonal through Manhattan
    for i in 0..10_000 {
        let lat = 40.70 + (i as f64 * 0.00001);
        let lon = -74.01 + (i as f64 * 0.00001);
        engine
            .upsert_point(GeoPoint::new(format!("p{}", i), Point::new(lon, lat), "Track"))
            .unwrap_or_else(|_| panic!("Failed to insert point {}", i));
    }

    engine.viewport_changed(Viewport::new(Point::new(-73.96, 40.75), 0.2, 0.2, 11.0));
    let annotations = engine.annotations();
    assert!(!annotations.is_empty());
    assert!(annotations.len() < 10_000);

    let represented: usize = annotations.iter().map(|(_, a)| a.count()).sum();
    assert_eq!(represented, 10_000);
}

/// Test 2: Extreme coordinate values
#[test]
fn test_extreme_coordinates() {
    let engine = EngineBuilder::new().build().expect("Failed to create engine");

    let valid = [
        ("north_pole", Point::new(0.0, 90.0)),
        ("south_pole", Point::new(0.0, -90.0)),
        ("date_line_west", Point::new(180.0, 0.0)),
        ("date_line_east", Point::new(-180.0, 0.0)),
    ];
    for (id, point) in valid {
        engine
            .upsert_point(GeoPoint::new(id, point, id))
            .expect("Valid edge coordinate rejected");
    }

    let invalid = [
        Point::new(f64::NAN, 0.0),
        Point::new(0.0, f64::INFINITY),
        Point::new(180.1, 0.0),
        Point::new(0.0, -90.5),
    ];
    for point in invalid {
        assert!(
            engine
                .upsert_point(GeoPoint::new("bad", point, "Bad"))
                .is_err()
        );
    }
    assert_eq!(engine.list_active_points().len(), 4);

    // the whole world at zoom 0 must not panic on the poles
    engine.viewport_changed(Viewport::new(Point::new(0.0, 0.0), 360.0, 180.0, 0.0));
    assert!(!engine.annotations().is_empty());
}

/// Test 3: Viewport crossing the antimeridian
#[test]
fn test_antimeridian_viewport() {
    let engine = EngineBuilder::new().build().expect("Failed to create engine");
    engine
        .upsert_point(GeoPoint::new("fiji", Point::new(178.4, -18.1), "Fiji"))
        .unwrap();
    engine
        .upsert_point(GeoPoint::new("samoa", Point::new(-171.8, -13.8), "Samoa"))
        .unwrap();
    engine
        .upsert_point(GeoPoint::new("lima", Point::new(-77.0, -12.0), "Lima"))
        .unwrap();

    let pacific = Viewport::from_corners(Point::new(170.0, -25.0), Point::new(-165.0, -5.0), 5.0);
    engine.viewport_changed(pacific);

    let annotations = engine.annotations();
    assert!(annotations.find_point(&PointId::from("fiji")).is_some());
    assert!(annotations.find_point(&PointId::from("samoa")).is_some());
    assert!(annotations.find_point(&PointId::from("lima")).is_none());
}

/// Test 4: Empty and degenerate viewports
#[test]
fn test_degenerate_viewports() {
    let engine = EngineBuilder::new().build().expect("Failed to create engine");
    engine
        .upsert_point(GeoPoint::new("a", Point::new(0.0, 0.0), "A"))
        .unwrap();

    for viewport in [
        Viewport::new(Point::new(0.0, 0.0), 0.0, 1.0, 10.0),
        Viewport::new(Point::new(0.0, 0.0), 1.0, -1.0, 10.0),
        Viewport::new(Point::new(f64::NAN, 0.0), 1.0, 1.0, 10.0),
    ] {
        let outcome = engine.viewport_changed(viewport);
        assert!(matches!(outcome, RecomputeOutcome::Applied(_)));
        assert!(engine.annotations().is_empty());
    }

    // out-of-range zoom levels clamp instead of failing
    engine.viewport_changed(Viewport::new(Point::new(0.0, 0.0), 1.0, 1.0, 40.0));
    assert_eq!(engine.annotations().len(), 1);
    engine.viewport_changed(Viewport::new(Point::new(0.0, 0.0), 1.0, 1.0, -3.0));
    assert_eq!(engine.annotations().len(), 1);
}

/// Test 5: Many discoveries at the exact same spot
#[test]
fn test_identical_coordinates_never_split() {
    let engine = EngineBuilder::new().build().expect("Failed to create engine");
    for i in 0..25 {
        engine
            .upsert_point(GeoPoint::new(format!("p{:02}", i), Point::new(2.35, 48.85), "Same"))
            .unwrap();
    }

    engine.viewport_changed(Viewport::new(Point::new(2.35, 48.85), 0.001, 0.001, 22.0));
    let annotations = engine.annotations();
    assert_eq!(annotations.len(), 1);
    let sorted = annotations.sorted();
    let Annotation::Cluster(cluster) = sorted[0] else {
        panic!("expected a cluster");
    };
    assert_eq!(cluster.count(), 25);
    assert!((cluster.coordinate.x() - 2.35).abs() < 1e-9);
    assert!((cluster.coordinate.y() - 48.85).abs() < 1e-9);
}

/// Test 6: Configuration round trip through a file
#[test]
fn test_config_file_round_trip() {
    let config = Config::default()
        .with_panel_overlap_fraction(0.4)
        .with_session_timeout(Duration::from_secs(12));

    let file = tempfile::Builder::new()
        .suffix(".json")
        .tempfile()
        .expect("Failed to create temp file");
    std::fs::write(file.path(), config.to_json().unwrap()).unwrap();

    let loaded = Config::load(file.path()).expect("Failed to load config");
    assert_eq!(loaded.panel_overlap_fraction, 0.4);
    assert_eq!(loaded.session.timeout(), Duration::from_secs(12));
    assert_eq!(loaded.cell_sizes, config.cell_sizes);
}

/// Test 7: Unknown configuration keys are rejected
#[test]
fn test_config_rejects_unknown_fields() {
    assert!(Config::from_json(r#"{"tile_size": 256.0, "cluster_radius": 3}"#).is_err());
    assert!(Config::from_json(r#"{"cell_sizes": [{"min_zoom": 0.0, "cell_edge_px": -4.0}]}"#).is_err());
}
