use spotmap::prelude::*;
use spotmap::{Delivery, Match};
use std::time::SystemTime;

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (set RUST_LOG=debug to see superseded recomputations)
    env_logger::init();

    println!("=== spotmap - Getting Started ===\n");

    let (engine, sessions) = EngineBuilder::new().build_with_sessions()?;
    println!("✓ Created engine rendering into memory\n");

    // === DISCOVERIES ===
    println!("1. Discoveries");
    println!("--------------");

    // Points are (lon, lat)
    engine.upsert_point(GeoPoint::new("blue-note", Point::new(-74.0006, 40.7308), "So What"))?;
    engine.upsert_point(GeoPoint::new("village", Point::new(-74.0004, 40.7309), "Blue in Green"))?;
    engine.upsert_point(GeoPoint::new("harlem", Point::new(-73.9465, 40.8116), "Take the A Train"))?;
    println!("   Stored {} discoveries\n", engine.list_active_points().len());

    // === ZOOMING ===
    println!("2. Zooming");
    println!("----------");

    for zoom in [12.0, 15.0, 20.0] {
        let viewport = Viewport::new(Point::new(-73.97, 40.77), 0.2, 0.2, zoom);
        if let RecomputeOutcome::Applied(diff) = engine.viewport_changed(viewport) {
            println!(
                "   zoom {:>4}: {} annotations (+{} / -{})",
                zoom,
                engine.annotations().len(),
                diff.to_add.len(),
                diff.to_remove.len()
            );
        }
    }
    println!();

    // === SPOTS ===
    println!("3. Spots");
    println!("--------");

    engine.viewport_changed(Viewport::new(Point::new(-73.97, 40.77), 0.2, 0.2, 15.0));
    let cluster = engine.annotations().sorted().into_iter().find_map(|a| match a {
        Annotation::Cluster(cluster) => Some(cluster.clone()),
        _ => None,
    });
    if let Some(cluster) = cluster {
        let spot = engine.group_cluster("Greenwich Village", &cluster)?;
        println!("   Created Spot '{}' with {} discoveries", spot.name, spot.len());
        println!("   Selection: {:?}", engine.selection());
    }
    println!();

    // === RECOGNITION ===
    println!("4. Recognition session");
    println!("----------------------");

    let now = SystemTime::now();
    let handle = sessions.start(Point::new(-73.9857, 40.7484), now)?;
    let found = Match::new("Empire State of Mind", "Jay-Z").with_external_id("isrc", "USSM10904433");
    if let Delivery::Accepted(result) =
        sessions.deliver(&handle, RecognitionOutcome::Matched(found), now)
        && let Some(id) = engine.commit_discovery(result)?
    {
        println!("   Committed discovery {}", id);
    }
    println!("   Engine stats: {:?}", engine.stats());

    Ok(())
}
