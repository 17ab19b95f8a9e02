//! GeoJSON export of annotation sets.

use crate::compute::cluster::{Annotation, AnnotationSet};
use crate::compute::diff::AnnotationDiff;
use crate::error::{Result, SpotmapError};
use geojson::{Feature, FeatureCollection, Geometry, Value};
use serde_json::{Map, json};

/// Converts one annotation to a GeoJSON point feature.
///
/// Properties carry `kind` (`point`, `cluster` or `group`), `count`, and the ids
/// needed to resolve a tap. Point features also carry the discovery's title, subtitle
/// and artwork reference.
pub fn annotation_to_feature(annotation: &Annotation) -> Feature {
    let coordinate = annotation.coordinate();
    let geom = Geometry::new(Value::Point(vec![coordinate.x(), coordinate.y()]));

    let mut props = Map::new();
    props.insert("count".to_string(), json!(annotation.count()));
    match annotation {
        Annotation::Point(p) => {
            props.insert("kind".to_string(), json!("point"));
            props.insert("id".to_string(), json!(p.point.id.as_str()));
            props.insert("title".to_string(), json!(p.point.display_title));
            if let Some(subtitle) = &p.point.subtitle {
                props.insert("subtitle".to_string(), json!(subtitle));
            }
            if let Some(image_ref) = &p.point.image_ref {
                props.insert("image_ref".to_string(), json!(image_ref));
            }
        }
        Annotation::Cluster(c) => {
            props.insert("kind".to_string(), json!("cluster"));
            props.insert("member_ids".to_string(), json!(c.member_ids));
        }
        Annotation::Group(g) => {
            props.insert("kind".to_string(), json!("group"));
            props.insert("id".to_string(), json!(g.group_id.as_str()));
            props.insert("name".to_string(), json!(g.name));
            props.insert("member_ids".to_string(), json!(g.member_ids));
        }
    }

    Feature {
        bbox: None,
        geometry: Some(geom),
        id: None,
        properties: Some(props),
        foreign_members: None,
    }
}

/// Converts an annotation set to a FeatureCollection string, features ordered by key.
pub fn annotations_to_geojson(annotations: &AnnotationSet) -> Result<String> {
    let collection = FeatureCollection {
        bbox: None,
        features: annotations
            .sorted()
            .into_iter()
            .map(annotation_to_feature)
            .collect(),
        foreign_members: None,
    };

    serde_json::to_string(&collection).map_err(|e| {
        SpotmapError::Serialization(format!("Failed to serialize feature collection: {}", e))
    })
}

/// Converts a diff to `{"remove": FeatureCollection, "add": FeatureCollection}`.
pub fn diff_to_geojson(diff: &AnnotationDiff) -> Result<String> {
    let to_collection = |annotations: &[Annotation]| FeatureCollection {
        bbox: None,
        features: annotations.iter().map(annotation_to_feature).collect(),
        foreign_members: None,
    };

    let value = json!({
        "remove": to_collection(&diff.to_remove),
        "add": to_collection(&diff.to_add),
    });

    serde_json::to_string(&value)
        .map_err(|e| SpotmapError::Serialization(format!("Failed to serialize diff: {}", e)))
}
