//! Error types for spotmap.

use thiserror::Error;

/// Errors surfaced by the engine.
///
/// Conditions that degrade to "no visual change" (empty viewport, removal of an unknown
/// id, a superseded recomputation) are outcomes, not errors.
#[derive(Debug, Error)]
pub enum SpotmapError {
    /// Non-finite or out-of-range latitude/longitude.
    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown point: {0}")]
    UnknownPoint(String),

    #[error("Unknown group: {0}")]
    UnknownGroup(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SpotmapError>;
