//! Configuration for the clustering engine.
//!
//! The only tunables the map pipeline has are the zoom-to-cell-size table and the panel
//! overlap fraction; absorption and session settings cover the collaborating flows.
use serde::de::Error;
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, SpotmapError};

/// One step of the cell-size table: from `min_zoom` upwards, cells are `cell_edge_px`
/// map pixels wide (until the next step takes over).
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ZoomStep {
    pub min_zoom: f64,
    pub cell_edge_px: f64,
}

impl ZoomStep {
    pub const fn new(min_zoom: f64, cell_edge_px: f64) -> Self {
        Self {
            min_zoom,
            cell_edge_px,
        }
    }
}

/// Step function from zoom level to grid cell edge length.
///
/// Steps are ordered by ascending `min_zoom` and cell edges never grow as zoom grows,
/// so clusters only split (never merge) while zooming in.
///
/// # Examples
///
/// ```
/// use spotmap::config::CellSizeTable;
///
/// let table = CellSizeTable::default();
/// assert_eq!(table.cell_edge_for_zoom(5.0), 88.0);
/// assert_eq!(table.cell_edge_for_zoom(14.0), 32.0);
/// assert_eq!(table.cell_edge_for_zoom(20.0), 16.0);
/// ```
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct CellSizeTable {
    steps: Vec<ZoomStep>,
}

impl CellSizeTable {
    /// Build a table, rejecting empty, unordered or non-monotonic step lists.
    pub fn new(steps: Vec<ZoomStep>) -> Result<Self> {
        let table = Self { steps };
        table.validate()?;
        Ok(table)
    }

    pub fn steps(&self) -> &[ZoomStep] {
        &self.steps
    }

    /// Cell edge in map pixels for a zoom level. Zoom levels below the first step use
    /// the first step.
    pub fn cell_edge_for_zoom(&self, zoom: f64) -> f64 {
        let mut edge = match self.steps.first() {
            Some(step) => step.cell_edge_px,
            None => return Self::FALLBACK_EDGE,
        };
        for step in &self.steps {
            if zoom >= step.min_zoom {
                edge = step.cell_edge_px;
            } else {
                break;
            }
        }
        edge
    }

    const FALLBACK_EDGE: f64 = 32.0;

    pub fn validate(&self) -> Result<()> {
        if self.steps.is_empty() {
            return Err(SpotmapError::InvalidConfig(
                "Cell size table must have at least one step".to_string(),
            ));
        }

        for step in &self.steps {
            if !step.min_zoom.is_finite() {
                return Err(SpotmapError::InvalidConfig(format!(
                    "Zoom step must be finite, got: {}",
                    step.min_zoom
                )));
            }
            if !step.cell_edge_px.is_finite() || step.cell_edge_px <= 0.0 {
                return Err(SpotmapError::InvalidConfig(format!(
                    "Cell edge must be positive and finite, got: {}",
                    step.cell_edge_px
                )));
            }
        }

        for pair in self.steps.windows(2) {
            if pair[1].min_zoom <= pair[0].min_zoom {
                return Err(SpotmapError::InvalidConfig(format!(
                    "Zoom steps must be strictly ascending: {} then {}",
                    pair[0].min_zoom, pair[1].min_zoom
                )));
            }
            if pair[1].cell_edge_px > pair[0].cell_edge_px {
                return Err(SpotmapError::InvalidConfig(format!(
                    "Cell edge must not grow with zoom: {}px at zoom {} then {}px at zoom {}",
                    pair[0].cell_edge_px, pair[0].min_zoom, pair[1].cell_edge_px, pair[1].min_zoom
                )));
            }
        }

        Ok(())
    }
}

impl Default for CellSizeTable {
    fn default() -> Self {
        Self {
            steps: vec![
                ZoomStep::new(0.0, 88.0),
                ZoomStep::new(13.0, 32.0),
                ZoomStep::new(19.0, 16.0),
            ],
        }
    }
}

/// Rule for pulling nearby ungrouped discoveries into a freshly created Spot.
///
/// Disabled unless `radius_m` is set.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AbsorptionPolicy {
    /// Maximum Haversine distance in meters from the Spot's coordinate.
    #[serde(default)]
    pub radius_m: Option<f64>,

    /// Maximum distance in time from the Spot's newest member, in seconds.
    #[serde(default)]
    pub time_window_secs: Option<u64>,
}

impl AbsorptionPolicy {
    pub fn within_radius(radius_m: f64) -> Self {
        Self {
            radius_m: Some(radius_m),
            time_window_secs: None,
        }
    }

    pub fn with_time_window(mut self, window: Duration) -> Self {
        self.time_window_secs = Some(window.as_secs());
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.radius_m.is_some()
    }

    pub fn time_window(&self) -> Option<Duration> {
        self.time_window_secs.map(Duration::from_secs)
    }
}

/// Settings for recognition sessions.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    #[serde(default = "SessionConfig::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl SessionConfig {
    const fn default_timeout_secs() -> u64 {
        30
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: Self::default_timeout_secs(),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub cell_sizes: CellSizeTable,

    /// Edge length of one world tile at zoom 0, in map pixels.
    #[serde(default = "Config::default_tile_size")]
    pub tile_size: f64,

    /// Fraction of the viewport height above which a detail panel is asked to shrink
    /// when a new selection happens.
    #[serde(default = "Config::default_panel_overlap_fraction")]
    pub panel_overlap_fraction: f64,

    #[serde(default)]
    pub absorption: AbsorptionPolicy,

    #[serde(default)]
    pub session: SessionConfig,
}

impl Config {
    const fn default_tile_size() -> f64 {
        256.0
    }

    const fn default_panel_overlap_fraction() -> f64 {
        0.5
    }

    pub fn with_cell_sizes(mut self, table: CellSizeTable) -> Self {
        self.cell_sizes = table;
        self
    }

    pub fn with_tile_size(mut self, tile_size: f64) -> Self {
        assert!(tile_size > 0.0, "Tile size must be greater than zero");
        self.tile_size = tile_size;
        self
    }

    pub fn with_panel_overlap_fraction(mut self, fraction: f64) -> Self {
        assert!(
            fraction > 0.0 && fraction <= 1.0,
            "Panel overlap fraction must be in (0, 1]"
        );
        self.panel_overlap_fraction = fraction;
        self
    }

    pub fn with_absorption(mut self, policy: AbsorptionPolicy) -> Self {
        if let Some(radius) = policy.radius_m
            && radius > 50_000.0
        {
            log::warn!(
                "Absorption radius of {} m is very large; creating a Spot may swallow \
                discoveries from other towns.",
                radius
            );
        }
        self.absorption = policy;
        self
    }

    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session.timeout_secs = timeout.as_secs();
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.cell_sizes.validate()?;

        if !self.tile_size.is_finite() || self.tile_size <= 0.0 {
            return Err(SpotmapError::InvalidConfig(format!(
                "Tile size must be positive and finite, got: {}",
                self.tile_size
            )));
        }

        let fraction = self.panel_overlap_fraction;
        if !fraction.is_finite() || fraction <= 0.0 || fraction > 1.0 {
            return Err(SpotmapError::InvalidConfig(format!(
                "Panel overlap fraction must be in (0, 1], got: {}",
                fraction
            )));
        }

        if let Some(radius) = self.absorption.radius_m {
            crate::compute::validation::validate_radius(radius)
                .map_err(|e| SpotmapError::InvalidConfig(format!("Absorption {}", e)))?;
        }

        if self.session.timeout_secs == 0 {
            return Err(SpotmapError::InvalidConfig(
                "Session timeout must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        let config: Config = serde_json::from_str(json)?;
        if let Err(e) = config.validate() {
            return Err(serde_json::Error::custom(e));
        }
        Ok(config)
    }

    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> std::result::Result<Self, toml::de::Error> {
        let config: Config = toml::from_str(toml_str)?;
        if let Err(e) = config.validate() {
            return Err(toml::de::Error::custom(e));
        }
        Ok(config)
    }

    #[cfg(feature = "toml")]
    pub fn to_toml(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Load a configuration file; `.toml` files need the `toml` feature, anything else
    /// is read as JSON.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;

        match path.extension().and_then(|ext| ext.to_str()) {
            #[cfg(feature = "toml")]
            Some("toml") => {
                Self::from_toml(&contents).map_err(|e| SpotmapError::InvalidConfig(e.to_string()))
            }
            #[cfg(not(feature = "toml"))]
            Some("toml") => Err(SpotmapError::InvalidConfig(
                "TOML configuration requires the `toml` feature".to_string(),
            )),
            _ => Ok(Self::from_json(&contents)?),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cell_sizes: CellSizeTable::default(),
            tile_size: Self::default_tile_size(),
            panel_overlap_fraction: Self::default_panel_overlap_fraction(),
            absorption: AbsorptionPolicy::default(),
            session: SessionConfig::default(),
        }
    }
}
