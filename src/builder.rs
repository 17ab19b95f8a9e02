//! Engine builder
//!
//! Collects configuration and collaborators before creating a [`MapEngine`].

use crate::compute::diff::{MemorySurface, RenderSink};
use crate::config::Config;
use crate::engine::MapEngine;
use crate::error::Result;
use crate::selection::SelectionSink;
use crate::session::SessionManager;
use std::path::PathBuf;

/// Builder for a [`MapEngine`] with custom configuration and sinks.
pub struct EngineBuilder {
    config: Config,
    config_path: Option<PathBuf>,
    render_sink: Option<Box<dyn RenderSink>>,
    selection_sink: Option<Box<dyn SelectionSink>>,
}

impl EngineBuilder {
    /// Create a builder with default configuration rendering into memory.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            config_path: None,
            render_sink: None,
            selection_sink: None,
        }
    }

    /// Set the engine configuration.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Load configuration from a file at build time. Overrides [`Self::config`].
    pub fn config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn render_sink(mut self, sink: Box<dyn RenderSink>) -> Self {
        self.render_sink = Some(sink);
        self
    }

    pub fn selection_sink(mut self, sink: Box<dyn SelectionSink>) -> Self {
        self.selection_sink = Some(sink);
        self
    }

    /// Build the engine. Fails if the configuration file cannot be read or the
    /// configuration is invalid.
    pub fn build(self) -> Result<MapEngine> {
        let config = match &self.config_path {
            Some(path) => Config::load(path)?,
            None => self.config,
        };

        let sink = self
            .render_sink
            .unwrap_or_else(|| Box::new(MemorySurface::default()));
        let engine = MapEngine::new(config, sink)?;
        if let Some(selection_sink) = self.selection_sink {
            engine.set_selection_sink(selection_sink);
        }
        Ok(engine)
    }

    /// Build the engine together with a session manager using the same session
    /// settings.
    pub fn build_with_sessions(self) -> Result<(MapEngine, SessionManager)> {
        let engine = self.build()?;
        let sessions = SessionManager::from_config(&engine.config().session);
        Ok((engine, sessions))
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("config", &self.config)
            .field("config_path", &self.config_path)
            .field("render_sink", &self.render_sink.is_some())
            .field("selection_sink", &self.selection_sink.is_some())
            .finish()
    }
}
