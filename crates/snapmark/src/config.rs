//! JSON configuration.

use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use log::LevelFilter;
use serde::{Deserialize, Serialize};
use snapmark_core::MarkerId;
use snapmark_library::{
    FixedMarkerLibrary, MarkerLibrary, RuntimeLibraryParams, RuntimeMarkerLibrary,
};
use snapmark_tracking::TemplateSet;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Which marker library the session uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LibraryKind {
    /// Accepts photos as new markers at runtime.
    #[default]
    Mutable,
    /// Bundled library; registrations resolve as unsupported.
    Fixed,
}

fn default_physical_width() -> f32 {
    0.1
}

fn default_max_tracked_images() -> usize {
    3
}

fn default_templates() -> TemplateSet {
    TemplateSet::single("cube")
}

fn default_log_level() -> String {
    "info".to_owned()
}

/// Session configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SnapmarkConfig {
    /// Printed width of every registered marker, in meters.
    #[serde(default = "default_physical_width")]
    pub physical_width_meters: f32,
    /// How many markers the detection subsystem should track at once.
    #[serde(default = "default_max_tracked_images")]
    pub max_tracked_images: usize,
    /// Object templates spawned round-robin for new markers.
    #[serde(default = "default_templates")]
    pub templates: TemplateSet,
    #[serde(default)]
    pub library: LibraryKind,
    #[serde(default)]
    pub runtime_library: RuntimeLibraryParams,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for SnapmarkConfig {
    fn default() -> Self {
        Self {
            physical_width_meters: default_physical_width(),
            max_tracked_images: default_max_tracked_images(),
            templates: default_templates(),
            library: LibraryKind::default(),
            runtime_library: RuntimeLibraryParams::default(),
            log_level: default_log_level(),
        }
    }
}

impl SnapmarkConfig {
    /// Load and validate a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        let cfg: Self = serde_json::from_str(&raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.physical_width_meters.is_finite() || self.physical_width_meters <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "physical_width_meters must be > 0, got {}",
                self.physical_width_meters
            )));
        }
        if self.max_tracked_images == 0 {
            return Err(ConfigError::Invalid(
                "max_tracked_images must be >= 1".to_owned(),
            ));
        }
        self.level_filter()?;
        Ok(())
    }

    pub fn level_filter(&self) -> Result<LevelFilter, ConfigError> {
        LevelFilter::from_str(&self.log_level)
            .map_err(|_| ConfigError::Invalid(format!("unknown log level '{}'", self.log_level)))
    }

    /// Instantiate the configured marker library.
    pub fn build_library(&self) -> Arc<dyn MarkerLibrary> {
        match self.library {
            LibraryKind::Mutable => Arc::new(RuntimeMarkerLibrary::with_params(
                "runtime",
                self.runtime_library.clone(),
            )),
            LibraryKind::Fixed => Arc::new(FixedMarkerLibrary::new("bundled", Vec::<MarkerId>::new())),
        }
    }
}
