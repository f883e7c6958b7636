//! Configuration loading and management.

use std::path::{Path, PathBuf};

use dwell_core::{AnalysisConfig, GridConfig, OutingConfig, SleepConfig};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Application configuration.
///
/// Every section is optional; missing keys keep the engine defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Minute grid construction.
    pub grid: GridConfig,

    /// Sleep segmentation tunables.
    pub sleep: SleepConfig,

    /// Outing detection thresholds.
    pub outing: OutingConfig,
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (DWELL_SECTION__KEY)
        figment = figment.merge(Env::prefixed("DWELL_").split("__"));

        figment.extract()
    }

    /// Engine configuration for a run.
    #[must_use]
    pub fn analysis(&self) -> AnalysisConfig {
        AnalysisConfig {
            grid: self.grid.clone(),
            sleep: self.sleep.clone(),
            outing: self.outing.clone(),
        }
    }
}

/// Returns the platform-specific config directory for dwell.
///
/// On Linux: `~/.config/dwell`
pub fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("dwell"))
}
