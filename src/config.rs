// THEORY:
// `AppConfig` is the runtime configuration of the binary. It is resolved once at
// startup in three layers: built-in defaults, then an optional file, then
// `AMBIENT_PALETTE_*` environment variables. The result is validated as a whole
// and converted into the `SessionConfig` the scheduler consumes.

use crate::core_modules::grid::Grid;
use crate::error::ConfigError;
use crate::scheduler::SessionConfig;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Prefix for environment overrides, e.g. `AMBIENT_PALETTE_GRID__ROWS=4`.
pub const ENV_PREFIX: &str = "AMBIENT_PALETTE";

/// Runtime configuration, layered as defaults, then an optional file, then environment.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub grid: Grid,
    pub interval_ms: u64,
    pub startup_delay_ms: u64,
    /// Playback rate for image sequences.
    pub fps: f64,
    /// How far a palette subscriber may lag before losing palettes.
    pub subscriber_capacity: usize,
    /// Sampling threads per frame.
    pub workers: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            grid: Grid::default(),
            interval_ms: 500,
            startup_delay_ms: 2000,
            fps: 30.0,
            subscriber_capacity: 16,
            workers: num_cpus::get(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from `path` (if any) and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, None)
    }

    /// Like `load`, but reads overrides from `env` instead of the process
    /// environment when it is given.
    pub fn load_with_env(
        path: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid.rows == 0 || self.grid.columns == 0 {
            return Err(ConfigError::Invalid(format!(
                "grid must be at least 1x1, got {}x{}",
                self.grid.rows, self.grid.columns
            )));
        }
        if self.interval_ms == 0 {
            return Err(ConfigError::Invalid("interval_ms must be positive".into()));
        }
        if !(self.fps.is_finite() && self.fps > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "fps must be a positive number, got {}",
                self.fps
            )));
        }
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        Ok(())
    }

    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            grid: self.grid,
            interval: Duration::from_millis(self.interval_ms),
            startup_delay: Duration::from_millis(self.startup_delay_ms),
        }
    }
}
