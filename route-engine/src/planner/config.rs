//! Search configuration for the route engine.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::CacheConfig;
use crate::domain::ModeType;
use crate::navigation::Mode;

/// Errors from loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid JSON
    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),

    /// A setting is out of range
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Engine-wide numeric settings.
///
/// Missing fields take their defaults when deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Number of worker tasks running trial slices.
    pub max_concurrent_searches: usize,

    /// Visited-cell ceiling for one trial.
    /// A trial that visits more cells than this fails.
    pub max_cells_per_trial: usize,

    /// Total cells the path record store may hold.
    pub max_cached_cells: usize,

    /// Cells a trial expands before yielding its worker.
    pub cells_per_slice: usize,

    /// Session timeout (seconds). Zero means no timeout.
    pub default_timeout_secs: u64,

    /// Multiplier on the distance heuristic.
    /// Values above 1 trade optimality for smaller searches.
    pub heuristic_weight: f64,

    /// Cells remembered by each session's block cache.
    pub block_cache_capacity: u64,
}

impl SearchConfig {
    /// Create a new configuration with the given parameters.
    pub fn new(
        max_concurrent_searches: usize,
        max_cells_per_trial: usize,
        max_cached_cells: usize,
        cells_per_slice: usize,
        default_timeout_secs: u64,
        heuristic_weight: f64,
        block_cache_capacity: u64,
    ) -> Self {
        Self {
            max_concurrent_searches,
            max_cells_per_trial,
            max_cached_cells,
            cells_per_slice,
            default_timeout_secs,
            heuristic_weight,
            block_cache_capacity,
        }
    }

    /// Load and validate a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: SearchConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every setting is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_searches == 0 {
            return Err(ConfigError::Invalid {
                field: "max_concurrent_searches",
                reason: "at least one worker is required".to_string(),
            });
        }
        if self.cells_per_slice == 0 {
            return Err(ConfigError::Invalid {
                field: "cells_per_slice",
                reason: "a slice must expand at least one cell".to_string(),
            });
        }
        if !self.heuristic_weight.is_finite() || self.heuristic_weight < 0.0 {
            return Err(ConfigError::Invalid {
                field: "heuristic_weight",
                reason: format!("{} is not a non-negative number", self.heuristic_weight),
            });
        }
        Ok(())
    }

    /// Returns the default timeout as a Duration, if there is one.
    pub fn default_timeout(&self) -> Option<Duration> {
        (self.default_timeout_secs > 0).then(|| Duration::from_secs(self.default_timeout_secs))
    }

    /// Returns the per-session block cache settings.
    pub fn block_cache(&self) -> CacheConfig {
        CacheConfig {
            max_capacity: self.block_cache_capacity,
            ..CacheConfig::default()
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_searches: 4,
            max_cells_per_trial: 10_000,
            max_cached_cells: 500_000,
            cells_per_slice: 1_000,
            default_timeout_secs: 30,
            heuristic_weight: 1.7,
            block_cache_capacity: 4096,
        }
    }
}

/// Per-session options.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchFlags {
    /// Session timeout. `None` uses the engine default; a zero duration
    /// disables the timeout.
    pub timeout: Option<Duration>,

    /// Keep flight modes.
    pub allow_flight: bool,

    /// Keep digging modes.
    pub allow_digging: bool,

    /// Keep door modes.
    pub allow_doors: bool,

    /// Pause between expansions so observers can watch. Zero disables
    /// animation.
    pub animation_delay: Duration,

    /// Read and write the path record store.
    pub use_cache: bool,
}

impl SearchFlags {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_flight(mut self, allow: bool) -> Self {
        self.allow_flight = allow;
        self
    }

    pub fn with_digging(mut self, allow: bool) -> Self {
        self.allow_digging = allow;
        self
    }

    pub fn with_doors(mut self, allow: bool) -> Self {
        self.allow_doors = allow;
        self
    }

    pub fn with_animation(mut self, delay: Duration) -> Self {
        self.animation_delay = delay;
        self
    }

    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    /// Returns true if visits should be reported step by step.
    pub fn animate(&self) -> bool {
        !self.animation_delay.is_zero()
    }

    /// The timeout that applies under `config`.
    pub fn effective_timeout(&self, config: &SearchConfig) -> Option<Duration> {
        match self.timeout {
            Some(t) if t.is_zero() => None,
            Some(t) => Some(t),
            None => config.default_timeout(),
        }
    }

    /// Returns true if these flags permit movement of kind `mode`.
    pub fn permits(&self, mode: ModeType) -> bool {
        match mode {
            ModeType::Fly => self.allow_flight,
            ModeType::Dig => self.allow_digging,
            ModeType::Door => self.allow_doors,
            ModeType::None | ModeType::Walk => true,
        }
    }

    /// Drops the modes these flags do not permit.
    pub fn filter_modes(&self, modes: Vec<Arc<dyn Mode>>) -> Vec<Arc<dyn Mode>> {
        modes.into_iter().filter(|m| self.permits(m.mode_type())).collect()
    }
}

impl Default for SearchFlags {
    fn default() -> Self {
        Self {
            timeout: None,
            allow_flight: false,
            allow_digging: false,
            allow_doors: true,
            animation_delay: Duration::ZERO,
            use_cache: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::{DigMode, DoorMode, FlyMode, WalkMode};
    use tempfile::tempdir;

    #[test]
    fn default_config() {
        let config = SearchConfig::default();

        assert_eq!(config.max_concurrent_searches, 4);
        assert_eq!(config.max_cells_per_trial, 10_000);
        assert_eq!(config.max_cached_cells, 500_000);
        assert_eq!(config.cells_per_slice, 1_000);
        assert_eq!(config.default_timeout_secs, 30);
        assert_eq!(config.heuristic_weight, 1.7);
        assert_eq!(config.block_cache_capacity, 4096);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn duration_methods() {
        let config = SearchConfig::default();
        assert_eq!(config.default_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.block_cache().max_capacity, 4096);

        let untimed = SearchConfig {
            default_timeout_secs: 0,
            ..SearchConfig::default()
        };
        assert_eq!(untimed.default_timeout(), None);
    }

    #[test]
    fn custom_config() {
        let config = SearchConfig::new(2, 500, 1000, 50, 5, 1.0, 64);

        assert_eq!(config.max_concurrent_searches, 2);
        assert_eq!(config.max_cells_per_trial, 500);
        assert_eq!(config.max_cached_cells, 1000);
        assert_eq!(config.cells_per_slice, 50);
        assert_eq!(config.default_timeout_secs, 5);
        assert_eq!(config.heuristic_weight, 1.0);
        assert_eq!(config.block_cache_capacity, 64);
    }

    #[test]
    fn validation_rejects_bad_values() {
        let no_workers = SearchConfig {
            max_concurrent_searches: 0,
            ..SearchConfig::default()
        };
        assert!(matches!(
            no_workers.validate(),
            Err(ConfigError::Invalid { field: "max_concurrent_searches", .. })
        ));

        let no_slice = SearchConfig {
            cells_per_slice: 0,
            ..SearchConfig::default()
        };
        assert!(no_slice.validate().is_err());

        let bad_weight = SearchConfig {
            heuristic_weight: f64::NAN,
            ..SearchConfig::default()
        };
        assert!(bad_weight.validate().is_err());
    }

    #[test]
    fn load_partial_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{"max_concurrent_searches": 8, "heuristic_weight": 1.0}"#).unwrap();

        let config = SearchConfig::from_json_file(&path).unwrap();
        assert_eq!(config.max_concurrent_searches, 8);
        assert_eq!(config.heuristic_weight, 1.0);
        assert_eq!(config.cells_per_slice, 1_000);
    }

    #[test]
    fn load_invalid_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{"cells_per_slice": 0}"#).unwrap();
        assert!(matches!(
            SearchConfig::from_json_file(&path),
            Err(ConfigError::Invalid { .. })
        ));

        assert!(matches!(
            SearchConfig::from_json_file(dir.path().join("missing.json")),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn default_flags() {
        let flags = SearchFlags::default();
        assert!(!flags.animate());
        assert!(flags.use_cache);
        assert_eq!(flags.effective_timeout(&SearchConfig::default()), Some(Duration::from_secs(30)));

        let untimed = flags.clone().with_timeout(Duration::ZERO);
        assert_eq!(untimed.effective_timeout(&SearchConfig::default()), None);

        let short = flags.with_timeout(Duration::from_millis(50));
        assert_eq!(short.effective_timeout(&SearchConfig::default()), Some(Duration::from_millis(50)));
    }

    #[test]
    fn flags_filter_modes() {
        let modes: Vec<Arc<dyn Mode>> = vec![
            Arc::new(WalkMode),
            Arc::new(FlyMode),
            Arc::new(DoorMode),
            Arc::new(DigMode),
        ];

        let kept = SearchFlags::default().filter_modes(modes.clone());
        let kinds: Vec<ModeType> = kept.iter().map(|m| m.mode_type()).collect();
        assert_eq!(kinds, vec![ModeType::Walk, ModeType::Door]);

        let everything = SearchFlags::default().with_flight(true).with_digging(true);
        assert_eq!(everything.filter_modes(modes).len(), 4);
    }
}
