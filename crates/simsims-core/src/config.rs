//! Configuration loading for the world.
//!
//! All world settings can be loaded from a TOML file; every section falls
//! back to its defaults, so partial files are fine.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::activity::DEFAULT_MAX_INSTANCES;
use crate::storage::DEFAULT_CAPACITY;

/// Complete world configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimsimsConfig {
    /// Initial settlement and pacing
    #[serde(default)]
    pub world: WorldConfig,
    /// Dispatcher settings
    #[serde(default)]
    pub dispatch: DispatchConfig,
    /// Storage instance settings
    #[serde(default)]
    pub storage: StorageConfig,
    /// Activity parameters
    #[serde(default)]
    pub activity: ActivityConfig,
    /// Recording and export
    #[serde(default)]
    pub output: OutputConfig,
}

impl SimsimsConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parses configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes the configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// The large, unpaced run: 1000 workers, 1000 resources, no pause
    /// between cycles.
    pub fn reference_run() -> Self {
        let mut config = Self::default();
        config.world.starting_workers = 1000;
        config.world.starting_resources = 1000;
        config.world.pacing_ms = 0;
        config
    }

    /// Rejects values the world cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dispatch.concurrency_cap == 0 {
            return Err(ConfigError::Invalid("dispatch.concurrency_cap must be at least 1".into()));
        }
        if self.storage.capacity < 2 {
            return Err(ConfigError::Invalid("storage.capacity must be at least 2".into()));
        }
        if self.activity.max_instances == 0 {
            return Err(ConfigError::Invalid("activity.max_instances must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.activity.reproduction_chance) {
            return Err(ConfigError::Invalid(
                "activity.reproduction_chance must lie in [0, 1]".into(),
            ));
        }
        let odds = [
            ("factory_accident_odds", self.activity.factory_accident_odds),
            ("fields_accident_odds", self.activity.fields_accident_odds),
        ];
        for (name, [lo, hi]) in odds {
            if lo > 10 || hi > 10 {
                return Err(ConfigError::Invalid(format!("activity.{name} is out of ten")));
            }
        }
        let w = &self.world;
        if w.factories + w.fields + w.dining_halls + w.homes > 0
            && [w.factories, w.fields, w.dining_halls, w.homes].contains(&0)
        {
            return Err(ConfigError::Invalid(
                "world needs at least one instance of every activity kind".into(),
            ));
        }
        Ok(())
    }
}

/// Initial settlement and pacing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Workers placed in the first Barack
    pub starting_workers: usize,
    /// Units split between food and products by a fair coin
    pub starting_resources: usize,
    /// Pause between cycles
    pub pacing_ms: u64,
    /// Seed for every random draw; absent means entropy
    pub seed: Option<u64>,
    /// Stop after this many cycles even if workers remain
    pub max_cycles: Option<u64>,
    pub factories: usize,
    pub fields: usize,
    pub dining_halls: usize,
    pub homes: usize,
}

impl WorldConfig {
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            starting_workers: 40,
            starting_resources: 80,
            pacing_ms: 1000,
            seed: None,
            max_cycles: None,
            factories: 4,
            fields: 4,
            dining_halls: 4,
            homes: 8,
        }
    }
}

/// Dispatcher settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Most activity runs in flight at once
    pub concurrency_cap: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self { concurrency_cap: 10 }
    }
}

/// Storage instance settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Capacity of every new instance
    pub capacity: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

/// Activity parameters. Ranges are inclusive `[low, high]` pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityConfig {
    /// Instance cap per activity kind
    pub max_instances: usize,
    /// Priority above which a shortage spawns another instance
    pub spawn_threshold: u32,
    /// Vitality a Home visit restores
    pub healing: u8,
    /// Chance that a Home visit attempts reproduction
    pub reproduction_chance: f64,
    pub factory_accident_odds: [u8; 2],
    pub factory_longevity_cost: [u8; 2],
    pub fields_accident_odds: [u8; 2],
    pub fields_injury: [u8; 2],
    pub harvest_quality: [u8; 2],
    /// Subtracted from food quality when a worker eats
    pub dining_quality_offset: i32,
    /// Vitality of settlers and newborns
    pub worker_vitality: [u8; 2],
    /// Quality of the initial food stock
    pub food_quality: [u8; 2],
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            max_instances: DEFAULT_MAX_INSTANCES,
            spawn_threshold: 5,
            healing: 5,
            reproduction_chance: 0.5,
            factory_accident_odds: [3, 6],
            factory_longevity_cost: [5, 15],
            fields_accident_odds: [3, 6],
            fields_injury: [10, 70],
            harvest_quality: [20, 100],
            dining_quality_offset: 6,
            worker_vitality: [10, 100],
            food_quality: [40, 100],
        }
    }
}

/// Recording and export settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Append-only JSONL ledger of cycle rows; in memory when absent
    pub ledger_path: Option<PathBuf>,
    /// Directory receiving the final run report
    pub export_dir: Option<PathBuf>,
    /// Print a text chart of the run at the end
    pub chart: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            ledger_path: None,
            export_dir: None,
            chart: true,
        }
    }
}

/// Errors that can occur while loading or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Generates a documented default configuration file.
pub fn default_config_toml() -> String {
    r#"# Simsims Configuration

[world]
starting_workers = 40
starting_resources = 80
# Milliseconds between cycles
pacing_ms = 1000
# seed = 42
# max_cycles = 500
factories = 4
fields = 4
dining_halls = 4
homes = 8

[dispatch]
concurrency_cap = 10

[storage]
capacity = 20

[activity]
max_instances = 50
spawn_threshold = 5
healing = 5
reproduction_chance = 0.5
# Accident odds are out of ten
factory_accident_odds = [3, 6]
factory_longevity_cost = [5, 15]
fields_accident_odds = [3, 6]
fields_injury = [10, 70]
harvest_quality = [20, 100]
dining_quality_offset = 6
worker_vitality = [10, 100]
food_quality = [40, 100]

[output]
# ledger_path = "simsims_ledger.jsonl"
# export_dir = "reports"
chart = true
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_toml_matches_defaults() {
        let parsed = SimsimsConfig::from_str(&default_config_toml()).unwrap();
        assert_eq!(parsed, SimsimsConfig::default());
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = SimsimsConfig::from_str(
            r#"
[world]
starting_workers = 2
seed = 9

[dispatch]
concurrency_cap = 3
"#,
        )
        .unwrap();

        assert_eq!(config.world.starting_workers, 2);
        assert_eq!(config.world.seed, Some(9));
        assert_eq!(config.world.homes, 8);
        assert_eq!(config.dispatch.concurrency_cap, 3);
        assert_eq!(config.storage.capacity, 20);
        assert_eq!(config.activity.fields_injury, [10, 70]);
    }

    #[test]
    fn test_reference_run() {
        let config = SimsimsConfig::reference_run();
        assert_eq!(config.world.starting_workers, 1000);
        assert_eq!(config.world.starting_resources, 1000);
        assert_eq!(config.world.pacing(), Duration::ZERO);
    }

    #[test]
    fn test_round_trip_through_toml() {
        let mut config = SimsimsConfig::reference_run();
        config.world.seed = Some(17);
        config.output.export_dir = Some(PathBuf::from("reports"));

        let text = config.to_toml().unwrap();
        assert_eq!(SimsimsConfig::from_str(&text).unwrap(), config);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = SimsimsConfig::from_str("[dispatch]\nconcurrency_cap = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = SimsimsConfig::from_str("[activity]\nreproduction_chance = 1.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = SimsimsConfig::from_str("[world]\nhomes = 0\n").unwrap_err();
        assert!(err.to_string().contains("every activity kind"));
    }

    #[test]
    fn test_malformed_toml() {
        let err = SimsimsConfig::from_str("[world\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[storage]\ncapacity = 8").unwrap();

        let config = SimsimsConfig::from_file(file.path()).unwrap();
        assert_eq!(config.storage.capacity, 8);

        let missing = SimsimsConfig::from_file(Path::new("/nonexistent/simsims.toml"));
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }
}
