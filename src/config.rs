//! Configuration management for RaceChain

use crate::blockchain::MAX_DIFFICULTY;
use crate::error::ConfigError;
use crate::miner::DEFAULT_CHECK_INTERVAL;
use crate::participant::normalize_name;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "racechain.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub race: RaceConfig,
    #[serde(default)]
    pub roster: RosterConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Leading zero bits required of a block hash
    #[serde(default = "default_difficulty")]
    pub difficulty: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RaceConfig {
    /// Humantime duration, e.g. "30s" or "1m 30s"
    #[serde(default = "default_timeout")]
    pub timeout: String,
    /// Extra races run when the ledger rejects a winning block
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_check_interval")]
    pub cancel_check_interval: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RosterConfig {
    #[serde(default = "default_starting_balance")]
    pub starting_balance: f64,
    #[serde(default = "default_users")]
    pub users: Vec<String>,
    #[serde(default = "default_miners")]
    pub miners: Vec<String>,
}

/// Race parameters resolved from [`RaceConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaceSettings {
    pub timeout: Duration,
    pub max_retries: u32,
    pub cancel_check_interval: u64,
}

impl Default for RaceSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 0,
            cancel_check_interval: DEFAULT_CHECK_INTERVAL,
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: default_difficulty(),
        }
    }
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            max_retries: 0,
            cancel_check_interval: default_check_interval(),
        }
    }
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            starting_balance: default_starting_balance(),
            users: default_users(),
            miners: default_miners(),
        }
    }
}

impl RaceConfig {
    pub fn settings(&self) -> Result<RaceSettings, ConfigError> {
        let timeout = humantime::parse_duration(&self.timeout).map_err(|e| ConfigError::Duration {
            value: self.timeout.clone(),
            reason: e.to_string(),
        })?;

        Ok(RaceSettings {
            timeout,
            max_retries: self.max_retries,
            cancel_check_interval: self.cancel_check_interval,
        })
    }
}

impl Config {
    /// Parse and validate a TOML document.
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, falling back to defaults when the file is absent.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            let config = Config::default();
            config.validate()?;
            return Ok(config);
        }
        let source = fs::read_to_string(path)?;
        Self::from_toml(&source)
    }

    /// Check values the simulation cannot run without.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ledger.difficulty == 0 || self.ledger.difficulty > MAX_DIFFICULTY {
            return Err(ConfigError::Invalid(format!(
                "ledger.difficulty must be between 1 and {}",
                MAX_DIFFICULTY
            )));
        }

        if self.race.settings()?.timeout.is_zero() {
            return Err(ConfigError::Invalid("race.timeout must be non-zero".to_string()));
        }

        if self.race.cancel_check_interval == 0 {
            return Err(ConfigError::Invalid("race.cancel_check_interval must be non-zero".to_string()));
        }

        if !self.roster.starting_balance.is_finite() || self.roster.starting_balance < 0.0 {
            return Err(ConfigError::Invalid(
                "roster.starting_balance must be a non-negative number".to_string(),
            ));
        }

        if self.roster.miners.is_empty() {
            return Err(ConfigError::Invalid("roster.miners must name at least one miner".to_string()));
        }

        let mut seen = HashSet::new();
        for name in self.roster.users.iter().chain(&self.roster.miners) {
            if !seen.insert(normalize_name(name)) {
                return Err(ConfigError::Invalid(format!("duplicate roster name '{}'", name.trim())));
            }
        }

        Ok(())
    }
}

pub fn load_config() -> Result<Config, ConfigError> {
    Config::load(DEFAULT_CONFIG_PATH)
}

fn default_difficulty() -> u32 {
    8
}

fn default_timeout() -> String {
    "30s".to_string()
}

fn default_check_interval() -> u64 {
    DEFAULT_CHECK_INTERVAL
}

fn default_starting_balance() -> f64 {
    100.0
}

fn default_users() -> Vec<String> {
    [
        "Saahil Mahato",
        "Anakin Skywalker",
        "Yoda",
        "Han Solo",
        "Obi-wan Kenobi",
        "Qui-Gon Ginn",
        "Ciri",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_miners() -> Vec<String> {
    ["Padme Amidala", "Geralt", "Yennefer", "Vesimir"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path().join("missing.toml")).unwrap();

        assert_eq!(config.ledger.difficulty, 8);
        assert_eq!(config.roster.users.len(), 7);
        assert_eq!(config.roster.miners.len(), 4);
        assert_eq!(config.race.settings().unwrap(), RaceSettings::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[race]\ntimeout = \"1m 30s\"\nmax_retries = 2\n\n[roster]\nminers = [\"Geralt\"]").unwrap();

        let config = Config::load(file.path()).unwrap();
        let settings = config.race.settings().unwrap();
        assert_eq!(settings.timeout, Duration::from_secs(90));
        assert_eq!(settings.max_retries, 2);
        assert_eq!(config.roster.miners, vec!["Geralt".to_string()]);
        assert_eq!(config.roster.users.len(), 7);
        assert_eq!(config.ledger.difficulty, 8);
    }

    #[test]
    fn test_bad_duration_rejected() {
        let err = Config::from_toml("[race]\ntimeout = \"soon\"").unwrap_err();
        assert!(matches!(err, ConfigError::Duration { .. }));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        assert!(matches!(Config::from_toml("[race]\ntimeout = \"0s\""), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_difficulty_bounds() {
        assert!(Config::from_toml("[ledger]\ndifficulty = 0").is_err());
        assert!(Config::from_toml("[ledger]\ndifficulty = 33").is_err());
        assert!(Config::from_toml("[ledger]\ndifficulty = 12").is_ok());
    }

    #[test]
    fn test_roster_requires_miner_and_unique_names() {
        assert!(Config::from_toml("[roster]\nminers = []").is_err());
        let err = Config::from_toml("[roster]\nusers = [\"Ciri\"]\nminers = [\"ciri\"]").unwrap_err();
        assert!(err.to_string().contains("duplicate roster name"));
    }

    #[test]
    fn test_negative_balance_rejected() {
        assert!(Config::from_toml("[roster]\nstarting_balance = -1.0").is_err());
    }
}
