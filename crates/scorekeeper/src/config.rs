//! `scorekeeper.toml` loading

use std::path::{Path, PathBuf};

use league_core::{EventKind, FixedRace};
use live_sync::SyncConfig;
use scoring::{LockConfig, ScoringConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "scorekeeper.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringSection {
    pub event: EventKind,
    pub pending_timeout_ms: u64,
}

impl Default for ScoringSection {
    fn default() -> Self {
        Self {
            event: EventKind::League,
            pending_timeout_ms: ScoringConfig::default().pending_timeout_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub sync: SyncConfig,
    pub lock: LockConfig,
    pub scoring: ScoringSection,
    pub race: FixedRace,
}

impl AppConfig {
    /// Load `path`, or `scorekeeper.toml` in the working directory when no path
    /// is given. A missing default file means all defaults; a missing explicit
    /// file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };
        if !required && !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        Self::parse(&contents).map_err(|source| ConfigError::Parse { path, source })
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    pub fn scoring_config(&self) -> ScoringConfig {
        ScoringConfig {
            lock: self.lock,
            pending_timeout_ms: self.scoring.pending_timeout_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scoring::LeagueZone;

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(AppConfig::parse("").unwrap(), AppConfig::default());
    }

    #[test]
    fn test_partial_sections() {
        let config = AppConfig::parse(
            r#"
            [sync]
            debounce_ms = 250

            [lock]
            zone = { fixed = -300 }

            [scoring]
            event = "playoffs"

            [race]
            nine_ball = 9
            "#,
        )
        .unwrap();

        assert_eq!(config.sync.debounce_ms, 250);
        assert_eq!(config.sync.failure_threshold, 5);
        assert_eq!(config.lock.unlock_hour, 8);
        assert_eq!(config.scoring.event, EventKind::Playoffs);
        assert_eq!(config.scoring_config().pending_timeout_ms, 10_000);
        assert_eq!(config.scoring_config().lock.zone, LeagueZone::Fixed(-300));
        assert_eq!(config.race.eight_ball, 5);
        assert_eq!(config.race.nine_ball, 9);
    }

    #[test]
    fn test_local_zone() {
        let config = AppConfig::parse("[lock]\nzone = \"local\"\nunlock_hour = 9").unwrap();
        assert_eq!(config.lock.zone, LeagueZone::Local);
        assert_eq!(config.lock.unlock_hour, 9);
    }

    #[test]
    fn test_unknown_event_is_rejected() {
        assert!(AppConfig::parse("[scoring]\nevent = \"exhibition\"").is_err());
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/scorekeeper.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
