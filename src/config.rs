//! Engine configuration, read from `~/.scoutboard/config.json`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::events::{DEFAULT_EVENT_BUFFER, MAX_EVENT_BUFFER};
use crate::legacy::{LegacyMapping, LegacyStatusMigrator};
use crate::records::OWNER_ID;
use crate::stages::PipelineKind;
use crate::store::RecordFilter;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not find home directory")]
    HomeDirNotFound,

    #[error("Config file not found at {0}")]
    NotFound(PathBuf),

    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unknown timezone '{0}'")]
    InvalidTimezone(String),

    #[error("Invalid legacy stage mapping for {kind}: {message}")]
    InvalidLegacyMapping { kind: PipelineKind, message: String },

    #[error("eventBufferSize {0} is out of range (1..=4096)")]
    InvalidEventBuffer(usize),
}

/// Whose items a board shows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BoardScope {
    /// Every advisor's items.
    #[default]
    Global,
    /// Only items owned by this advisor.
    PerUser(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// IANA zone used to turn timestamps into calendar days.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub scope: BoardScope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
    #[serde(default)]
    pub show_completed_reminders: bool,
    /// Per-pipeline replacement for the built-in legacy vocabulary.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub legacy_stages: HashMap<PipelineKind, LegacyMapping>,
    #[serde(default = "default_event_buffer")]
    pub event_buffer_size: usize,
}

fn default_timezone() -> String {
    "Europe/Berlin".to_string()
}

fn default_event_buffer() -> usize {
    DEFAULT_EVENT_BUFFER
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            scope: BoardScope::default(),
            database_path: None,
            show_completed_reminders: false,
            legacy_stages: HashMap::new(),
            event_buffer_size: default_event_buffer(),
        }
    }
}

impl EngineConfig {
    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::InvalidTimezone(self.timezone.clone()))
    }

    /// Legacy mapping for a pipeline: the configured override, else the built-in one.
    pub fn legacy_mapping(&self, kind: PipelineKind) -> LegacyMapping {
        self.legacy_stages
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| LegacyMapping::defaults(kind))
    }

    /// Store filter implementing the configured scope.
    pub fn owner_filter(&self) -> Option<RecordFilter> {
        match &self.scope {
            BoardScope::Global => None,
            BoardScope::PerUser(owner) => Some(RecordFilter::new().eq(OWNER_ID, owner.as_str())),
        }
    }

    pub fn owner_id(&self) -> Option<&str> {
        match &self.scope {
            BoardScope::Global => None,
            BoardScope::PerUser(owner) => Some(owner.as_str()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tz()?;
        if !(1..=MAX_EVENT_BUFFER).contains(&self.event_buffer_size) {
            return Err(ConfigError::InvalidEventBuffer(self.event_buffer_size));
        }
        for (kind, mapping) in &self.legacy_stages {
            LegacyStatusMigrator::new(*kind, mapping.clone()).map_err(|e| {
                ConfigError::InvalidLegacyMapping {
                    kind: *kind,
                    message: e.to_string(),
                }
            })?;
        }
        Ok(())
    }
}

pub fn config_path() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::HomeDirNotFound)?;
    Ok(home.join(".scoutboard").join("config.json"))
}

/// Load and validate the config at the default location.
pub fn load_config() -> Result<EngineConfig, ConfigError> {
    load_config_from(&config_path()?)
}

pub fn load_config_from(path: &Path) -> Result<EngineConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config: EngineConfig = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Load the config, falling back to defaults with a warning.
pub fn load_config_or_default() -> EngineConfig {
    match load_config() {
        Ok(config) => config,
        Err(e) => {
            log::warn!("Using default engine config: {e}");
            EngineConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write_config(value: serde_json::Value) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        fs::write(&path, value.to_string()).expect("write config");
        (dir, path)
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let (_dir, path) = write_config(json!({}));
        let config = load_config_from(&path).expect("load");
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.tz().unwrap(), chrono_tz::Europe::Berlin);
        assert!(config.owner_filter().is_none());
    }

    #[test]
    fn test_per_user_scope() {
        let (_dir, path) = write_config(json!({
            "timezone": "Europe/Vienna",
            "scope": {"perUser": "advisor-7"},
            "showCompletedReminders": true
        }));
        let config = load_config_from(&path).expect("load");
        assert_eq!(config.scope, BoardScope::PerUser("advisor-7".to_string()));
        assert_eq!(config.owner_id(), Some("advisor-7"));
        assert!(config.show_completed_reminders);
        let filter = config.owner_filter().unwrap();
        let mine = json!({"owner_id": "advisor-7"}).as_object().cloned().unwrap();
        let theirs = json!({"owner_id": "advisor-8"}).as_object().cloned().unwrap();
        assert!(filter.matches(&mine));
        assert!(!filter.matches(&theirs));
    }

    #[test]
    fn test_legacy_override() {
        let (_dir, path) = write_config(json!({
            "legacyStages": {
                "scouting": {
                    "zu_kontaktieren": "in_beobachtung",
                    "archiviert": {"stage": "gesichtet", "archived": true}
                }
            }
        }));
        let config = load_config_from(&path).expect("load");
        let mapping = config.legacy_mapping(PipelineKind::Scouting);
        assert_eq!(mapping.rule("archiviert").unwrap().set["archived"], true);
        assert!(mapping.rule("kontaktiert").is_none());
        // Not overridden: built-in defaults.
        assert!(config
            .legacy_mapping(PipelineKind::Task)
            .rule("high")
            .is_some());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let (_dir, path) = write_config(json!({"timezone": "Mars/Olympus"}));
        assert!(matches!(
            load_config_from(&path),
            Err(ConfigError::InvalidTimezone(_))
        ));

        let (_dir, path) = write_config(json!({
            "legacyStages": {"transfer": {"offen": "gibt_es_nicht"}}
        }));
        assert!(matches!(
            load_config_from(&path),
            Err(ConfigError::InvalidLegacyMapping { .. })
        ));
    }

    #[test]
    fn test_event_buffer_bounds() {
        let (_dir, path) = write_config(json!({"eventBufferSize": 18446744073709551615u64}));
        assert!(matches!(
            load_config_from(&path),
            Err(ConfigError::InvalidEventBuffer(_))
        ));

        let (_dir, path) = write_config(json!({"eventBufferSize": 0}));
        assert!(matches!(
            load_config_from(&path),
            Err(ConfigError::InvalidEventBuffer(0))
        ));

        let (_dir, path) = write_config(json!({"eventBufferSize": 256}));
        assert_eq!(load_config_from(&path).unwrap().event_buffer_size, 256);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.json");
        assert!(matches!(
            load_config_from(&path),
            Err(ConfigError::NotFound(_))
        ));
    }
}
