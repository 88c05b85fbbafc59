//! Runtime configuration for the clinic core.
//!
//! Loaded from TOML; every key is optional and falls back to a default.

use crate::clock::is_valid_timestamp_format;
use crate::logging::default_log_level;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Default strftime pattern for auto-generated snapshot observations.
pub const DEFAULT_OBSERVATION_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClinicConfig {
    /// SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// One of trace|debug|info|warn|error.
    #[serde(default = "default_level")]
    pub log_level: String,

    /// Absolute directory for rolling log files.
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Pattern for observations stamped when a snapshot has no notes.
    #[serde(default = "default_observation_format")]
    pub observation_format: String,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("clinic.db")
}

fn default_level() -> String {
    default_log_level().to_string()
}

fn default_log_dir() -> PathBuf {
    std::env::temp_dir().join("clinic-logs")
}

fn default_observation_format() -> String {
    DEFAULT_OBSERVATION_FORMAT.to_string()
}

impl Default for ClinicConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            log_level: default_level(),
            log_dir: default_log_dir(),
            observation_format: default_observation_format(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    InvalidObservationFormat(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read config: {err}"),
            Self::Parse(err) => write!(f, "failed to parse config: {err}"),
            Self::InvalidObservationFormat(format) => {
                write!(f, "invalid observation_format `{format}`")
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::InvalidObservationFormat(_) => None,
        }
    }
}

impl ClinicConfig {
    /// Loads config from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        if !is_valid_timestamp_format(&config.observation_format) {
            return Err(ConfigError::InvalidObservationFormat(
                config.observation_format,
            ));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::{ClinicConfig, ConfigError, DEFAULT_OBSERVATION_FORMAT};
    use std::io::Write;
    use std::path::PathBuf;

    #[test]
    fn empty_document_yields_defaults() {
        let config = ClinicConfig::from_toml_str("").expect("empty config");
        assert_eq!(config, ClinicConfig::default());
        assert_eq!(config.observation_format, DEFAULT_OBSERVATION_FORMAT);
    }

    #[test]
    fn explicit_keys_override_defaults() {
        let config = ClinicConfig::from_toml_str(
            r#"
db_path = "/var/lib/clinic/clinic.db"
log_level = "warn"
observation_format = "%Y-%m-%d"
"#,
        )
        .expect("valid config");
        assert_eq!(config.db_path, PathBuf::from("/var/lib/clinic/clinic.db"));
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.observation_format, "%Y-%m-%d");
    }

    #[test]
    fn rejects_unknown_keys_and_bad_formats() {
        assert!(matches!(
            ClinicConfig::from_toml_str("port = 1"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            ClinicConfig::from_toml_str("observation_format = \"%Q\""),
            Err(ConfigError::InvalidObservationFormat(_))
        ));
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "log_level = \"error\"").expect("write config");
        let config = ClinicConfig::load(file.path()).expect("load config");
        assert_eq!(config.log_level, "error");
    }
}
