use crate::fusion::FusionSettings;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";
pub const DEFAULT_SERVER_PORT: u16 = 8080;
pub const DEFAULT_BROKER_HOST: &str = "localhost";
pub const DEFAULT_BROKER_PORT: u16 = 1883;
pub const DEFAULT_CLIENT_ID: &str = "occupancy-fusion";
pub const DEFAULT_KEEP_ALIVE_SECS: u64 = 60;
pub const DEFAULT_ORACLE_URL: &str = "http://localhost:11434/api/chat";
pub const DEFAULT_ORACLE_MODEL: &str = "qwen2.5:1.5b";
pub const DEFAULT_ORACLE_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub app: AppSection,
    pub logging: LoggingSection,
    #[serde(default)]
    pub broker: Option<BrokerSection>,
    #[serde(default)]
    pub oracle: Option<OracleSection>,
    #[serde(default)]
    pub fusion: Option<FusionSection>,
    #[serde(default)]
    pub server: Option<ServerSection>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSection {
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSection {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BrokerSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub client_id: Option<String>,
    pub keep_alive_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OracleSection {
    /// Chat endpoint of the advisory service
    pub url: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Overrides for the fusion constants; absent keys keep the compiled defaults.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct FusionSection {
    pub occupancy_distance_cm: Option<f64>,
    pub min_sensors_for_occupancy: Option<usize>,
    pub vacancy_timeout_secs: Option<u64>,
    pub history_capacity: Option<usize>,
    pub analysis_interval_secs: Option<u64>,
    pub recency_window_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSection {
    /// Port for the status API (default: 8080)
    pub port: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerSettings {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleSettings {
    pub url: String,
    pub model: String,
    pub timeout: Duration,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

pub fn load_default() -> Result<Config, ConfigError> {
    load_from_path(DEFAULT_CONFIG_PATH)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    Ok(config)
}

impl Config {
    /// Log level from `[logging]`, falling back to INFO when unparseable.
    pub fn log_level(&self) -> tracing::Level {
        self.logging
            .level
            .trim()
            .parse()
            .unwrap_or(tracing::Level::INFO)
    }

    pub fn broker(&self) -> BrokerSettings {
        let section = self.broker.as_ref();
        BrokerSettings {
            host: section
                .and_then(|s| s.host.clone())
                .unwrap_or_else(|| DEFAULT_BROKER_HOST.to_string()),
            port: section.and_then(|s| s.port).unwrap_or(DEFAULT_BROKER_PORT),
            client_id: section
                .and_then(|s| s.client_id.clone())
                .unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string()),
            keep_alive: Duration::from_secs(
                section
                    .and_then(|s| s.keep_alive_secs)
                    .unwrap_or(DEFAULT_KEEP_ALIVE_SECS),
            ),
        }
    }

    pub fn oracle(&self) -> OracleSettings {
        let section = self.oracle.as_ref();
        OracleSettings {
            url: section
                .and_then(|s| s.url.clone())
                .unwrap_or_else(|| DEFAULT_ORACLE_URL.to_string()),
            model: section
                .and_then(|s| s.model.clone())
                .unwrap_or_else(|| DEFAULT_ORACLE_MODEL.to_string()),
            timeout: Duration::from_secs(
                section
                    .and_then(|s| s.timeout_secs)
                    .unwrap_or(DEFAULT_ORACLE_TIMEOUT_SECS),
            ),
        }
    }

    pub fn fusion(&self) -> FusionSettings {
        let defaults = FusionSettings::default();
        let Some(section) = self.fusion.as_ref() else {
            return defaults;
        };
        FusionSettings {
            occupancy_distance_cm: section
                .occupancy_distance_cm
                .unwrap_or(defaults.occupancy_distance_cm),
            min_sensors_for_occupancy: section
                .min_sensors_for_occupancy
                .unwrap_or(defaults.min_sensors_for_occupancy),
            vacancy_timeout: section
                .vacancy_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.vacancy_timeout),
            history_capacity: section
                .history_capacity
                .filter(|capacity| *capacity > 0)
                .unwrap_or(defaults.history_capacity),
            analysis_interval: section
                .analysis_interval_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.analysis_interval),
            recency_window: section
                .recency_window_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.recency_window),
        }
    }

    /// Returns the status API port (default: 8080)
    pub fn server_port(&self) -> u16 {
        self.server
            .as_ref()
            .and_then(|s| s.port)
            .unwrap_or(DEFAULT_SERVER_PORT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn write_temp_config(tag: &str, contents: &str) -> Result<std::path::PathBuf, Box<dyn std::error::Error>> {
        let unique = SystemTime::now().duration_since(UNIX_EPOCH)?.as_nanos();
        let path = std::env::temp_dir().join(format!("occupancy-config-{tag}-{unique}.toml"));
        fs::write(&path, contents)?;
        Ok(path)
    }

    #[test]
    fn default_config_matches_compiled_constants() -> Result<(), Box<dyn std::error::Error>> {
        let config = load_default()?;

        assert_eq!(config.fusion(), FusionSettings::default());
        assert_eq!(config.oracle().timeout, Duration::from_secs(30));
        Ok(())
    }

    #[test]
    fn minimal_config_uses_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let path = write_temp_config(
            "minimal",
            r#"
[app]
name = "occupancy-fusion"

[logging]
level = "debug"
"#,
        )?;

        let result = load_from_path(&path)?;
        let _ = fs::remove_file(&path);

        assert_eq!(result.log_level(), tracing::Level::DEBUG);
        assert_eq!(result.server_port(), DEFAULT_SERVER_PORT);
        assert_eq!(result.broker().host, DEFAULT_BROKER_HOST);
        assert_eq!(result.broker().port, DEFAULT_BROKER_PORT);
        assert_eq!(result.oracle().url, DEFAULT_ORACLE_URL);
        assert_eq!(result.oracle().model, DEFAULT_ORACLE_MODEL);
        assert_eq!(result.fusion(), FusionSettings::default());
        Ok(())
    }

    #[test]
    fn partial_fusion_section_overrides_only_given_keys() -> Result<(), Box<dyn std::error::Error>> {
        let path = write_temp_config(
            "fusion",
            r#"
[app]
name = "occupancy-fusion"

[logging]
level = "info"

[fusion]
vacancy_timeout_secs = 45
history_capacity = 0
"#,
        )?;

        let result = load_from_path(&path)?;
        let _ = fs::remove_file(&path);
        let fusion = result.fusion();

        assert_eq!(fusion.vacancy_timeout, Duration::from_secs(45));
        assert_eq!(fusion.history_capacity, FusionSettings::default().history_capacity);
        assert_eq!(fusion.occupancy_distance_cm, 50.0);
        Ok(())
    }

    #[test]
    fn unparseable_log_level_falls_back_to_info() -> Result<(), Box<dyn std::error::Error>> {
        let path = write_temp_config(
            "level",
            r#"
[app]
name = "occupancy-fusion"

[logging]
level = "loud"
"#,
        )?;

        let result = load_from_path(&path)?;
        let _ = fs::remove_file(&path);

        assert_eq!(result.log_level(), tracing::Level::INFO);
        Ok(())
    }

    #[test]
    fn missing_config_file_returns_read_error() {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before unix epoch")
            .as_nanos();
        let path = std::env::temp_dir().join(format!("occupancy-config-missing-{unique}.toml"));

        let result = load_from_path(&path);

        assert!(matches!(result, Err(ConfigError::Read(_))));
    }

    #[test]
    fn invalid_toml_returns_parse_error() -> Result<(), Box<dyn std::error::Error>> {
        let path = write_temp_config("invalid", "not = [valid")?;

        let result = load_from_path(&path);
        let _ = fs::remove_file(&path);

        assert!(matches!(result, Err(ConfigError::Parse(_))));
        Ok(())
    }
}
