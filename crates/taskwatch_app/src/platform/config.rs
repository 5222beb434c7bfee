use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::LevelFilter;
use serde::{Deserialize, Serialize};
use taskwatch_engine::EngineSettings;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path:?}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("invalid base url {raw:?}: {source}")]
    BaseUrl {
        raw: String,
        source: url::ParseError,
    },
    #[error("unknown log level {0:?}")]
    LogLevel(String),
}

/// Client settings read from an optional RON file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub store_path: PathBuf,
    pub log_path: PathBuf,
    pub log_level: String,
    pub poll_interval_ms: u64,
    pub log_flush_interval_ms: u64,
    pub request_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    /// Bearer used for job submissions when none was remembered.
    pub default_bearer: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            store_path: PathBuf::from("./taskwatch_store.ron"),
            log_path: PathBuf::from("./taskwatch.log"),
            log_level: "info".to_string(),
            poll_interval_ms: 5_000,
            log_flush_interval_ms: 50,
            request_timeout_ms: 30_000,
            connect_timeout_ms: 10_000,
            default_bearer: None,
        }
    }
}

impl ClientConfig {
    /// Reads `path`; `None` when there is no file there.
    pub fn load(path: &Path) -> Result<Option<Self>, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        ron::from_str(&content)
            .map(Some)
            .map_err(|err| ConfigError::Parse {
                path: path.to_path_buf(),
                message: err.to_string(),
            })
    }

    pub fn engine_settings(&self) -> Result<EngineSettings, ConfigError> {
        let base_url = Url::parse(&self.base_url).map_err(|source| ConfigError::BaseUrl {
            raw: self.base_url.clone(),
            source,
        })?;
        Ok(EngineSettings {
            base_url,
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            flush_interval: Duration::from_millis(self.log_flush_interval_ms),
        })
    }

    pub fn level_filter(&self) -> Result<LevelFilter, ConfigError> {
        self.log_level
            .parse()
            .map_err(|_| ConfigError::LogLevel(self.log_level.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_is_reported_and_defaults_apply() {
        let temp = TempDir::new().unwrap();
        let loaded = ClientConfig::load(&temp.path().join("absent.ron")).unwrap();
        assert_eq!(loaded, None);

        let config = loaded.unwrap_or_default();

        let settings = config.engine_settings().unwrap();
        assert_eq!(settings.base_url.as_str(), "http://127.0.0.1:8000/");
        assert_eq!(settings.poll_interval, Duration::from_secs(5));
        assert_eq!(settings.flush_interval, Duration::from_millis(50));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("taskwatch.ron");
        fs::write(
            &path,
            r#"(base_url: "http://jobs.internal:9000", default_bearer: Some("b-1"))"#,
        )
        .unwrap();

        let config = ClientConfig::load(&path).unwrap().unwrap();
        assert_eq!(config.base_url, "http://jobs.internal:9000");
        assert_eq!(config.default_bearer.as_deref(), Some("b-1"));
        assert_eq!(config.poll_interval_ms, 5_000);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("taskwatch.ron");
        fs::write(&path, "(base_url: ").unwrap();

        assert!(matches!(
            ClientConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn bad_base_url_and_level_are_rejected() {
        let config = ClientConfig {
            base_url: "not a url".into(),
            log_level: "loud".into(),
            ..ClientConfig::default()
        };
        assert!(matches!(
            config.engine_settings(),
            Err(ConfigError::BaseUrl { .. })
        ));
        assert!(matches!(config.level_filter(), Err(ConfigError::LogLevel(_))));
    }
}
