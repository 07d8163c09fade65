//! Layered configuration for the sentinel
//!
//! Sources, later ones winning:
//! 1. Built-in defaults
//! 2. An optional config file (TOML, YAML or JSON, chosen by extension)
//! 3. `ACP_SENTINEL_*` environment variables, nested keys split on `__`
//!    (`ACP_SENTINEL_CONNECTION__REQUEST_TIMEOUT_MS=500`)

use crate::connection::ConnectionOptions;
use crate::transport::DEFAULT_MAX_FRAME_BYTES;
use crate::validation::{DomainProfile, ValidationOptions};
use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const ENV_PREFIX: &str = "ACP_SENTINEL_";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {source}")]
    ParseError { source: Box<figment::Error> },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Unsupported configuration file format: {format}")]
    UnsupportedFormat { format: String },
}

impl From<figment::Error> for ConfigError {
    fn from(error: figment::Error) -> Self {
        ConfigError::ParseError {
            source: Box::new(error),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Per-request wait bound in milliseconds; unset waits forever
    pub request_timeout_ms: Option<u64>,
    pub enforce_protocol: bool,
}

impl ConnectionConfig {
    pub fn options(&self) -> ConnectionOptions {
        ConnectionOptions {
            request_timeout: self.request_timeout_ms.map(Duration::from_millis),
            enforce_protocol: self.enforce_protocol,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub stop_on_first_error: bool,
    pub domain_profile: Option<DomainProfile>,
}

impl ValidationConfig {
    pub fn options(&self) -> ValidationOptions {
        ValidationOptions {
            stop_on_first_error: self.stop_on_first_error,
            domain_profile: self.domain_profile.clone(),
            eval_profile: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub max_frame_bytes: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentinelConfig {
    pub connection: ConnectionConfig,
    pub validation: ValidationConfig,
    pub transport: TransportConfig,
}

impl SentinelConfig {
    /// Defaults overridden by the environment
    pub fn load() -> ConfigResult<Self> {
        Self::extract(Self::figment(None)?)
    }

    /// Defaults, then `path`, then the environment
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        Self::extract(Self::figment(Some(path.as_ref()))?)
    }

    fn extract(figment: Figment) -> ConfigResult<Self> {
        let config: SentinelConfig = figment.extract()?;
        debug!("Loaded sentinel configuration: {:?}", config);
        Ok(config)
    }

    fn figment(path: Option<&Path>) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(SentinelConfig::default()));

        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::FileNotFound {
                    path: path.to_path_buf(),
                });
            }
            debug!("Loading config file: {}", path.display());
            figment = match path.extension().and_then(|ext| ext.to_str()) {
                Some("toml") => figment.merge(Toml::file(path)),
                Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
                Some("json") => figment.merge(Json::file(path)),
                other => {
                    return Err(ConfigError::UnsupportedFormat {
                        format: other.unwrap_or("").to_string(),
                    })
                }
            };
        }

        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::MetadataPolicy;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    fn clear_env() {
        for (key, _) in std::env::vars() {
            if key.starts_with(ENV_PREFIX) {
                std::env::remove_var(key);
            }
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        let config = SentinelConfig::load().unwrap();
        assert_eq!(config, SentinelConfig::default());
        assert_eq!(config.transport.max_frame_bytes, DEFAULT_MAX_FRAME_BYTES);
        assert_eq!(config.connection.options(), ConnectionOptions::default());
    }

    #[test]
    #[serial]
    fn test_toml_file_overrides_defaults() {
        clear_env();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sentinel.toml");
        fs::write(
            &path,
            r#"
[connection]
request_timeout_ms = 250
enforce_protocol = true

[validation]
stop_on_first_error = true

[validation.domain_profile]
metadata = "disallow"
max_message_bytes = 4096
"#,
        )
        .unwrap();

        let config = SentinelConfig::load_from(&path).unwrap();
        let options = config.connection.options();
        assert_eq!(options.request_timeout, Some(Duration::from_millis(250)));
        assert!(options.enforce_protocol);

        let validation = config.validation.options();
        assert!(validation.stop_on_first_error);
        assert_eq!(
            validation.domain_profile,
            Some(DomainProfile::new(MetadataPolicy::Disallow).with_max_message_bytes(4096))
        );
    }

    #[test]
    #[serial]
    fn test_yaml_and_json_files() {
        clear_env();
        let dir = TempDir::new().unwrap();

        let yaml = dir.path().join("sentinel.yaml");
        fs::write(
            &yaml,
            "validation:\n  domain_profile:\n    metadata:\n      allow_kinds: [\"_zed/diagram\"]\n",
        )
        .unwrap();
        let config = SentinelConfig::load_from(&yaml).unwrap();
        assert_eq!(
            config.validation.domain_profile.map(|p| p.metadata),
            Some(MetadataPolicy::AllowKinds(vec!["_zed/diagram".to_string()]))
        );

        let json = dir.path().join("sentinel.json");
        fs::write(&json, r#"{"transport": {"max_frame_bytes": 1024}}"#).unwrap();
        let config = SentinelConfig::load_from(&json).unwrap();
        assert_eq!(config.transport.max_frame_bytes, 1024);
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        clear_env();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sentinel.toml");
        fs::write(&path, "[connection]\nrequest_timeout_ms = 250\n").unwrap();

        std::env::set_var("ACP_SENTINEL_CONNECTION__REQUEST_TIMEOUT_MS", "75");
        std::env::set_var("ACP_SENTINEL_TRANSPORT__MAX_FRAME_BYTES", "2048");
        let config = SentinelConfig::load_from(&path);
        clear_env();

        let config = config.unwrap();
        assert_eq!(config.connection.request_timeout_ms, Some(75));
        assert_eq!(config.transport.max_frame_bytes, 2048);
    }

    #[test]
    #[serial]
    fn test_bad_paths() {
        clear_env();
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            SentinelConfig::load_from(dir.path().join("missing.toml")),
            Err(ConfigError::FileNotFound { .. })
        ));

        let ini = dir.path().join("sentinel.ini");
        fs::write(&ini, "x=1").unwrap();
        assert!(matches!(
            SentinelConfig::load_from(&ini),
            Err(ConfigError::UnsupportedFormat { format }) if format == "ini"
        ));

        let broken = dir.path().join("sentinel.json");
        fs::write(&broken, r#"{"transport": {"max_frame_bytes": "lots"}}"#).unwrap();
        assert!(matches!(
            SentinelConfig::load_from(&broken),
            Err(ConfigError::ParseError { .. })
        ));
    }
}
