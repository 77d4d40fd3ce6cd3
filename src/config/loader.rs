//! Configuration Loader
//!
//! Reads one configuration file, layers `ZENDB__SECTION__KEY` environment
//! overrides on top, validates the result and logs a masked copy.

use super::error::{ConfigResult, ConfigurationError};
use super::ZendbConfig;
use config::{Config, Environment, File, FileFormat};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const ENV_PREFIX: &str = "ZENDB";
const ENV_SEPARATOR: &str = "__";

/// Owns the validated configuration for the lifetime of the process
#[derive(Debug)]
pub struct ConfigManager {
    config: ZendbConfig,
    source: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration from `path` plus environment overrides
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Arc<ConfigManager>> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigurationError::config_file_not_found(path));
        }

        debug!("Loading configuration from: {}", path.display());

        let config = Config::builder()
            .add_source(File::from(path))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator(ENV_SEPARATOR))
            .build()
            .and_then(|raw| raw.try_deserialize::<ZendbConfig>())
            .map_err(|e| ConfigurationError::parse_error(path.display().to_string(), e))?;

        Self::finish(config, Some(path.to_path_buf()))
    }

    /// Load configuration from an in-memory TOML document, without environment overrides
    pub fn from_toml_str(contents: &str) -> ConfigResult<Arc<ConfigManager>> {
        let config = Config::builder()
            .add_source(File::from_str(contents, FileFormat::Toml))
            .build()
            .and_then(|raw| raw.try_deserialize::<ZendbConfig>())
            .map_err(|e| ConfigurationError::parse_error("<inline>", e))?;

        Self::finish(config, None)
    }

    /// Wrap an already-built configuration, e.g. one assembled by tests
    pub fn from_config(config: ZendbConfig) -> ConfigResult<Arc<ConfigManager>> {
        Self::finish(config, None)
    }

    fn finish(config: ZendbConfig, source: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;

        let sanitized = Self::sanitize_config_for_logging(&config);
        debug!(
            "Configuration loaded successfully: {}",
            serde_json::to_string_pretty(&sanitized)
                .unwrap_or_else(|_| "[serialization error]".to_string())
        );
        info!(
            subdomain = %config.zendesk.subdomain,
            workers = config.dispatcher.workers,
            queue_capacity = config.dispatcher.queue_capacity,
            max_connections = config.database.max_connections,
            "⚙️ Configuration ready"
        );

        Ok(Arc::new(ConfigManager { config, source }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &ZendbConfig {
        &self.config
    }

    /// File the configuration was read from, if any
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Configuration as JSON with credentials masked
    pub fn debug_config(&self) -> serde_json::Value {
        Self::sanitize_config_for_logging(&self.config)
    }

    fn sanitize_config_for_logging(config: &ZendbConfig) -> serde_json::Value {
        let mut config_json = serde_json::json!(config);
        let sensitive_patterns = ["password", "secret", "token", "user", "url"];
        Self::mask_sensitive(&mut config_json, &sensitive_patterns);
        config_json
    }

    fn mask_sensitive(value: &mut serde_json::Value, sensitive_patterns: &[&str]) {
        match value {
            serde_json::Value::Object(map) => {
                for (key, val) in map.iter_mut() {
                    let key_lower = key.to_lowercase();
                    let is_sensitive = sensitive_patterns
                        .iter()
                        .any(|pattern| key_lower.contains(pattern));

                    if !is_sensitive {
                        Self::mask_sensitive(val, sensitive_patterns);
                        continue;
                    }

                    *val = match val {
                        serde_json::Value::String(s) if s.is_empty() => {
                            serde_json::Value::String("[EMPTY]".to_string())
                        }
                        serde_json::Value::String(s) => {
                            let chars: Vec<char> = s.chars().collect();
                            let masked = if chars.len() > 4 {
                                let head: String = chars[..2].iter().collect();
                                let tail: String = chars[chars.len() - 2..].iter().collect();
                                format!("{head}***{tail}")
                            } else {
                                "***".to_string()
                            };
                            serde_json::Value::String(format!("[MASKED: {masked}]"))
                        }
                        serde_json::Value::Null => serde_json::Value::Null,
                        _ => serde_json::Value::String("[MASKED]".to_string()),
                    };
                }
            }
            serde_json::Value::Array(arr) => {
                for item in arr.iter_mut() {
                    Self::mask_sensitive(item, sensitive_patterns);
                }
            }
            _ => {}
        }
    }
}
