//! Configuration management

use crate::error::{ContechError, ContechResult, ErrorContext};
use crate::logging::LoggingConfig;
use crate::types::{ContechConfig, IdentityServiceConfig, StorageConfig};

use std::path::{Path, PathBuf};

/// Key under which the credential token is persisted
pub const DEFAULT_TOKEN_KEY: &str = "auth_token";

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api/v1";

/// Environment variable overriding `identity.base_url`
pub const BASE_URL_ENV: &str = "CONTECH_API_URL";

impl Default for ContechConfig {
    fn default() -> Self {
        Self {
            identity: IdentityServiceConfig {
                base_url: DEFAULT_BASE_URL.to_string(),
                timeout_seconds: 30,
                user_agent: format!("contech/{}", env!("CARGO_PKG_VERSION")),
            },
            storage: StorageConfig {
                data_dir: "~/.contech".to_string(),
                token_key: DEFAULT_TOKEN_KEY.to_string(),
            },
            logging: LoggingConfig::default(),
        }
    }
}

impl ContechConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> ContechResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ContechError::Config {
            message: format!("Failed to read config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("read_file")
                .with_hint("Check if the config file exists and is readable"),
        })?;

        let config: ContechConfig = toml::from_str(&content).map_err(|e| ContechError::Config {
            message: format!("Failed to parse config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("parse_toml")
                .with_hint("Check TOML syntax in config file"),
        })?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> ContechResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ContechError::Config {
            message: format!("Failed to serialize config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config").with_operation("serialize_toml"),
        })?;

        std::fs::write(path, content).map_err(|e| ContechError::Config {
            message: format!("Failed to write config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("write_file")
                .with_hint("Check if the directory exists and is writable"),
        })?;

        Ok(())
    }

    /// Apply `CONTECH_API_URL` if it is set and non-empty
    pub fn apply_env_overrides(&mut self) {
        if let Ok(base_url) = std::env::var(BASE_URL_ENV) {
            let base_url = base_url.trim();
            if !base_url.is_empty() {
                self.identity.base_url = base_url.to_string();
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> ContechResult<()> {
        if let Err(e) = url::Url::parse(&self.identity.base_url) {
            return Err(ContechError::Config {
                message: format!("Invalid identity.base_url '{}': {}", self.identity.base_url, e),
                source: Some(Box::new(e)),
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_hint("Use an absolute URL such as http://localhost:8000/api/v1"),
            });
        }

        if self.identity.timeout_seconds == 0 {
            return Err(ContechError::Config {
                message: "identity.timeout_seconds must be greater than 0".to_string(),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_hint("Set identity.timeout_seconds to a positive value"),
            });
        }

        if self.storage.token_key.trim().is_empty() {
            return Err(crate::validation_error!(
                "Token key must not be empty",
                "storage.token_key",
                "config"
            ));
        }

        Ok(())
    }

    /// Data directory with a leading `~` expanded to the home directory
    pub fn resolved_data_dir(&self) -> PathBuf {
        expand_home(&self.storage.data_dir)
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest.trim_start_matches(['/', '\\']));
        }
    }
    PathBuf::from(path)
}

/// Default config file locations, in lookup order
pub fn default_config_paths() -> Vec<PathBuf> {
    [
        dirs::config_dir().map(|d| d.join("contech").join("config.toml")),
        dirs::home_dir().map(|d| d.join(".contech").join("config.toml")),
        Some(PathBuf::from("contech.toml")),
    ]
    .into_iter()
    .flatten()
    .collect()
}
