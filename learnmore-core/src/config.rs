//! Configuration management

use crate::error::{ErrorContext, LearnMoreError, LearnMoreResult};
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration for LearnMore services
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnMoreConfig {
    pub database: DatabaseConfig,
    pub metering: MeteringConfig,
    pub tutor: TutorConfig,
    pub logging: LoggingConfig,
}

/// Account database settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlx connection URL
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        let path = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("learnmore")
            .join("learnmore.db");
        Self {
            url: format!("sqlite://{}?mode=rwc", path.display()),
            max_connections: 5,
        }
    }
}

/// AI token metering settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeteringConfig {
    /// Balance given to newly created accounts
    pub starting_balance: i64,
}

impl Default for MeteringConfig {
    fn default() -> Self {
        Self {
            starting_balance: 5,
        }
    }
}

/// Generative-AI tutor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TutorConfig {
    pub model: String,
    /// Base URL of the Gemini REST API
    pub endpoint: String,
    pub temperature: f32,
    pub timeout_ms: u64,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
}

impl Default for TutorConfig {
    fn default() -> Self {
        Self {
            model: "gemini-1.5-flash".to_string(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            temperature: 0.7,
            timeout_ms: 30_000,
            api_key_env: "GEMINI_API_KEY".to_string(),
        }
    }
}

impl LearnMoreConfig {
    /// Default location of the configuration file
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("learnmore")
            .join("config.toml")
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> LearnMoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| LearnMoreError::Config {
            message: format!("Failed to read config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("read_file")
                .with_suggestion("Check if the config file exists and is readable"),
        })?;

        let config: LearnMoreConfig =
            toml::from_str(&content).map_err(|e| LearnMoreError::Config {
                message: format!("Failed to parse config: {}", e),
                source: Some(Box::new(e)),
                context: ErrorContext::new("config")
                    .with_operation("parse_toml")
                    .with_suggestion("Check TOML syntax in config file"),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file, creating parent directories
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> LearnMoreResult<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).map_err(|e| LearnMoreError::Config {
            message: format!("Failed to serialize config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config").with_operation("serialize_toml"),
        })?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content).map_err(|e| LearnMoreError::Config {
            message: format!("Failed to write config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("write_file")
                .with_suggestion("Check if the directory exists and is writable"),
        })?;

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> LearnMoreResult<()> {
        if self.database.url.trim().is_empty() {
            return Err(invalid("database.url must not be empty", "database.url"));
        }

        if self.database.max_connections == 0 {
            return Err(invalid(
                "database.max_connections must be greater than 0",
                "database.max_connections",
            ));
        }

        if self.metering.starting_balance < 0 {
            return Err(invalid(
                "metering.starting_balance must not be negative",
                "metering.starting_balance",
            ));
        }

        if !(0.0..=2.0).contains(&self.tutor.temperature) {
            return Err(invalid(
                "tutor.temperature must be between 0.0 and 2.0",
                "tutor.temperature",
            ));
        }

        if self.tutor.timeout_ms == 0 {
            return Err(invalid(
                "tutor.timeout_ms must be greater than 0",
                "tutor.timeout_ms",
            ));
        }

        Ok(())
    }
}

fn invalid(message: &str, field: &str) -> LearnMoreError {
    LearnMoreError::Config {
        message: message.to_string(),
        source: None,
        context: ErrorContext::new("config")
            .with_operation("validate")
            .with_metadata("field", field),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = LearnMoreConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tutor.model, "gemini-1.5-flash");
        assert!(config.database.url.starts_with("sqlite://"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: LearnMoreConfig = toml::from_str(
            r#"
            [metering]
            starting_balance = 20

            [logging]
            level = "debug"
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.metering.starting_balance, 20);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, crate::LogFormat::Json);
        assert_eq!(config.tutor.api_key_env, "GEMINI_API_KEY");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = LearnMoreConfig::default();
        config.metering.starting_balance = -1;
        assert!(matches!(
            config.validate(),
            Err(LearnMoreError::Config { .. })
        ));

        let mut config = LearnMoreConfig::default();
        config.tutor.temperature = 3.5;
        assert!(config.validate().is_err());

        let mut config = LearnMoreConfig::default();
        config.database.max_connections = 0;
        assert!(config.validate().is_err());
    }
}
