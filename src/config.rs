//! Configuration management for Windowguard.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{LimiterError, Result};
use crate::ratelimit::RateLimiter;

/// Prefix for environment variable overrides, e.g. `WINDOWGUARD_LIMITER__LIMIT=50`.
pub const ENV_PREFIX: &str = "WINDOWGUARD";

/// Main configuration for the Windowguard demo driver.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Limiter policy
    #[serde(default)]
    pub limiter: LimiterConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Quota policy for one limiter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Maximum calls per window
    #[serde(default = "default_limit")]
    pub limit: u64,

    /// Window specification such as `10Min`
    #[serde(default = "default_window")]
    pub window: String,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            window: default_window(),
        }
    }
}

impl LimiterConfig {
    /// Build a limiter with this policy.
    pub fn build(&self) -> Result<RateLimiter> {
        RateLimiter::new(self.limit, &self.window)
    }
}

fn default_limit() -> u64 {
    100
}

fn default_window() -> String {
    "1Min".to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    #[serde(default = "default_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| LimiterError::Config(format!("Failed to parse configuration: {}", e)))
    }

    /// Load configuration from an optional YAML file, then apply
    /// `WINDOWGUARD_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    /// Like [`AppConfig::load`], reading overrides from `<prefix>_*` variables.
    pub fn load_with_prefix(path: Option<&Path>, prefix: &str) -> Result<Self> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(LimiterError::Config(format!(
                    "Configuration file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(
                ::config::File::from(path)
                    .format(::config::FileFormat::Yaml)
                    .required(true),
            );
        }

        builder
            .add_source(
                ::config::Environment::with_prefix(prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|settings| settings.try_deserialize())
            .map_err(|e| LimiterError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.limiter.limit, 100);
        assert_eq!(config.limiter.window, "1Min");
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
limiter:
  limit: 10
  window: 20Sec
logging:
  json: true
"#;
        let config = AppConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.limiter.limit, 10);
        assert_eq!(config.limiter.window, "20Sec");
        assert!(config.logging.json);
        assert_eq!(config.logging.level, "info");

        let limiter = config.limiter.build().unwrap();
        assert_eq!(limiter.limit(), 10);
        assert_eq!(limiter.window(), Duration::from_secs(20));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config = AppConfig::from_yaml("limiter:\n  window: 3Hrs\n").unwrap();
        assert_eq!(config.limiter.limit, 100);
        assert_eq!(config.limiter.window, "3Hrs");
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(matches!(
            AppConfig::from_yaml("limiter: [1, 2"),
            Err(LimiterError::Config(_))
        ));
    }

    #[test]
    fn test_build_rejects_bad_window() {
        let config = LimiterConfig {
            limit: 5,
            window: "5Weeks".to_string(),
        };
        assert!(matches!(config.build(), Err(LimiterError::Config(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let path = std::env::temp_dir().join("windowguard-does-not-exist.yaml");
        assert!(matches!(
            AppConfig::load(Some(&path)),
            Err(LimiterError::Config(_))
        ));
    }

    #[test]
    fn test_load_layers_file_and_env() {
        const PREFIX: &str = "WINDOWGUARD_LAYERS_TEST";

        let path = std::env::temp_dir().join(format!(
            "windowguard-config-{}.yaml",
            std::process::id()
        ));
        std::fs::write(&path, "limiter:\n  limit: 7\n  window: 10Min\n").unwrap();
        std::env::set_var("WINDOWGUARD_LAYERS_TEST_LOGGING__LEVEL", "debug");

        let config = AppConfig::load_with_prefix(Some(&path), PREFIX).unwrap();
        std::env::remove_var("WINDOWGUARD_LAYERS_TEST_LOGGING__LEVEL");
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.limiter.limit, 7);
        assert_eq!(config.limiter.window, "10Min");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = AppConfig::load_with_prefix(None, "WINDOWGUARD_DEFAULTS_TEST").unwrap();
        assert_eq!(config.limiter.limit, 100);
        assert_eq!(config.limiter.window, "1Min");
        assert_eq!(config.logging.level, "info");
    }
}
