//! Layered service configuration
//!
//! Sources, lowest precedence first: built-in defaults, an optional config
//! file (TOML, YAML or JSON by extension), then `HELPDESK__SECTION__KEY`
//! environment variables.

use crate::error::{HelpdeskError, Result};
use crate::lifecycle::SlaPolicy;
use chrono::Duration;
use config::{Config as ConfigLoader, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub sla: SlaConfig,
    pub verification: VerificationConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `sqlx` connection URL
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://helpdesk.db".to_string(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlaConfig {
    /// Days an admin-answered ticket may wait before the sweep closes it
    pub auto_close_after_days: i64,
}

impl Default for SlaConfig {
    fn default() -> Self {
        Self {
            auto_close_after_days: SlaPolicy::DEFAULT_DAYS,
        }
    }
}

impl SlaConfig {
    pub fn policy(&self) -> Result<SlaPolicy> {
        SlaPolicy::days(self.auto_close_after_days)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    pub code_ttl_secs: i64,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self { code_ttl_secs: 300 }
    }
}

impl VerificationConfig {
    /// Code lifetime; must be positive
    pub fn code_ttl(&self) -> Result<Duration> {
        if self.code_ttl_secs <= 0 {
            return Err(HelpdeskError::Validation(format!(
                "verification code_ttl_secs must be positive, got {}",
                self.code_ttl_secs
            )));
        }
        Duration::try_seconds(self.code_ttl_secs).ok_or_else(|| {
            HelpdeskError::Validation(format!(
                "verification code_ttl_secs of {} is out of range",
                self.code_ttl_secs
            ))
        })
    }
}

impl Config {
    /// Load configuration from defaults, an optional file and the environment
    ///
    /// With no explicit path, `helpdesk.{toml,yaml,json}` in the platform
    /// config directory is used when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ConfigLoader::builder();

        match path {
            Some(path) => {
                debug!("Loading configuration from {}", path.display());
                builder = builder.add_source(File::from(path));
            },
            None => {
                if let Some(default) = default_config_base() {
                    builder = builder.add_source(File::from(default).required(false));
                }
            },
        }

        let loaded = builder
            .add_source(
                Environment::with_prefix("HELPDESK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Self>()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Reject values the services cannot run with
    pub fn validate(&self) -> Result<()> {
        self.sla.policy()?;
        self.verification.code_ttl()?;
        Ok(())
    }
}

/// `<config dir>/helpdesk`, without extension so any supported format matches
fn default_config_base() -> Option<PathBuf> {
    ProjectDirs::from("", "", "helpdesk").map(|dirs| dirs.config_dir().join("helpdesk"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.address(), "127.0.0.1:8080");
        assert_eq!(config.sla.auto_close_after_days, 7);
        assert_eq!(config.verification.code_ttl_secs, 300);
    }

    #[test]
    #[serial]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("helpdesk.toml");
        std::fs::write(
            &path,
            "[server]\nport = 9090\n\n[sla]\nauto_close_after_days = 3\n",
        )
        .unwrap();

        let config = Config::load(Some(path.as_path())).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.sla.auto_close_after_days, 3);
    }

    #[test]
    #[serial]
    fn test_environment_overrides_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("helpdesk.yaml");
        std::fs::write(&path, "database:\n  url: sqlite://from-file.db\n").unwrap();

        // SAFETY: serialized test, no other thread reads the environment
        unsafe { std::env::set_var("HELPDESK__DATABASE__URL", "sqlite://from-env.db") };
        let config = Config::load(Some(path.as_path()));
        unsafe { std::env::remove_var("HELPDESK__DATABASE__URL") };

        assert_eq!(config.unwrap().database.url, "sqlite://from-env.db");
    }

    #[test]
    #[serial]
    fn test_missing_explicit_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(Config::load(Some(dir.path().join("absent.toml").as_path())).is_err());
    }

    #[test]
    #[serial]
    fn test_load_rejects_out_of_range_sla_window() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("helpdesk.toml");
        for days in ["-3", "200000000000"] {
            std::fs::write(&path, format!("[sla]\nauto_close_after_days = {days}\n")).unwrap();
            let err = Config::load(Some(path.as_path())).unwrap_err();
            assert!(matches!(err, HelpdeskError::Validation(_)), "{days}: {err}");
        }
    }

    #[test]
    fn test_validate_checks_code_ttl() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.verification.code_ttl().unwrap(), Duration::seconds(300));

        config.verification.code_ttl_secs = 0;
        assert!(config.validate().is_err());

        config.verification.code_ttl_secs = i64::MAX;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }
}
