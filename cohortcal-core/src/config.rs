//! Global cohortcal configuration.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ConfigError, ConfigResult};
use crate::export::{DEFAULT_PRODUCT_ID, ExportSettings};

static DEFAULT_DATABASE: &str = "~/.local/share/cohortcal/cohortcal.db";
static DEFAULT_CACHE_DIR: &str = "~/.cache/cohortcal/exports";
static DEFAULT_TIMEZONE: &str = "Europe/Paris";
static DEFAULT_BIND: &str = "127.0.0.1:4097";

/// Prefix for environment overrides, e.g. `COHORTCAL_CACHE_DIR`.
pub const ENV_PREFIX: &str = "COHORTCAL";

fn default_database() -> PathBuf {
    PathBuf::from(DEFAULT_DATABASE)
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(DEFAULT_CACHE_DIR)
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_product_id() -> String {
    DEFAULT_PRODUCT_ID.to_string()
}

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:5173".to_string(),
        "http://127.0.0.1:5173".to_string(),
    ]
}

/// Configuration at ~/.config/cohortcal/config.toml, overridable through
/// `COHORTCAL_*` environment variables.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CohortcalConfig {
    #[serde(default = "default_database")]
    pub database: PathBuf,

    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// IANA zone the stored wall-clock times belong to
    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default = "default_product_id")]
    pub product_id: String,

    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CohortcalConfig {
    fn default() -> Self {
        CohortcalConfig {
            database: default_database(),
            cache_dir: default_cache_dir(),
            timezone: default_timezone(),
            product_id: default_product_id(),
            bind: default_bind(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

impl CohortcalConfig {
    pub fn config_path() -> ConfigResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ConfigError::Load("Could not determine config directory".into()))?
            .join("cohortcal");

        Ok(config_dir.join("config.toml"))
    }

    /// Load from the default location, creating a commented default file on
    /// first use.
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            Self::create_default_config(path)?;
            info!(path = %path.display(), "created default config");
        }

        let config: CohortcalConfig = Config::builder()
            .add_source(
                File::from(path.to_path_buf())
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("allowed_origins"),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> ConfigResult<()> {
        self.tz()?;
        self.bind_addr()?;
        Ok(())
    }

    /// Save the current config to `path`.
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Load(e.to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Create a default config file with all options commented out.
    pub fn create_default_config(path: &Path) -> ConfigResult<()> {
        let contents = format!(
            "\
# cohortcal configuration
# Every option can also be set with a COHORTCAL_<OPTION> environment variable.

# SQLite database holding events, rooms and cohorts:
# database = \"{}\"

# Where generated exports and their cache records live:
# cache_dir = \"{}\"

# Timezone the schedule's wall-clock times are in:
# timezone = \"{}\"

# PRODID written into calendar exports:
# product_id = \"{}\"

# Address the HTTP server listens on:
# bind = \"{}\"

# Origins allowed to call the HTTP server from a browser:
# allowed_origins = [\"http://localhost:5173\", \"http://127.0.0.1:5173\"]
",
            DEFAULT_DATABASE, DEFAULT_CACHE_DIR, DEFAULT_TIMEZONE, DEFAULT_PRODUCT_ID, DEFAULT_BIND
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;

        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        expand(&self.database)
    }

    pub fn cache_path(&self) -> PathBuf {
        expand(&self.cache_dir)
    }

    pub fn tz(&self) -> ConfigResult<Tz> {
        self.timezone
            .parse()
            .map_err(|_| ConfigError::Timezone(self.timezone.clone()))
    }

    pub fn bind_addr(&self) -> ConfigResult<SocketAddr> {
        self.bind
            .parse()
            .map_err(|_| ConfigError::Bind(self.bind.clone()))
    }

    pub fn export_settings(&self) -> ConfigResult<ExportSettings> {
        Ok(ExportSettings {
            timezone: self.tz()?,
            product_id: self.product_id.clone(),
        })
    }
}

fn expand(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_load_writes_commented_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cohortcal").join("config.toml");

        let config = CohortcalConfig::load_from(&path).unwrap();

        assert!(path.exists());
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("# timezone = \"Europe/Paris\""));
        assert_eq!(config.timezone, "Europe/Paris");
        assert_eq!(config.bind, "127.0.0.1:4097");
        assert_eq!(config.allowed_origins.len(), 2);
    }

    #[test]
    fn test_file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "cache_dir = \"/srv/exports\"\ntimezone = \"America/Montreal\"\n",
        )
        .unwrap();

        let config = CohortcalConfig::load_from(&path).unwrap();
        assert_eq!(config.cache_path(), PathBuf::from("/srv/exports"));
        assert_eq!(config.tz().unwrap(), chrono_tz::America::Montreal);
        assert_eq!(config.database, default_database());
    }

    #[test]
    fn test_bad_timezone_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "timezone = \"Mars/Olympus\"\n").unwrap();

        assert!(matches!(
            CohortcalConfig::load_from(&path),
            Err(ConfigError::Timezone(_))
        ));
    }

    #[test]
    fn test_tilde_is_expanded() {
        let config = CohortcalConfig::default();
        assert!(!config.database_path().to_string_lossy().starts_with('~'));
    }

    #[test]
    fn test_save_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let config = CohortcalConfig {
            bind: "0.0.0.0:8080".to_string(),
            ..Default::default()
        };

        config.save_to(&path).unwrap();
        assert_eq!(CohortcalConfig::load_from(&path).unwrap(), config);
    }
}
