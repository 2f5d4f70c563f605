//! `fieldkit.toml` configuration.
//!
//! # Example
//!
//! ```toml
//! agronomist_id = "ag-7"
//! store_path = "/var/lib/fieldkit/store.json"
//!
//! [location]
//! timeout_ms = 10000
//! maximum_age_ms = 0
//! high_accuracy = true
//!
//! [router]
//! default = "dashboard"
//!
//! [[router.sections]]
//! prefix = "task"
//! section = "tasks"
//! ```
//!
//! Every key is optional. `FIELDKIT_AGRONOMIST` and `FIELDKIT_STORE` override
//! the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use fieldkit_visit::{LocationPolicy, RouteError, Router};
use serde::Deserialize;

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "fieldkit.toml";
pub const DEFAULT_STORE_FILE: &str = "fieldkit-store.json";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub agronomist_id: Option<String>,
    pub store_path: PathBuf,
    pub location: LocationConfig,
    pub router: RouterConfig,
}

/// `[location]`: the geolocation read policy.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LocationConfig {
    pub timeout_ms: u64,
    pub maximum_age_ms: u64,
    pub high_accuracy: bool,
}

/// `[router]`: fragment prefixes and the sections they show.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RouterConfig {
    pub default: String,
    pub sections: Vec<SectionConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SectionConfig {
    pub prefix: String,
    pub section: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            agronomist_id: None,
            store_path: PathBuf::from(DEFAULT_STORE_FILE),
            location: LocationConfig::default(),
            router: RouterConfig::default(),
        }
    }
}

impl Default for LocationConfig {
    fn default() -> Self {
        let policy = LocationPolicy::default();
        Self {
            timeout_ms: policy.timeout.as_millis() as u64,
            maximum_age_ms: policy.maximum_age.as_millis() as u64,
            high_accuracy: policy.high_accuracy,
        }
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        let section = |prefix: &str, section: &str| SectionConfig {
            prefix: prefix.to_string(),
            section: section.to_string(),
        };
        Self {
            default: "dashboard".to_string(),
            sections: vec![
                section("dashboard", "dashboard"),
                section("clients", "clients"),
                section("properties", "properties"),
                section("visit", "visit"),
                section("visits", "visit"),
                section("task", "tasks"),
                section("tasks", "tasks"),
                section("activities", "activities"),
            ],
        }
    }
}

impl LocationConfig {
    pub fn policy(&self) -> LocationPolicy {
        LocationPolicy {
            timeout: Duration::from_millis(self.timeout_ms),
            maximum_age: Duration::from_millis(self.maximum_age_ms),
            high_accuracy: self.high_accuracy,
        }
    }
}

impl RouterConfig {
    pub fn build(&self) -> Result<Router, RouteError> {
        self.sections
            .iter()
            .fold(Router::builder(), |builder, s| {
                builder.section(&s.prefix, &s.section)
            })
            .default_section(&self.default)
            .build()
    }
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, `fieldkit.toml` in the
    /// working directory is read if present, otherwise defaults are used.
    /// Environment overrides are applied last.
    pub fn load(explicit: Option<&Path>) -> Result<Self, String> {
        let mut config = match explicit {
            Some(path) => Self::read(path)?,
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::read(path)?
                } else {
                    tracing::debug!("no {DEFAULT_CONFIG_FILE} found, using defaults");
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Read and parse a config file.
    pub fn read(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("could not read '{}': {}", path.display(), e))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| format!("could not parse '{}': {}", path.display(), e))?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Override file values with `FIELDKIT_AGRONOMIST` / `FIELDKIT_STORE`.
    /// Blank values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        if let Some(agronomist) = var("FIELDKIT_AGRONOMIST") {
            tracing::info!(agronomist_id = %agronomist, "agronomist taken from FIELDKIT_AGRONOMIST");
            self.agronomist_id = Some(agronomist);
        }
        if let Some(store) = var("FIELDKIT_STORE") {
            tracing::info!(store_path = %store, "store taken from FIELDKIT_STORE");
            self.store_path = PathBuf::from(store);
        }
    }

    /// The configured agronomist, required by every command that writes.
    pub fn agronomist(&self) -> Result<&str, String> {
        self.agronomist_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                "no agronomist configured (set agronomist_id in fieldkit.toml or FIELDKIT_AGRONOMIST)"
                    .to_string()
            })
    }
}
