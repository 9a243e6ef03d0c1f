use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;
use thiserror::Error;

use mapstore::MapstoreConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("port cannot be 0")]
    InvalidPort,

    #[error("handler for status {status} references unknown status page {name:?}")]
    UnknownStatusPage { status: u16, name: String },
}

#[derive(Clone, Debug, Deserialize)]
pub struct Listener {
    pub host: String,
    pub port: u16,
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: "127.0.0.1".into(),
            port: 3000,
        }
    }
}

fn default_statsd_prefix() -> String {
    "urlographer".to_string()
}

#[derive(Clone, Debug, Deserialize)]
pub struct StatsdConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_statsd_prefix")]
    pub prefix: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SnapshotConfig {
    pub base_dir: String,
    pub filename: String,
}

/// Service configuration
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Main listener for incoming requests
    #[serde(default)]
    pub listener: Listener,

    /// Cache keying, cache lifetime, and index aliases
    #[serde(default)]
    pub mapstore: MapstoreConfig,

    /// Renderable views: name to the body the built-in renderer serves.
    /// The keys double as the registered view set for content map
    /// validation.
    #[serde(default)]
    pub views: IndexMap<String, String>,

    /// Named status pages addressable from `handlers`
    #[serde(default)]
    pub status_pages: HashMap<String, String>,

    /// Status code to status page name
    #[serde(default)]
    pub handlers: HashMap<u16, String>,

    /// Where the store snapshot lives; omit to keep the store in memory only
    #[serde(default)]
    pub snapshot: Option<SnapshotConfig>,

    /// StatsD metrics exporter; omit to run without metrics
    #[serde(default)]
    pub statsd: Option<StatsdConfig>,

    /// YAML fixture loaded into an empty store at startup
    #[serde(default)]
    pub seed: Option<PathBuf>,

    /// Honor `X-Forwarded-Proto: https` from a TLS-terminating proxy when
    /// deciding whether a request arrived secure
    #[serde(default)]
    pub trust_forwarded_proto: bool,
}

impl Config {
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let file = File::open(path)?;
        let mut config: Config = serde_yaml::from_reader(file)?;
        config.mapstore.registered_views = config.views.keys().cloned().collect();
        config.validate()?;
        Ok(config)
    }

    /// Validates the service configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listener.port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        for (status, name) in &self.handlers {
            if !self.status_pages.contains_key(name) {
                return Err(ConfigError::UnknownStatusPage {
                    status: *status,
                    name: name.clone(),
                });
            }
        }
        Ok(())
    }
}
