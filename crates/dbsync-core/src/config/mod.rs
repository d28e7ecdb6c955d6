//! Optional JSON configuration for watched pairs and defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::policy::BuiltinPolicy;
use crate::util::resolve_path;

const CONFIG_FILE_NAME: &str = "config.json";

/// Environment variable overriding the analytics database location
pub const ANALYTICS_DB_ENV: &str = "DBSYNC_ANALYTICS_DB";

/// Analytics database location relative to the workspace root
pub const DEFAULT_ANALYTICS_DB: &str = "databases/analytics.db";

/// Polling interval used when neither flag nor config sets one
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    #[serde(default)]
    pub analytics_db: Option<PathBuf>,
    #[serde(default)]
    pub interval_secs: Option<f64>,
    #[serde(default)]
    pub policy: Option<BuiltinPolicy>,
    #[serde(default)]
    pub pairs: Vec<PairConfig>,
}

/// One watched pair
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PairConfig {
    pub a: PathBuf,
    pub b: PathBuf,
}

/// `<config_dir>/dbsync/config.json`, if the platform has a config directory
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("dbsync").join(CONFIG_FILE_NAME))
}

impl SyncConfig {
    /// Load the config at the default location; a missing file is an empty config.
    pub fn load() -> Result<Self> {
        match default_config_path() {
            Some(path) => Self::load_from_path(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let config = serde_json::from_str::<Self>(&raw).map_err(|error| {
            Error::Config(format!("Failed to parse {}: {}", path.display(), error))
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if let Some(secs) = self.interval_secs {
            if !secs.is_finite() || secs <= 0.0 {
                return Err(Error::Config(format!(
                    "interval_secs must be a positive number, got {secs}"
                )));
            }
        }
        Ok(())
    }

    /// Configured polling interval
    pub fn interval(&self) -> Option<Duration> {
        self.interval_secs
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }

    /// Configured pairs with relative paths resolved against `root`
    pub fn resolved_pairs(&self, root: &Path) -> Vec<(PathBuf, PathBuf)> {
        self.pairs
            .iter()
            .map(|pair| (resolve_path(root, &pair.a), resolve_path(root, &pair.b)))
            .collect()
    }
}

/// Pick the analytics database path: explicit value, then
/// `DBSYNC_ANALYTICS_DB`, then the config file, then the workspace default.
pub fn resolve_analytics_path(
    explicit: Option<&Path>,
    config: &SyncConfig,
    root: &Path,
) -> PathBuf {
    let from_env = crate::util::normalize_text_option(std::env::var(ANALYTICS_DB_ENV).ok())
        .map(PathBuf::from);
    let chosen = explicit
        .map(Path::to_path_buf)
        .or(from_env)
        .or_else(|| config.analytics_db.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ANALYTICS_DB));
    resolve_path(root, &chosen)
}
