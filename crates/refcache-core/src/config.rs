use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory used when no cache directory is configured, relative to the working directory.
pub const DEFAULT_CACHE_DIR: &str = ".cachingXMLReferenceResolver";

/// Default inclusion marker: only URIs whose path contains it are cached.
pub const DEFAULT_INCLUDE_MARKER: &str = "reference.";

/// Default number of redirect hops followed before giving up.
pub const DEFAULT_REDIRECT_BUDGET: u32 = 5;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

/// Per-status freshness windows (optional `[freshness]` section in config.toml).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FreshnessConfig {
    /// Window for a cached 200 response.
    pub success_secs: u64,
    /// Window for a cached 301/308.
    pub permanent_redirect_secs: u64,
    /// Window for a cached 302/307.
    pub temporary_redirect_secs: u64,
    /// Window for a cached 404.
    pub not_found_secs: u64,
}

impl Default for FreshnessConfig {
    fn default() -> Self {
        Self {
            success_secs: DAY,
            permanent_redirect_secs: 28 * DAY,
            temporary_redirect_secs: DAY,
            not_found_secs: 15 * MINUTE,
        }
    }
}

/// Configuration for one reference cache, loaded from `~/.config/refcache/config.toml`.
///
/// Every field has a default, so a partial (or empty) file is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding one record file per cached URI. Created on demand.
    pub cache_dir: PathBuf,
    /// Maximum number of redirect hops followed per resolve.
    pub redirect_budget: u32,
    /// Only URIs whose path contains this substring are cached. Empty admits everything.
    pub include_marker: String,
    /// Connect timeout for the fetch, in milliseconds.
    pub connect_timeout_ms: u64,
    /// `User-Agent` sent with every request.
    pub user_agent: String,
    /// Serve bare-payload `<key>.xml` files written by older versions when no record exists.
    pub read_legacy: bool,
    pub freshness: FreshnessConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            redirect_budget: DEFAULT_REDIRECT_BUDGET,
            include_marker: DEFAULT_INCLUDE_MARKER.to_string(),
            connect_timeout_ms: 2000,
            user_agent: concat!("refcache/", env!("CARGO_PKG_VERSION")).to_string(),
            read_legacy: true,
            freshness: FreshnessConfig::default(),
        }
    }
}

impl CacheConfig {
    /// Default configuration rooted at `cache_dir`.
    pub fn with_cache_dir(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            ..Self::default()
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("refcache")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<CacheConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = CacheConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    load_from_path(&path)
}

/// Load configuration from an explicit file. The file must exist.
pub fn load_from_path(path: &Path) -> Result<CacheConfig> {
    let data =
        fs::read_to_string(path).with_context(|| format!("read config: {}", path.display()))?;
    let cfg: CacheConfig =
        toml::from_str(&data).with_context(|| format!("parse config: {}", path.display()))?;
    Ok(cfg)
}
