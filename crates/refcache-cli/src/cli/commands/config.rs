//! `refcache config` – print the effective configuration.

use anyhow::Result;
use refcache_core::config::{self, CacheConfig};
use std::path::Path;

pub fn run_config(cfg: &CacheConfig, explicit: Option<&Path>) -> Result<()> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => config::config_path()?,
    };
    println!("# {}", path.display());
    print!("{}", toml::to_string_pretty(cfg)?);
    Ok(())
}
