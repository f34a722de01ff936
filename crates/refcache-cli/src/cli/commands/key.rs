//! `refcache key <uri>` – show where a URI is cached.

use anyhow::Result;
use refcache_core::config::CacheConfig;
use refcache_core::key::{CacheKey, RECORD_EXT};

use super::parse_uri;

pub fn run_key(cfg: &CacheConfig, uri: &str) -> Result<()> {
    let url = parse_uri(uri)?;
    let key = CacheKey::from_url(&url);
    println!("{}  {}", key, cfg.cache_dir.join(key.file_name(RECORD_EXT)).display());
    Ok(())
}
