//! `refcache inspect <uri>` – show the stored record for a URI without fetching.

use anyhow::{Context, Result};
use refcache_core::config::CacheConfig;
use refcache_core::freshness::{age_at, format_age, FreshnessPolicy};
use refcache_core::key::CacheKey;
use refcache_core::record::Status;
use refcache_core::store::CacheStore;
use refcache_core::TracingSink;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;
use url::Url;

use super::parse_uri;

#[derive(Debug, Serialize)]
pub(crate) struct EntryReport {
    pub key: String,
    pub path: PathBuf,
    pub status_code: u32,
    pub status: &'static str,
    pub validator: Option<String>,
    pub location: Option<String>,
    pub payload_len: Option<u64>,
    pub age_secs: u64,
    pub fresh: bool,
}

pub fn run_inspect(cfg: &CacheConfig, uri: &str, json: bool) -> Result<()> {
    let url = parse_uri(uri)?;
    let store = CacheStore::from_config(cfg, Arc::new(TracingSink));
    let policy = FreshnessPolicy::from_config(&cfg.freshness);
    let report = entry_report(&store, &policy, &url, SystemTime::now())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    match report {
        Some(r) => {
            println!("key:       {}", r.key);
            println!("path:      {}", r.path.display());
            println!("status:    {} ({})", r.status_code, r.status);
            if let Some(v) = &r.validator {
                println!("validator: {v}");
            }
            if let Some(l) = &r.location {
                println!("location:  {l}");
            }
            if let Some(n) = r.payload_len {
                println!("payload:   {n} bytes");
            }
            println!(
                "age:       {}{}",
                format_age(std::time::Duration::from_secs(r.age_secs)),
                if r.fresh { " (fresh)" } else { " (expired)" }
            );
        }
        None => {
            println!("no entry for {uri}");
            let legacy = store.legacy_path(&url);
            if legacy.exists() {
                println!("legacy entry: {}", legacy.display());
            }
        }
    }
    Ok(())
}

pub(crate) fn entry_report(
    store: &CacheStore,
    policy: &FreshnessPolicy,
    url: &Url,
    now: SystemTime,
) -> Result<Option<EntryReport>> {
    let stored = store
        .load_meta(url)
        .with_context(|| format!("read cache entry for {url}"))?;
    let Some(stored) = stored else {
        return Ok(None);
    };
    let age = age_at(stored.modified, now);
    let status = stored.meta.status;
    Ok(Some(EntryReport {
        key: CacheKey::from_url(url).as_str().to_string(),
        path: stored.path,
        status_code: status.code(),
        status: status_kind(status),
        validator: stored.meta.validator,
        location: stored.meta.location,
        payload_len: stored.meta.payload_len,
        age_secs: age.as_secs(),
        fresh: policy.is_fresh(status, age),
    }))
}

fn status_kind(status: Status) -> &'static str {
    match status {
        Status::Success => "success",
        Status::Redirect(_) if status.is_permanent_redirect() => "permanent redirect",
        Status::Redirect(_) => "temporary redirect",
        Status::NotFound => "not found",
        Status::Other(_) => "other",
    }
}
