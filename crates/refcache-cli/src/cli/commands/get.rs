//! `refcache get <uri>` – resolve through the cache and write the content.

use anyhow::{bail, Context, Result};
use refcache_core::config::CacheConfig;
use refcache_core::{CachingResolver, Lookup, TracingSink};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

pub fn run_get(cfg: &CacheConfig, uri: &str, output: Option<&Path>) -> Result<()> {
    let resolver = CachingResolver::from_config(cfg, Arc::new(TracingSink));
    let bytes = match resolver.lookup(uri) {
        Lookup::Found(bytes) => bytes,
        Lookup::NotHandled => bail!(
            "{uri} is not cached: only http(s) URIs whose path contains {:?} are handled",
            cfg.include_marker
        ),
        Lookup::NotResolvable => bail!("could not resolve {uri}"),
    };

    match output {
        Some(path) => {
            std::fs::write(path, &bytes).with_context(|| format!("write {}", path.display()))?;
            tracing::debug!(path = %path.display(), bytes = bytes.len(), "wrote resolved content");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&bytes).context("write to stdout")?;
            stdout.flush()?;
        }
    }
    Ok(())
}
