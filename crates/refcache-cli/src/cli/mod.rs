//! CLI for the refcache reference cache.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use refcache_core::config::{self, CacheConfig};
use std::path::PathBuf;

use commands::{run_config, run_get, run_inspect, run_key};

/// Top-level CLI for the refcache reference cache.
#[derive(Debug, Parser)]
#[command(name = "refcache")]
#[command(about = "refcache: on-disk cache for externally referenced documents", long_about = None)]
pub struct Cli {
    /// Configuration file (default: ~/.config/refcache/config.toml, created if missing).
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Cache directory, overriding the configuration.
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Resolve a URI through the cache and write its content.
    Get {
        /// HTTP/HTTPS URI of the referenced document.
        uri: String,

        /// Write to this file instead of stdout.
        #[arg(long, short, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Show the cache entry stored for a URI.
    Inspect {
        uri: String,

        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the cache key and entry path for a URI.
    Key { uri: String },

    /// Print the effective configuration.
    Config,
}

impl Cli {
    pub fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = cli.load_config()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Get { uri, output } => run_get(&cfg, &uri, output.as_deref())?,
            CliCommand::Inspect { uri, json } => run_inspect(&cfg, &uri, json)?,
            CliCommand::Key { uri } => run_key(&cfg, &uri)?,
            CliCommand::Config => run_config(&cfg, cli.config.as_deref())?,
        }

        Ok(())
    }

    fn load_config(&self) -> Result<CacheConfig> {
        let mut cfg = match &self.config {
            Some(path) => config::load_from_path(path)?,
            None => config::load_or_init()?,
        };
        if let Some(dir) = &self.cache_dir {
            cfg.cache_dir = dir.clone();
        }
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests;
