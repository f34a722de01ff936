//! CLI command handlers, one file per command.

mod config;
mod get;
mod inspect;
mod key;

pub use config::run_config;
pub use get::run_get;
pub use inspect::run_inspect;
pub use key::run_key;

use anyhow::{Context, Result};
use url::Url;

pub(crate) fn parse_uri(uri: &str) -> Result<Url> {
    Url::parse(uri).with_context(|| format!("invalid URI: {uri}"))
}
