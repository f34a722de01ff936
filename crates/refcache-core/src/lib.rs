pub mod config;
pub mod logging;

pub mod diagnostics;
pub mod fetch;
pub mod freshness;
pub mod http;
pub mod key;
pub mod record;
pub mod resolver;
pub mod store;

#[cfg(test)]
mod testutil;

pub use diagnostics::{Diagnostic, DiagnosticSink, MemorySink, TracingSink};
pub use resolver::{CachingResolver, EntityResolver, InputSource, Lookup, Resolution};
