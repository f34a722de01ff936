//! Single-line diagnostics emitted by the resolver, fetcher and store.
//!
//! Diagnostics are advisory. They go through a [`DiagnosticSink`] so callers
//! decide where they end up: [`TracingSink`] forwards them to `tracing`,
//! [`MemorySink`] keeps them for inspection in tests.

use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use crate::freshness::format_age;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// The system id could not be parsed as a URI.
    NotAUri { uri: String, reason: String },
    /// No usable record; a fetch follows.
    Miss { uri: String },
    /// A record exists but its freshness window has elapsed; a fetch follows.
    Expired { uri: String, age: Duration },
    /// An expired record was served because the fetch could not refresh it.
    ServedStale { uri: String, age: Duration },
    /// First record written for this URI.
    Created { uri: String },
    /// An existing record was replaced.
    Replaced { uri: String, previous_age: Duration },
    /// Server answered 304; the record's timestamp was refreshed.
    Revalidated { uri: String },
    /// A redirect was fetched or followed from the cache.
    Redirect { uri: String, code: u32, target: String },
    RedirectBudgetExhausted { uri: String },
    /// Fetch returned a status that is stored but never served.
    UnexpectedStatus { uri: String, code: u32 },
    /// The record container could not be read; treated as a miss.
    CorruptEntry { uri: String, error: String },
    /// Served from a bare-payload entry left by an older version.
    LegacyEntry { uri: String },
    FetchFailed { uri: String, error: String },
}

impl Diagnostic {
    /// Failures are logged at warn level by [`TracingSink`].
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Diagnostic::NotAUri { .. }
                | Diagnostic::RedirectBudgetExhausted { .. }
                | Diagnostic::UnexpectedStatus { .. }
                | Diagnostic::CorruptEntry { .. }
                | Diagnostic::FetchFailed { .. }
        )
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::NotAUri { uri, reason } => write!(f, "not a URI: {uri} ({reason})"),
            Diagnostic::Miss { uri } => write!(f, "no cache entry for {uri}"),
            Diagnostic::Expired { uri, age } => {
                write!(f, "entry for {uri} expired ({} old)", format_age(*age))
            }
            Diagnostic::ServedStale { uri, age } => {
                write!(f, "using old entry ({}) for {uri}", format_age(*age))
            }
            Diagnostic::Created { uri } => write!(f, "created entry for {uri}"),
            Diagnostic::Replaced { uri, previous_age } => write!(
                f,
                "replaced {} old entry for {uri}",
                format_age(*previous_age)
            ),
            Diagnostic::Revalidated { uri } => write!(f, "revalidated entry for {uri} (304)"),
            Diagnostic::Redirect { uri, code, target } => {
                write!(f, "GET on {uri} redirects with status code {code} to {target}")
            }
            Diagnostic::RedirectBudgetExhausted { uri } => {
                write!(f, "too many redirects resolving {uri}")
            }
            Diagnostic::UnexpectedStatus { uri, code } => {
                write!(f, "GET on {uri} failed with status code {code}")
            }
            Diagnostic::CorruptEntry { uri, error } => {
                write!(f, "ignoring unreadable entry for {uri}: {error}")
            }
            Diagnostic::LegacyEntry { uri } => write!(f, "using legacy entry for {uri}"),
            Diagnostic::FetchFailed { uri, error } => write!(f, "error for {uri} - {error}"),
        }
    }
}

/// Receives diagnostics. Implementations must not fail.
pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, diagnostic: Diagnostic);
}

/// Forwards diagnostics to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, diagnostic: Diagnostic) {
        if diagnostic.is_failure() {
            tracing::warn!(target: "refcache", "{}", diagnostic);
        } else {
            tracing::info!(target: "refcache", "{}", diagnostic);
        }
    }
}

/// Keeps every diagnostic in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<Diagnostic>>,
}

impl MemorySink {
    pub fn events(&self) -> Vec<Diagnostic> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Drops everything recorded so far.
    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl DiagnosticSink for MemorySink {
    fn emit(&self, diagnostic: Diagnostic) {
        if let Ok(mut events) = self.events.lock() {
            events.push(diagnostic);
        }
    }
}
