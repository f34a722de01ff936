//! Caching entity resolver.
//!
//! Decides per URI whether a cached record can be served, must be revalidated,
//! or must be fetched, and follows cached redirects up to a hop budget. The
//! decision runs as a bounded loop: each hop is evaluated, fetched at most
//! once, and re-evaluated with stale records allowed.

use std::sync::Arc;
use std::time::SystemTime;

use url::{ParseError, Url};

use crate::config::CacheConfig;
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::fetch::Fetcher;
use crate::freshness::{age_at, FreshnessPolicy};
use crate::http::{CurlTransport, Transport};
use crate::record::Status;
use crate::store::{CacheStore, StoredRecord};

/// Bytes resolved for an entity, with the identifiers the caller supplied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSource {
    /// Opaque public identifier, passed through unchanged.
    pub public_id: Option<String>,
    /// The system identifier that was requested.
    pub system_id: String,
    pub bytes: Vec<u8>,
}

/// Answer to an entity lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(InputSource),
    /// Outside the cache's scope; the caller should use its own resolution.
    NotHandled,
    /// In scope, but no content could be obtained.
    NotResolvable,
}

/// Resolves external entities referenced from a document.
pub trait EntityResolver {
    fn resolve_entity(&self, public_id: Option<&str>, system_id: &str) -> Resolution;
}

/// Result of [`CachingResolver::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(Vec<u8>),
    NotHandled,
    NotResolvable,
}

enum Step {
    Serve(Vec<u8>),
    Follow(String),
    Unavailable,
    Refresh,
}

pub struct CachingResolver<T = CurlTransport> {
    fetcher: Fetcher<T>,
    freshness: FreshnessPolicy,
    include_marker: String,
    redirect_budget: u32,
    sink: Arc<dyn DiagnosticSink>,
}

impl CachingResolver<CurlTransport> {
    pub fn from_config(cfg: &CacheConfig, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self::with_transport(cfg, CurlTransport::from_config(cfg), sink)
    }
}

impl<T: Transport> CachingResolver<T> {
    pub fn with_transport(cfg: &CacheConfig, transport: T, sink: Arc<dyn DiagnosticSink>) -> Self {
        let store = CacheStore::from_config(cfg, Arc::clone(&sink));
        Self {
            fetcher: Fetcher::new(transport, store, Arc::clone(&sink)),
            freshness: FreshnessPolicy::from_config(&cfg.freshness),
            include_marker: cfg.include_marker.clone(),
            redirect_budget: cfg.redirect_budget,
            sink,
        }
    }

    pub fn store(&self) -> &CacheStore {
        self.fetcher.store()
    }

    /// Resolve with the configured redirect budget, serving stale records only as a fallback.
    pub fn lookup(&self, uri: &str) -> Lookup {
        self.resolve(uri, false, self.redirect_budget)
    }

    /// Resolve `uri` through the cache.
    ///
    /// `allow_stale` serves expired Success/Redirect records without a fetch.
    /// `redirect_budget` bounds the number of cached redirects followed.
    pub fn resolve(&self, uri: &str, allow_stale: bool, redirect_budget: u32) -> Lookup {
        let Some(mut url) = self.eligible(uri) else {
            return Lookup::NotHandled;
        };
        let mut allow_stale = allow_stale;
        let mut budget = redirect_budget;
        let mut fetched = false;

        loop {
            let stored = self.store().load(&url);
            let had_record = stored.is_some();
            let validator = stored
                .as_ref()
                .filter(|s| s.record.status == Status::Success)
                .and_then(|s| s.record.validator.clone());

            if let Some(stored) = stored {
                match self.evaluate(&url, stored, allow_stale) {
                    Step::Serve(bytes) => return Lookup::Found(bytes),
                    Step::Unavailable => return Lookup::NotResolvable,
                    Step::Follow(location) => {
                        if budget == 0 {
                            self.sink.emit(Diagnostic::RedirectBudgetExhausted {
                                uri: uri.to_string(),
                            });
                            return Lookup::NotResolvable;
                        }
                        match self.redirect_target(&url, &location) {
                            Some(next) => {
                                url = next;
                                budget -= 1;
                                fetched = false;
                                continue;
                            }
                            None => return Lookup::NotResolvable,
                        }
                    }
                    Step::Refresh => {}
                }
            } else {
                self.sink.emit(Diagnostic::Miss {
                    uri: url.to_string(),
                });
            }

            // A record fetched in this hop that is still unusable will not get better.
            if fetched {
                return Lookup::NotResolvable;
            }
            fetched = true;

            match self.fetcher.fetch(&url, validator.as_deref()) {
                Ok(_) => allow_stale = true,
                Err(e) => {
                    self.sink.emit(Diagnostic::FetchFailed {
                        uri: url.to_string(),
                        error: e.to_string(),
                    });
                    if !had_record {
                        return Lookup::NotResolvable;
                    }
                    allow_stale = true;
                }
            }
        }
    }

    /// Parse `uri` and apply the scheme and inclusion filters.
    fn eligible(&self, uri: &str) -> Option<Url> {
        let url = match Url::parse(uri) {
            Ok(url) => url,
            Err(ParseError::RelativeUrlWithoutBase) => return None,
            Err(e) => {
                self.sink.emit(Diagnostic::NotAUri {
                    uri: uri.to_string(),
                    reason: e.to_string(),
                });
                return None;
            }
        };
        if !is_fetchable(&url) {
            return None;
        }
        if !url.path().contains(self.include_marker.as_str()) {
            return None;
        }
        Some(url)
    }

    fn evaluate(&self, url: &Url, stored: StoredRecord, allow_stale: bool) -> Step {
        let status = stored.record.status;
        let age = age_at(stored.modified, SystemTime::now());
        let fresh = self.freshness.is_fresh(status, age);
        let usable = fresh || allow_stale;

        match status {
            Status::Success if usable => {
                let Some(payload) = stored.record.payload else {
                    return Step::Refresh;
                };
                if !fresh {
                    self.sink.emit(Diagnostic::ServedStale {
                        uri: url.to_string(),
                        age,
                    });
                }
                if stored.legacy {
                    self.sink.emit(Diagnostic::LegacyEntry {
                        uri: url.to_string(),
                    });
                }
                Step::Serve(payload)
            }
            Status::Redirect(_) if usable => match stored.record.location {
                Some(location) => Step::Follow(location),
                None => Step::Refresh,
            },
            Status::NotFound if usable => Step::Unavailable,
            Status::Other(_) => Step::Refresh,
            _ => {
                self.sink.emit(Diagnostic::Expired {
                    uri: url.to_string(),
                    age,
                });
                Step::Refresh
            }
        }
    }

    fn redirect_target(&self, base: &Url, location: &str) -> Option<Url> {
        match base.join(location) {
            Ok(next) if is_fetchable(&next) => Some(next),
            Ok(next) => {
                self.sink.emit(Diagnostic::FetchFailed {
                    uri: base.to_string(),
                    error: format!("redirect to unsupported scheme: {next}"),
                });
                None
            }
            Err(e) => {
                self.sink.emit(Diagnostic::NotAUri {
                    uri: location.to_string(),
                    reason: e.to_string(),
                });
                None
            }
        }
    }
}

impl<T: Transport> EntityResolver for CachingResolver<T> {
    fn resolve_entity(&self, public_id: Option<&str>, system_id: &str) -> Resolution {
        if system_id.is_empty() {
            return Resolution::NotHandled;
        }
        match self.lookup(system_id) {
            Lookup::Found(bytes) => Resolution::Resolved(InputSource {
                public_id: public_id.map(String::from),
                system_id: system_id.to_string(),
                bytes,
            }),
            Lookup::NotHandled => Resolution::NotHandled,
            Lookup::NotResolvable => Resolution::NotResolvable,
        }
    }
}

/// Only network references are cached; `file:` and other schemes are left to the caller.
fn is_fetchable(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}
