//! Fetch layer: one GET, outcome persisted as a cache record.

use std::io;
use std::sync::Arc;
use std::time::SystemTime;

use url::Url;

use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::freshness::age_at;
use crate::http::{Transport, TransportError};
use crate::record::{CacheRecord, Status};
use crate::store::CacheStore;

/// What a completed fetch left in the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A new record with this status replaced any previous one.
    Stored(Status),
    /// 304: the existing record was kept and its timestamp refreshed.
    Revalidated,
}

/// A fetch that did not complete. The cache is left as it was.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("redirected with {code}, but no location")]
    MissingLocation { code: u32 },
    #[error("not modified, but no cached entry to refresh")]
    NothingToRevalidate,
    #[error("cache write failed: {0}")]
    Store(#[source] io::Error),
}

pub struct Fetcher<T> {
    transport: T,
    store: CacheStore,
    sink: Arc<dyn DiagnosticSink>,
}

impl<T: Transport> Fetcher<T> {
    pub fn new(transport: T, store: CacheStore, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            transport,
            store,
            sink,
        }
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// GET `url` (conditionally when `validator` is non-empty) and persist the outcome.
    pub fn fetch(&self, url: &Url, validator: Option<&str>) -> Result<Outcome, FetchError> {
        let validator = validator.filter(|v| !v.is_empty());
        let response = self.transport.get(url, validator)?;

        let record = match response.code {
            200 => CacheRecord::success(response.body, response.etag),
            code @ (301 | 302 | 307 | 308) => {
                let location = response
                    .location
                    .ok_or(FetchError::MissingLocation { code })?;
                self.sink.emit(Diagnostic::Redirect {
                    uri: url.to_string(),
                    code,
                    target: location.clone(),
                });
                CacheRecord::redirect(code, location)
            }
            304 => {
                self.store.touch(url).map_err(|e| match e.kind() {
                    io::ErrorKind::NotFound => FetchError::NothingToRevalidate,
                    _ => FetchError::Store(e),
                })?;
                self.sink.emit(Diagnostic::Revalidated {
                    uri: url.to_string(),
                });
                return Ok(Outcome::Revalidated);
            }
            404 => CacheRecord::not_found(),
            code => {
                self.sink.emit(Diagnostic::UnexpectedStatus {
                    uri: url.to_string(),
                    code,
                });
                CacheRecord::other(code)
            }
        };

        let previous = self.store.modified(url);
        self.store.write(url, &record).map_err(FetchError::Store)?;
        let uri = url.to_string();
        self.sink.emit(match previous {
            Some(modified) => Diagnostic::Replaced {
                uri,
                previous_age: age_at(modified, SystemTime::now()),
            },
            None => Diagnostic::Created { uri },
        });
        Ok(Outcome::Stored(record.status))
    }
}
