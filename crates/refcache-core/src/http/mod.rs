//! HTTP transport for the fetch layer.
//!
//! Uses the curl crate (libcurl easy handle) to issue a single GET. Redirects
//! are not followed here: they come back as responses so the caller can cache
//! and bound them.

mod parse;

use std::fmt;
use std::str;
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::config::CacheConfig;

/// One HTTP response, body fully read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub code: u32,
    /// `ETag` if present (strong tags unquoted).
    pub etag: Option<String>,
    /// `Location` if present, verbatim.
    pub location: Option<String>,
    pub body: Vec<u8>,
}

/// Coarse class of a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Connect or transfer timed out.
    Timeout,
    /// Connection, DNS, or mid-transfer read/write failure.
    Connection,
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportErrorKind::Timeout => write!(f, "timeout"),
            TransportErrorKind::Connection => write!(f, "connection"),
            TransportErrorKind::Other => write!(f, "transport"),
        }
    }
}

/// The exchange did not produce a complete response.
#[derive(Debug, thiserror::Error)]
#[error("{kind} error: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<curl::Error> for TransportError {
    fn from(e: curl::Error) -> Self {
        Self::new(classify_curl_error(&e), e.to_string())
    }
}

/// Classify a curl error.
pub fn classify_curl_error(e: &curl::Error) -> TransportErrorKind {
    if e.is_operation_timedout() {
        return TransportErrorKind::Timeout;
    }
    if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_partial_file()
    {
        return TransportErrorKind::Connection;
    }
    TransportErrorKind::Other
}

/// Performs one GET without following redirects.
pub trait Transport {
    /// `validator`, when given, is sent as `If-None-Match`.
    fn get(&self, url: &Url, validator: Option<&str>) -> Result<HttpResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn get(&self, url: &Url, validator: Option<&str>) -> Result<HttpResponse, TransportError> {
        (**self).get(url, validator)
    }
}

/// libcurl-backed transport. Runs in the calling thread.
#[derive(Debug, Clone)]
pub struct CurlTransport {
    connect_timeout: Duration,
    user_agent: String,
}

impl CurlTransport {
    pub fn new(connect_timeout: Duration, user_agent: impl Into<String>) -> Self {
        Self {
            connect_timeout,
            user_agent: user_agent.into(),
        }
    }

    pub fn from_config(cfg: &CacheConfig) -> Self {
        Self::new(cfg.connect_timeout(), cfg.user_agent.clone())
    }
}

impl Transport for CurlTransport {
    fn get(&self, url: &Url, validator: Option<&str>) -> Result<HttpResponse, TransportError> {
        let mut headers: Vec<String> = Vec::new();
        let mut body: Vec<u8> = Vec::new();

        let mut easy = curl::easy::Easy::new();
        easy.url(url.as_str())?;
        easy.get(true)?;
        easy.follow_location(false)?;
        easy.connect_timeout(self.connect_timeout)?;
        easy.useragent(&self.user_agent)?;

        if let Some(v) = validator.filter(|v| !v.is_empty()) {
            let mut list = curl::easy::List::new();
            list.append(&format!("If-None-Match: {}", parse::if_none_match(v)))?;
            easy.http_headers(list)?;
        }

        {
            let mut transfer = easy.transfer();
            transfer.header_function(|data| {
                if let Ok(s) = str::from_utf8(data) {
                    let line = s.trim_end();
                    // Interim responses (100 Continue) come first; keep only the final block.
                    if line.starts_with("HTTP/") {
                        headers.clear();
                    }
                    headers.push(line.to_string());
                }
                true
            })?;
            transfer.write_function(|data| {
                body.extend_from_slice(data);
                Ok(data.len())
            })?;
            transfer.perform()?;
        }

        let code = easy.response_code()?;
        let parsed = parse::parse_headers(&headers);
        tracing::debug!(url = %url, code, bytes = body.len(), "GET completed");

        Ok(HttpResponse {
            code,
            etag: parsed.etag,
            location: parsed.location,
            body,
        })
    }
}
