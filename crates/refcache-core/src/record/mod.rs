//! Cache records: the persisted outcome of one fetch.
//!
//! A record is stored as a ZIP container with one named part per field so the
//! status and validator can be read without touching a large payload. See
//! [`codec`] for the part names and the tolerated older layouts.

pub mod codec;

pub use codec::{read, read_meta, write, RecordError};

use std::fmt;

/// HTTP outcome class of a cached fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// 200 with a payload.
    Success,
    /// 301, 302, 307 or 308 with a `Location`.
    Redirect(u32),
    /// 404.
    NotFound,
    /// Any other code. Stored, but never served.
    Other(u32),
}

impl Status {
    pub fn from_code(code: u32) -> Self {
        match code {
            200 => Status::Success,
            301 | 302 | 307 | 308 => Status::Redirect(code),
            404 => Status::NotFound,
            other => Status::Other(other),
        }
    }

    pub fn code(&self) -> u32 {
        match *self {
            Status::Success => 200,
            Status::Redirect(code) | Status::Other(code) => code,
            Status::NotFound => 404,
        }
    }

    /// True for 301 and 308.
    pub fn is_permanent_redirect(&self) -> bool {
        matches!(self, Status::Redirect(301) | Status::Redirect(308))
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Success => write!(f, "200 success"),
            Status::Redirect(code) if self.is_permanent_redirect() => {
                write!(f, "{code} permanent redirect")
            }
            Status::Redirect(code) => write!(f, "{code} temporary redirect"),
            Status::NotFound => write!(f, "404 not found"),
            Status::Other(code) => write!(f, "{code} other"),
        }
    }
}

/// One cache entry. Which optional fields are meaningful depends on `status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRecord {
    pub status: Status,
    /// ETag of a successful response, used for conditional revalidation.
    pub validator: Option<String>,
    /// Redirect target as sent by the server (possibly relative).
    pub location: Option<String>,
    pub payload: Option<Vec<u8>>,
}

impl CacheRecord {
    pub fn success(payload: Vec<u8>, validator: Option<String>) -> Self {
        Self {
            status: Status::Success,
            validator,
            location: None,
            payload: Some(payload),
        }
    }

    pub fn redirect(code: u32, location: String) -> Self {
        Self {
            status: Status::Redirect(code),
            validator: None,
            location: Some(location),
            payload: None,
        }
    }

    pub fn not_found() -> Self {
        Self::without_body(Status::NotFound)
    }

    pub fn other(code: u32) -> Self {
        Self::without_body(Status::Other(code))
    }

    fn without_body(status: Status) -> Self {
        Self {
            status,
            validator: None,
            location: None,
            payload: None,
        }
    }
}

/// Record fields minus the payload, as read by [`read_meta`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMeta {
    pub status: Status,
    pub validator: Option<String>,
    pub location: Option<String>,
    /// Uncompressed payload size, if a payload part exists.
    pub payload_len: Option<u64>,
}
