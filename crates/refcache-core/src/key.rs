//! Cache keys: content-addressed names for cache entries.

use sha1::{Digest, Sha1};
use std::fmt;
use url::Url;

/// File extension of the current record container.
pub const RECORD_EXT: &str = "zip";

/// File extension of bare-payload entries written by older versions.
pub const LEGACY_EXT: &str = "xml";

/// Key used to name the cache entry for a URI.
///
/// The key is the lowercase hex SHA-1 of the URI string, which keeps entry names
/// compatible with cache directories produced by earlier versions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for a raw URI string, hashed exactly as given.
    pub fn from_uri_str(uri: &str) -> Self {
        let digest = Sha1::digest(uri.as_bytes());
        CacheKey(hex::encode(digest))
    }

    /// Key for a parsed URL (hashes its normalized serialization).
    pub fn from_url(url: &Url) -> Self {
        Self::from_uri_str(url.as_str())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Entry file name for the given extension: `<hex>.<ext>`.
    pub fn file_name(&self, ext: &str) -> String {
        format!("{}.{}", self.0, ext)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
