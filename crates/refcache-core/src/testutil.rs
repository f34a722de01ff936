//! Test helpers: a scripted transport and record ageing.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use filetime::FileTime;
use url::Url;

use crate::http::{HttpResponse, Transport, TransportError, TransportErrorKind};
use crate::store::CacheStore;

type Scripted = Result<HttpResponse, TransportError>;

/// Transport that replays queued responses per URL and records every request.
/// A URL with nothing queued fails like an unreachable host.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    responses: Mutex<HashMap<String, VecDeque<Scripted>>>,
    requests: Mutex<Vec<(String, Option<String>)>>,
}

impl ScriptedTransport {
    pub(crate) fn respond(&self, url: &Url, response: HttpResponse) {
        self.push(url, Ok(response));
    }

    pub(crate) fn fail(&self, url: &Url) {
        self.push(
            url,
            Err(TransportError::new(
                TransportErrorKind::Timeout,
                "connect timed out",
            )),
        );
    }

    /// `(url, validator)` of every GET issued so far.
    pub(crate) fn requests(&self) -> Vec<(String, Option<String>)> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn push(&self, url: &Url, response: Scripted) {
        self.responses
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(response);
    }
}

impl Transport for ScriptedTransport {
    fn get(&self, url: &Url, validator: Option<&str>) -> Result<HttpResponse, TransportError> {
        self.requests
            .lock()
            .unwrap()
            .push((url.to_string(), validator.map(String::from)));
        self.responses
            .lock()
            .unwrap()
            .get_mut(url.as_str())
            .and_then(|q| q.pop_front())
            .unwrap_or_else(|| {
                Err(TransportError::new(
                    TransportErrorKind::Connection,
                    "connection refused",
                ))
            })
    }
}

pub(crate) fn ok(body: &[u8], etag: Option<&str>) -> HttpResponse {
    HttpResponse {
        code: 200,
        etag: etag.map(String::from),
        location: None,
        body: body.to_vec(),
    }
}

pub(crate) fn redirect(code: u32, location: &str) -> HttpResponse {
    HttpResponse {
        code,
        etag: None,
        location: Some(location.to_string()),
        body: Vec::new(),
    }
}

pub(crate) fn status(code: u32) -> HttpResponse {
    HttpResponse {
        code,
        etag: None,
        location: None,
        body: Vec::new(),
    }
}

/// Move the record's modification time `secs` into the past.
pub(crate) fn age_record(store: &CacheStore, url: &Url, secs: u64) {
    let mtime = SystemTime::now() - Duration::from_secs(secs);
    filetime::set_file_mtime(store.record_path(url), FileTime::from_system_time(mtime)).unwrap();
}
