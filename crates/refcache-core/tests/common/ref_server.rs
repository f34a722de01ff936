//! Minimal HTTP/1.1 server for integration tests.
//!
//! Serves a fixed table of routes. A route with an ETag answers 304 when the
//! request carries a matching `If-None-Match`. Every request is recorded.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;

#[derive(Debug, Clone)]
pub enum Route {
    Ok { body: Vec<u8>, etag: Option<String> },
    Redirect { code: u32, location: Option<String> },
    Status(u32),
}

#[derive(Debug, Clone)]
pub struct Request {
    pub path: String,
    pub if_none_match: Option<String>,
    pub user_agent: Option<String>,
}

pub struct RefServer {
    /// e.g. "http://127.0.0.1:12345"
    pub base: String,
    requests: Arc<Mutex<Vec<Request>>>,
}

impl RefServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }
}

/// Starts a server in a background thread. The server runs until the process exits.
pub fn start(routes: Vec<(&str, Route)>) -> RefServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let routes: Arc<HashMap<String, Route>> = Arc::new(
        routes
            .into_iter()
            .map(|(p, r)| (p.to_string(), r))
            .collect(),
    );
    let requests = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&requests);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let routes = Arc::clone(&routes);
            let log = Arc::clone(&log);
            thread::spawn(move || handle(stream, &routes, &log));
        }
    });
    RefServer {
        base: format!("http://127.0.0.1:{}", port),
        requests,
    }
}

/// A URL on a port nothing listens on.
pub fn unreachable_url(path: &str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}{}", port, path)
}

fn handle(
    mut stream: std::net::TcpStream,
    routes: &HashMap<String, Route>,
    log: &Mutex<Vec<Request>>,
) {
    let _ = stream.set_read_timeout(Some(std::time::Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(std::time::Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) => return,
        Ok(n) => n,
        Err(_) => return,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => parse_request(s),
        Err(_) => return,
    };
    log.lock().unwrap().push(request.clone());

    let (status, headers, body): (String, String, Vec<u8>) = match routes.get(&request.path) {
        Some(Route::Ok { body, etag }) => {
            let quoted = etag.as_ref().map(|e| format!("\"{}\"", e));
            if quoted.is_some() && quoted == request.if_none_match {
                ("304 Not Modified".into(), String::new(), Vec::new())
            } else {
                let etag_header = quoted
                    .map(|q| format!("ETag: {}\r\n", q))
                    .unwrap_or_default();
                ("200 OK".into(), etag_header, body.clone())
            }
        }
        Some(Route::Redirect { code, location }) => {
            let location_header = location
                .as_ref()
                .map(|l| format!("Location: {}\r\n", l))
                .unwrap_or_default();
            (format!("{} Redirect", code), location_header, Vec::new())
        }
        Some(Route::Status(code)) => (format!("{} Status", code), String::new(), Vec::new()),
        None => ("404 Not Found".into(), String::new(), Vec::new()),
    };

    let response = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n{}\r\n",
        status,
        body.len(),
        headers
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.write_all(&body);
}

fn parse_request(request: &str) -> Request {
    let mut path = String::new();
    let mut if_none_match = None;
    let mut user_agent = None;
    for line in request.lines() {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if path.is_empty() {
            path = line.split_whitespace().nth(1).unwrap_or("").to_string();
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            if name.eq_ignore_ascii_case("if-none-match") {
                if_none_match = Some(value.trim().to_string());
            }
            if name.eq_ignore_ascii_case("user-agent") {
                user_agent = Some(value.trim().to_string());
            }
        }
    }
    Request {
        path,
        if_none_match,
        user_agent,
    }
}
