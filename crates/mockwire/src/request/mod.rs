//! Normalized, immutable snapshot of an inbound HTTP request.
//!
//! Header names are lowercased; query parameters and headers keep every value
//! in arrival order. The body is kept as raw bytes, with cached UTF-8 and
//! (optionally) parsed JSON views used by matchers and templating.
//!
//! `RequestBuilder` lives here too: it builds the predicate side of a mapping.

mod builder;

pub use builder::RequestBuilder;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use hyper::http::request::Parts;
use serde_json::Value;
use std::collections::BTreeMap;
use std::net::SocketAddr;

#[derive(Debug, Clone)]
pub struct RequestMessage {
    pub method: String,
    /// Absolute URL as seen by the server (`scheme://host/path?query`)
    pub url: String,
    pub path: String,
    pub query_string: Option<String>,
    pub query: BTreeMap<String, Vec<String>>,
    /// Header values keyed by lowercased name
    pub headers: BTreeMap<String, Vec<String>>,
    pub cookies: BTreeMap<String, String>,
    pub body: Bytes,
    body_text: Option<String>,
    body_json: Option<Value>,
    pub client_ip: String,
    pub received_at: DateTime<Utc>,
}

impl RequestMessage {
    /// Create a request for `url`, which may be absolute or just a path with query.
    pub fn new(method: &str, url: &str) -> Self {
        let (base, path_and_query) = split_url(url);
        let (path, query_string) = match path_and_query.split_once('?') {
            Some((p, q)) => (p.to_string(), Some(q.to_string())),
            None => (path_and_query.to_string(), None),
        };
        let path = if path.is_empty() { "/".to_string() } else { path };
        let base = base.unwrap_or("http://localhost");
        Self {
            method: method.to_uppercase(),
            url: format!(
                "{base}{path}{}",
                query_string
                    .as_deref()
                    .map(|q| format!("?{q}"))
                    .unwrap_or_default()
            ),
            query: parse_query_string(query_string.as_deref()),
            path,
            query_string,
            headers: BTreeMap::new(),
            cookies: BTreeMap::new(),
            body: Bytes::new(),
            body_text: Some(String::new()),
            body_json: None,
            client_ip: "127.0.0.1".to_string(),
            received_at: Utc::now(),
        }
    }

    /// Build from hyper request parts and the collected body.
    pub fn from_parts(
        parts: &Parts,
        body: Bytes,
        remote: SocketAddr,
        scheme: &str,
        parse_json: bool,
    ) -> Self {
        let host = parts
            .headers
            .get(hyper::header::HOST)
            .and_then(|h| h.to_str().ok())
            .or_else(|| parts.uri.authority().map(|a| a.as_str()))
            .unwrap_or("localhost");
        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");

        let mut request = Self::new(
            parts.method.as_str(),
            &format!("{scheme}://{host}{path_and_query}"),
        );
        for (name, value) in parts.headers.iter() {
            if let Ok(value) = value.to_str() {
                request = request.with_header(name.as_str(), value);
            }
        }
        request.client_ip = remote.ip().to_string();
        request.with_body_bytes(body, parse_json)
    }

    /// Add a header value; `cookie` headers also populate the cookie map.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        let name = name.to_lowercase();
        if name == "cookie" {
            for (k, v) in parse_cookies(value) {
                self.cookies.insert(k, v);
            }
        }
        self.headers
            .entry(name)
            .or_default()
            .push(value.to_string());
        self
    }

    pub fn with_body(self, body: impl Into<String>) -> Self {
        let body: String = body.into();
        self.with_body_bytes(Bytes::from(body), true)
    }

    pub fn with_body_bytes(mut self, body: Bytes, parse_json: bool) -> Self {
        self.body_text = std::str::from_utf8(&body).ok().map(str::to_string);
        self.body_json = if parse_json {
            self.body_text
                .as_deref()
                .filter(|text| !text.trim().is_empty())
                .and_then(|text| serde_json::from_str(text).ok())
        } else {
            None
        };
        self.body = body;
        self
    }

    pub fn with_client_ip(mut self, ip: impl Into<String>) -> Self {
        self.client_ip = ip.into();
        self
    }

    /// First value of a header (name is case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.header_values(name).first().map(String::as_str)
    }

    pub fn header_values(&self, name: &str) -> &[String] {
        self.headers
            .get(&name.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn query_values(&self, name: &str) -> &[String] {
        self.query.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Body as text when it is valid UTF-8.
    pub fn body_text(&self) -> Option<&str> {
        self.body_text.as_deref()
    }

    /// Parsed JSON body, when parsing is enabled and the body is JSON.
    pub fn body_json(&self) -> Option<&Value> {
        self.body_json.as_ref()
    }
}

/// Split an absolute URL into `(scheme://authority, path?query)`.
fn split_url(url: &str) -> (Option<&str>, &str) {
    if let Some(scheme_end) = url.find("://") {
        let after = &url[scheme_end + 3..];
        let path_start = after.find('/').map(|i| scheme_end + 3 + i);
        match path_start {
            Some(i) => (Some(&url[..i]), &url[i..]),
            None => (Some(url), "/"),
        }
    } else {
        (None, url)
    }
}

/// Parse a query string into a multimap, percent-decoding keys and values.
pub fn parse_query_string(query: Option<&str>) -> BTreeMap<String, Vec<String>> {
    let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
    if let Some(q) = query {
        for pair in q.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            params
                .entry(decode_component(key))
                .or_default()
                .push(decode_component(value));
        }
    }
    params
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|c| c.into_owned())
        .unwrap_or(spaced)
}

/// Parse a `Cookie` header (`a=b; c=d`).
pub fn parse_cookies(header: &str) -> Vec<(String, String)> {
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            Some((name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}
