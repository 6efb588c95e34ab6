//! Bounded log of served requests.
//!
//! Every mock request (not admin requests) is appended once its response has
//! been decided. When a maximum is configured the oldest entries are evicted
//! first.

use crate::request::RequestMessage;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use uuid::Uuid;

/// Request side of a log entry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggedRequest {
    pub method: String,
    pub url: String,
    pub path: String,
    pub query: BTreeMap<String, Vec<String>>,
    pub headers: BTreeMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub cookies: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(rename = "clientIP")]
    pub client_ip: String,
    pub received_at: DateTime<Utc>,
}

impl From<&RequestMessage> for LoggedRequest {
    fn from(request: &RequestMessage) -> Self {
        Self {
            method: request.method.clone(),
            url: request.url.clone(),
            path: request.path.clone(),
            query: request.query.clone(),
            headers: request.headers.clone(),
            cookies: request.cookies.clone(),
            body: request
                .body_text()
                .filter(|body| !body.is_empty())
                .map(str::to_string),
            client_ip: request.client_ip.clone(),
            received_at: request.received_at,
        }
    }
}

/// Response side of a log entry.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggedResponse {
    pub status_code: u16,
    pub headers: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Fault injected instead of the rendered response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub guid: Uuid,
    pub request: LoggedRequest,
    pub response: LoggedResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapping_guid: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapping_title: Option<String>,
    /// Match score of the selected mapping; below 1.0 only with partial matching
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial_match_score: Option<f64>,
    pub proxied: bool,
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    pub fn new(request: &RequestMessage, response: LoggedResponse) -> Self {
        Self {
            guid: Uuid::new_v4(),
            request: LoggedRequest::from(request),
            response,
            mapping_guid: None,
            mapping_title: None,
            partial_match_score: None,
            proxied: false,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Default)]
pub struct RequestLog {
    entries: VecDeque<LogEntry>,
    max_entries: Option<usize>,
}

impl RequestLog {
    pub fn new(max_entries: Option<usize>) -> Self {
        Self {
            entries: VecDeque::new(),
            max_entries,
        }
    }

    pub fn push(&mut self, entry: LogEntry) {
        self.entries.push_back(entry);
        self.evict();
    }

    /// Entries from oldest to newest.
    pub fn list(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn get(&self, guid: Uuid) -> Option<LogEntry> {
        self.entries.iter().find(|e| e.guid == guid).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Change the cap, evicting immediately if the log is over it.
    pub fn set_max(&mut self, max_entries: Option<usize>) {
        self.max_entries = max_entries;
        self.evict();
    }

    fn evict(&mut self) {
        if let Some(max) = self.max_entries {
            while self.entries.len() > max {
                self.entries.pop_front();
            }
        }
    }
}
