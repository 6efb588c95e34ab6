//! Error types shared across the server.
//!
//! - `ConfigError` - invalid mappings, matchers and settings (registration/load time)
//! - `ServerError` - start/stop failures of the orchestrator
//! - `ProxyError` - upstream forwarding failures (surfaced as 502)
//! - `PersistenceError` - mapping snapshot I/O (logged, never surfaced to callers)

use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Invalid configuration detected while compiling a mapping or loading settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid regex pattern '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("Invalid expression '{expression}': {message}")]
    InvalidExpression { expression: String, message: String },
    #[error("Invalid JSONPath '{pattern}': {message}")]
    InvalidJsonPath { pattern: String, message: String },
    #[error("Invalid matcher {name}: {message}")]
    InvalidMatcher { name: String, message: String },
    #[error("Invalid mapping: {0}")]
    InvalidMapping(String),
    #[error("Malformed mapping document: {0}")]
    MalformedDocument(#[from] serde_json::Error),
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),
}

/// Failures of the server orchestrator.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Port {0} is already in use")]
    PortInUse(u16),
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid endpoint '{0}'")]
    InvalidEndpoint(String),
    #[error("TLS setup failed: {0}")]
    Tls(String),
    #[error("Failed to build upstream client: {0}")]
    Client(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("Mapping {0} not found")]
    MappingNotFound(uuid::Uuid),
    #[error("Mapping {0} already exists")]
    DuplicateMapping(uuid::Uuid),
}

/// Failures while forwarding a request upstream.
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Upstream {url} unavailable: {reason}")]
    UpstreamUnavailable { url: String, reason: String },
    #[error("Invalid upstream url '{0}'")]
    InvalidUpstream(String),
    #[error("Proxy call cancelled by shutdown")]
    Cancelled,
}

/// Failures reading or writing mapping snapshot files.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid mapping JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
