//! Listening endpoints and TLS configuration.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// TLS material for https endpoints
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsSettings {
    /// Path to TLS certificate file (PEM format)
    pub cert_path: String,
    /// Path to TLS private key file (PEM format)
    pub key_path: String,
}

/// Scheme of a listening endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    #[default]
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    pub fn from_scheme(scheme: &str) -> Result<Self, ConfigError> {
        match scheme.to_lowercase().as_str() {
            "http" => Ok(Scheme::Http),
            "https" => Ok(Scheme::Https),
            _ => Err(ConfigError::InvalidSettings(format!(
                "Unsupported scheme: {scheme}"
            ))),
        }
    }
}

/// A `scheme://host:port` triple. Port 0 asks the OS for an ephemeral port.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(scheme: Scheme, host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme,
            host: host.into(),
            port,
        }
    }

    /// Parse a listen url such as `http://0.0.0.0:9091` or `https://*:8443`.
    /// A missing port means dynamic allocation.
    pub fn parse(url: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidSettings(format!("url '{url}': {reason}"));
        let uri: hyper::Uri = url.parse().map_err(|_| invalid("not a valid url"))?;
        let scheme = uri.scheme_str().ok_or_else(|| invalid("missing scheme"))?;
        let scheme = Scheme::from_scheme(scheme)?;
        let host = uri.host().ok_or_else(|| invalid("missing host"))?;
        let host = match host {
            "*" | "+" => "0.0.0.0",
            other => other.trim_start_matches('[').trim_end_matches(']'),
        };
        Ok(Self::new(scheme, host, uri.port_u16().unwrap_or(0)))
    }

    /// Base url clients use to reach this endpoint.
    pub fn url(&self) -> String {
        let host = match self.host.as_str() {
            "0.0.0.0" => "localhost",
            "::" => "localhost",
            other => other,
        };
        if host.contains(':') {
            format!("{}://[{}]:{}", self.scheme.as_str(), host, self.port)
        } else {
            format!("{}://{}:{}", self.scheme.as_str(), host, self.port)
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}
