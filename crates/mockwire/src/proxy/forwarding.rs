//! Upstream request forwarding.

use super::headers::{is_excluded_outbound, is_hop_by_hop};
use crate::error::{ProxyError, ServerError};
use crate::request::RequestMessage;
use bytes::Bytes;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Response captured from an upstream, minus hop-by-hop headers.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub latency: Duration,
}

/// Shared HTTP client used for proxying.
#[derive(Debug, Clone)]
pub struct ProxyClient {
    client: reqwest::Client,
}

impl ProxyClient {
    pub fn new() -> Result<Self, ServerError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ServerError::Client(e.to_string()))?;
        Ok(Self { client })
    }

    /// Forward `request` to `base_url`, keeping method, path, query, headers and body.
    /// Cancelled cooperatively when `cancel` fires.
    pub async fn forward(
        &self,
        request: &RequestMessage,
        base_url: &str,
        cancel: &CancellationToken,
    ) -> Result<UpstreamResponse, ProxyError> {
        let target_url = target_url(base_url, request);
        let method = reqwest::Method::from_bytes(request.method.as_bytes()).map_err(|_| {
            ProxyError::InvalidUpstream(format!("invalid method {}", request.method))
        })?;
        debug!("Proxy request to: {} {}", method, target_url);

        let mut outbound = self.client.request(method, &target_url);
        for (name, values) in &request.headers {
            if is_excluded_outbound(name) {
                continue;
            }
            for value in values {
                outbound = outbound.header(name.as_str(), value.as_str());
            }
        }
        if !request.body.is_empty() {
            outbound = outbound.body(request.body.clone());
        }

        let start = Instant::now();
        let unavailable = |e: reqwest::Error| ProxyError::UpstreamUnavailable {
            url: target_url.clone(),
            reason: e.to_string(),
        };
        let response = tokio::select! {
            result = outbound.send() => result.map_err(unavailable)?,
            _ = cancel.cancelled() => return Err(ProxyError::Cancelled),
        };

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter(|(name, _)| {
                !is_hop_by_hop(name.as_str()) && *name != hyper::header::CONTENT_LENGTH
            })
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = tokio::select! {
            result = response.bytes() => result.map_err(unavailable)?,
            _ = cancel.cancelled() => return Err(ProxyError::Cancelled),
        };

        Ok(UpstreamResponse {
            status,
            headers,
            body,
            latency: start.elapsed(),
        })
    }
}

fn target_url(base_url: &str, request: &RequestMessage) -> String {
    format!(
        "{}{}{}",
        base_url.trim_end_matches('/'),
        request.path,
        request
            .query_string
            .as_deref()
            .map(|q| format!("?{q}"))
            .unwrap_or_default()
    )
}
