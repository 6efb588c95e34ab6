//! Fault injection for mock responses.
//!
//! A response may declare a fault with a probability. The decision is drawn from
//! the server's seedable RNG so a fixed seed reproduces the same sequence of
//! faults across runs.

use super::ResponseBody;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use http_body_util::{BodyExt, StreamBody};
use hyper::body::Frame;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Kind of corruption applied instead of a well-formed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FaultKind {
    /// Status 200 with an empty body
    EmptyResponse,
    /// Valid head, then a truncated chunked body and a dropped connection
    MalformedResponseChunk,
    /// Valid head, then random bytes and a dropped connection
    RandomDataThenClose,
    /// Connection closed without writing a response
    ConnectionClose,
}

impl FaultKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultKind::EmptyResponse => "EMPTY_RESPONSE",
            FaultKind::MalformedResponseChunk => "MALFORMED_RESPONSE_CHUNK",
            FaultKind::RandomDataThenClose => "RANDOM_DATA_THEN_CLOSE",
            FaultKind::ConnectionClose => "CONNECTION_CLOSE",
        }
    }
}

/// Fault declaration as stored in a mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaultModel {
    #[serde(rename = "type")]
    pub kind: FaultKind,
    /// Probability in `[0, 1]`; absent means always
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,
}

impl FaultModel {
    pub fn new(kind: FaultKind, probability: f64) -> Self {
        Self {
            kind,
            probability: Some(probability),
        }
    }

    pub fn probability(&self) -> f64 {
        self.probability.unwrap_or(1.0)
    }
}

/// Outcome of the per-request fault draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultDecision {
    None,
    Inject(FaultKind),
}

pub fn decide_fault(
    fault: Option<&FaultModel>,
    enabled: bool,
    rng: &mut impl Rng,
) -> FaultDecision {
    match fault {
        Some(fault) if enabled && should_inject(fault.probability(), rng) => {
            FaultDecision::Inject(fault.kind)
        }
        _ => FaultDecision::None,
    }
}

fn should_inject(probability: f64, rng: &mut impl Rng) -> bool {
    rng.gen::<f64>() < probability
}

/// Random payload used by `RANDOM_DATA_THEN_CLOSE`.
pub fn random_payload(rng: &mut impl Rng, len: usize) -> Bytes {
    let mut data = vec![0u8; len];
    rng.fill(data.as_mut_slice());
    Bytes::from(data)
}

/// Body that yields `head` and then fails, making hyper abort the connection
/// before the chunked encoding is terminated. The error is delayed by one
/// poll so the head and partial chunk are flushed first.
pub fn aborting_body(head: Bytes, reason: &'static str) -> ResponseBody {
    let head = stream::once(async move { Ok::<_, std::io::Error>(Frame::data(head)) });
    let abort = stream::once(async move {
        tokio::task::yield_now().await;
        Err(std::io::Error::new(std::io::ErrorKind::ConnectionAborted, reason))
    });
    BodyExt::boxed(StreamBody::new(head.chain(abort)))
}

/// First half of a rendered body, used as the partial chunk of a malformed response.
pub fn truncated(body: &Bytes) -> Bytes {
    if body.is_empty() {
        return Bytes::from_static(b"malformed");
    }
    body.slice(..body.len().div_ceil(2))
}
