//! Per-request service for mock endpoints.
//!
//! Admin paths go to the Admin API. Everything else is normalized into a
//! `RequestMessage`, resolved by the engine, delayed, optionally corrupted by an
//! injected fault, logged and written back.

use super::engine::{Engine, Served};
use crate::admin_api::{is_admin_path, AdminApi};
use crate::config::{RuntimeSettings, Scheme};
use crate::proxy::headers::{is_hop_by_hop, MockwireHeadersExt, X_MOCKWIRE_FAULT};
use crate::request::RequestMessage;
use crate::request_log::{LogEntry, LoggedResponse};
use crate::response::fault::{aborting_body, decide_fault, random_payload, truncated};
use crate::response::{full_body, FaultDecision, FaultKind, RenderedResponse, ResponseBody};
use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::header::CONTENT_LENGTH;
use hyper::{Request, Response, StatusCode};
use rand::rngs::StdRng;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Length of the payload written by `RANDOM_DATA_THEN_CLOSE`.
const RANDOM_DATA_LEN: usize = 64;

/// Returned from the service to make hyper drop the connection without a response.
#[derive(Error, Debug)]
pub enum AbortConnection {
    #[error("connection closed by injected fault")]
    Fault,
    #[error("response cancelled by shutdown")]
    Cancelled,
}

/// State shared by every connection of one server.
pub struct ServiceContext {
    pub engine: Arc<Engine>,
    pub admin: Option<Arc<AdminApi>>,
}

/// Handle one request on an endpoint with the given scheme.
pub async fn handle_request(
    req: Request<Incoming>,
    ctx: Arc<ServiceContext>,
    remote: SocketAddr,
    scheme: Scheme,
) -> Result<Response<ResponseBody>, AbortConnection> {
    if let Some(admin) = &ctx.admin {
        if is_admin_path(req.uri().path()) {
            let response: Response<ResponseBody> = admin
                .handle(req)
                .await
                .map(|body| body.map_err(|never: Infallible| match never {}).boxed());
            return Ok(response);
        }
    }

    let engine = &ctx.engine;
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            debug!("Failed to read request body from {}: {}", remote, e);
            return Ok(plain_response(
                StatusCode::BAD_REQUEST,
                "Failed to read request body",
            ));
        }
    };
    let request = RequestMessage::from_parts(
        &parts,
        body,
        remote,
        scheme.as_str(),
        engine.parse_json_bodies(),
    );

    let settings = engine.settings();
    let mut rng = engine.request_rng();
    let Served {
        response: rendered,
        mapping,
        proxied,
    } = engine.serve(&request, &settings, &mut rng).await;

    let mut entry = LogEntry::new(
        &request,
        LoggedResponse {
            status_code: rendered.status.as_u16(),
            headers: rendered.headers.clone(),
            body: std::str::from_utf8(&rendered.body)
                .ok()
                .filter(|b| !b.is_empty())
                .map(str::to_string),
            fault: None,
        },
    );
    entry.proxied = proxied;
    if let Some(candidate) = &mapping {
        entry.mapping_guid = Some(candidate.mapping.guid());
        entry.mapping_title = candidate.mapping.title().map(str::to_string);
        entry.partial_match_score = Some(candidate.score);
    }

    if proxied {
        engine.log(entry);
        return Ok(into_response(
            rendered.status,
            &rendered.headers,
            full_body(rendered.body),
        ));
    }

    if mapping.is_some() {
        if let Some(delay) = total_delay(&rendered, &settings) {
            debug!("Delaying response to {} by {:?}", request.path, delay);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = engine.cancel_token().cancelled() => {
                    debug!("Delayed response to {} cancelled by shutdown", request.path);
                    return Err(AbortConnection::Cancelled);
                }
            }
        }
    }

    let decision = decide_fault(
        rendered.fault.as_ref(),
        settings.fault_injection_enabled,
        &mut rng,
    );
    if let FaultDecision::Inject(kind) = decision {
        warn!(
            "Injecting fault {} for {} {}",
            kind.as_str(),
            request.method,
            request.path
        );
        entry.response.fault = Some(kind.as_str().to_string());
    }
    engine.log(entry);

    match decision {
        FaultDecision::None => Ok(into_response(
            rendered.status,
            &rendered.headers,
            full_body(rendered.body),
        )),
        FaultDecision::Inject(kind) => fault_response(kind, rendered, &mut rng),
    }
}

/// Mapping delay plus the global processing delay.
fn total_delay(rendered: &RenderedResponse, settings: &RuntimeSettings) -> Option<Duration> {
    let global = settings.global_processing_delay.map(Duration::from_millis);
    let total = match (rendered.delay, global) {
        (None, None) => return None,
        (a, b) => a.unwrap_or_default() + b.unwrap_or_default(),
    };
    (!total.is_zero()).then_some(total)
}

fn fault_response(
    kind: FaultKind,
    rendered: RenderedResponse,
    rng: &mut StdRng,
) -> Result<Response<ResponseBody>, AbortConnection> {
    let mut response = match kind {
        FaultKind::EmptyResponse => into_response(StatusCode::OK, &[], full_body(Bytes::new())),
        FaultKind::MalformedResponseChunk => into_response(
            StatusCode::OK,
            &rendered.headers,
            aborting_body(truncated(&rendered.body), "malformed response chunk"),
        ),
        FaultKind::RandomDataThenClose => into_response(
            StatusCode::OK,
            &[],
            aborting_body(random_payload(rng, RANDOM_DATA_LEN), "random data then close"),
        ),
        FaultKind::ConnectionClose => return Err(AbortConnection::Fault),
    };
    response.set_header_value(&X_MOCKWIRE_FAULT, kind.as_str());
    Ok(response)
}

/// Assemble a response. Hop-by-hop headers and `Content-Length` are left to hyper.
fn into_response(
    status: StatusCode,
    headers: &[(String, String)],
    body: ResponseBody,
) -> Response<ResponseBody> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    for (name, value) in headers {
        if is_hop_by_hop(name) || name.eq_ignore_ascii_case(CONTENT_LENGTH.as_str()) {
            continue;
        }
        if !response.append_header(name, value) {
            warn!("Skipping invalid response header {}", name);
        }
    }
    response
}

fn plain_response(status: StatusCode, body: &'static str) -> Response<ResponseBody> {
    into_response(status, &[], full_body(Bytes::from_static(body.as_bytes())))
}
