//! Request log handlers.

use crate::admin_api::types::{error_response, json_response, StatusResponse};
use crate::server::Engine;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use uuid::Uuid;

/// GET /__admin/requests - Logged requests, oldest first
pub fn handle_list(engine: &Engine) -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, &engine.log_entries())
}

/// GET /__admin/requests/:guid
pub fn handle_get(guid: Uuid, engine: &Engine) -> Response<Full<Bytes>> {
    match engine.log_entry(guid) {
        Some(entry) => json_response(StatusCode::OK, &entry),
        None => error_response(
            StatusCode::NOT_FOUND,
            &format!("Request {guid} not found"),
        ),
    }
}

/// DELETE /__admin/requests
pub fn handle_clear(engine: &Engine) -> Response<Full<Bytes>> {
    engine.reset_log();
    json_response(StatusCode::OK, &StatusResponse::new("Requests deleted"))
}
