//! System handlers: health and full reset.

use crate::admin_api::types::{json_response, StatusResponse};
use crate::server::Engine;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};

/// GET /__admin/health - Health check
pub fn handle_health(engine: &Engine) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::OK,
        &serde_json::json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "mappings": engine.mappings().len(),
        }),
    )
}

/// POST /__admin/reset - Remove mappings, scenarios and logged requests
pub fn handle_reset(engine: &Engine) -> Response<Full<Bytes>> {
    engine.reset();
    json_response(StatusCode::OK, &StatusResponse::new("Server reset"))
}
