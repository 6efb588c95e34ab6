//! Runtime settings handlers.

use crate::admin_api::types::{collect_body, error_response, json_response};
use crate::server::Engine;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde_json::Value;

/// GET /__admin/settings
pub fn handle_get(engine: &Engine) -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, &engine.settings())
}

/// PUT /__admin/settings - Partial update; `null` clears optional fields
pub async fn handle_update(req: Request<Incoming>, engine: &Engine) -> Response<Full<Bytes>> {
    let body = match collect_body(req).await {
        Ok(b) => b,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e),
    };
    let patch: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                &format!("Invalid settings JSON: {e}"),
            )
        }
    };
    match engine.update_settings(patch) {
        Ok(settings) => json_response(StatusCode::OK, &settings),
        Err(e) => error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    }
}
