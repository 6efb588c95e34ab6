//! Scenario handlers.

use crate::admin_api::types::{error_response, json_response, StatusResponse};
use crate::server::Engine;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};

/// GET /__admin/scenarios
pub fn handle_list(engine: &Engine) -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, &engine.scenarios())
}

/// POST /__admin/scenarios/reset - Return every scenario to its initial state
pub fn handle_reset(engine: &Engine) -> Response<Full<Bytes>> {
    engine.reset_scenarios();
    json_response(StatusCode::OK, &StatusResponse::new("Scenarios reset"))
}

/// PUT /__admin/scenarios/:name/reset
pub fn handle_reset_one(name: &str, engine: &Engine) -> Response<Full<Bytes>> {
    if engine.reset_scenario(name) {
        json_response(
            StatusCode::OK,
            &StatusResponse::new(format!("Scenario '{name}' reset")),
        )
    } else {
        error_response(
            StatusCode::NOT_FOUND,
            &format!("Scenario '{name}' not found"),
        )
    }
}
