//! Mapping management handlers.

use crate::admin_api::types::{
    collect_body, error_response, json_response, mapping_not_found, MappingSummary,
    StatusResponse,
};
use crate::error::ServerError;
use crate::mapping::MappingModel;
use crate::server::Engine;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

/// GET /__admin/mappings - List mappings in registration order
pub fn handle_list(engine: &Engine) -> Response<Full<Bytes>> {
    let mappings = engine.mappings();
    let summaries: Vec<MappingSummary> = mappings.iter().map(|m| m.as_ref().into()).collect();
    json_response(StatusCode::OK, &summaries)
}

/// POST /__admin/mappings - Add one mapping or an array of mappings
pub async fn handle_create(req: Request<Incoming>, engine: &Engine) -> Response<Full<Bytes>> {
    let body = match collect_body(req).await {
        Ok(b) => b,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e),
    };
    let single = !body.trim_ascii_start().starts_with(b"[");
    let models = match MappingModel::parse_many(&body) {
        Ok(models) => models,
        Err(e) => {
            return error_response(StatusCode::BAD_REQUEST, &format!("Invalid mapping JSON: {e}"))
        }
    };

    match engine.register_all(models, true) {
        Ok(registered) => {
            info!("Admin API added {} mapping(s)", registered.len());
            if single {
                let guid = registered.first().map(|m| m.guid());
                let mut status = StatusResponse::new("Mapping added");
                if let Some(guid) = guid {
                    status = status.with_guid(guid);
                }
                json_response(StatusCode::CREATED, &status)
            } else {
                let summaries: Vec<MappingSummary> =
                    registered.iter().map(|m| m.as_ref().into()).collect();
                json_response(StatusCode::CREATED, &summaries)
            }
        }
        Err(e) => server_error_response(e),
    }
}

/// DELETE /__admin/mappings - Remove every mapping
pub fn handle_delete_all(engine: &Engine) -> Response<Full<Bytes>> {
    engine.reset_mappings();
    json_response(StatusCode::OK, &StatusResponse::new("Mappings deleted"))
}

/// GET /__admin/mappings/:guid
pub fn handle_get(guid: Uuid, engine: &Engine) -> Response<Full<Bytes>> {
    match engine.mapping(guid) {
        Some(mapping) => json_response(StatusCode::OK, &MappingSummary::from(mapping.as_ref())),
        None => mapping_not_found(guid),
    }
}

/// PUT /__admin/mappings/:guid - Replace a mapping
pub async fn handle_update(
    guid: Uuid,
    req: Request<Incoming>,
    engine: &Engine,
) -> Response<Full<Bytes>> {
    let body = match collect_body(req).await {
        Ok(b) => b,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e),
    };
    let model: MappingModel = match serde_json::from_slice(&body) {
        Ok(m) => m,
        Err(e) => {
            return error_response(StatusCode::BAD_REQUEST, &format!("Invalid mapping JSON: {e}"))
        }
    };
    match engine.update(guid, model) {
        Ok(mapping) => json_response(
            StatusCode::OK,
            &StatusResponse::new("Mapping updated").with_guid(mapping.guid()),
        ),
        Err(e) => server_error_response(e),
    }
}

/// DELETE /__admin/mappings/:guid
pub fn handle_delete(guid: Uuid, engine: &Engine) -> Response<Full<Bytes>> {
    match engine.remove(guid) {
        Some(_) => json_response(
            StatusCode::OK,
            &StatusResponse::new("Mapping removed").with_guid(guid),
        ),
        None => mapping_not_found(guid),
    }
}

/// POST /__admin/mappings/save - Write every mapping to the mappings directory
pub async fn handle_save(engine: Arc<Engine>) -> Response<Full<Bytes>> {
    match tokio::task::spawn_blocking(move || engine.save_mappings()).await {
        Ok(Ok(count)) => json_response(
            StatusCode::OK,
            &StatusResponse::new(format!("{count} mapping(s) saved")),
        ),
        Ok(Err(e)) => {
            error!("Failed to save mappings: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

fn server_error_response(error: ServerError) -> Response<Full<Bytes>> {
    let status = match &error {
        ServerError::DuplicateMapping(_) => StatusCode::CONFLICT,
        ServerError::MappingNotFound(_) => StatusCode::NOT_FOUND,
        ServerError::Config(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, &error.to_string())
}
