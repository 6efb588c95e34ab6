//! Route dispatch logic for the Admin API.

use super::auth::unauthorized;
use super::handlers::{mappings, requests, scenarios, settings, system};
use super::types::not_found;
use super::{AdminApi, ADMIN_PREFIX};
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Method, Request, Response};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Parsed admin route, relative to `/__admin`
#[derive(Debug, PartialEq)]
enum AdminRoute {
    /// GET/POST/DELETE /mappings
    Mappings,
    /// POST /mappings/save
    SaveMappings,
    /// GET/PUT/DELETE /mappings/:guid
    Mapping(Uuid),
    /// GET/DELETE /scenarios
    Scenarios,
    /// POST /scenarios/reset
    ResetScenarios,
    /// PUT/POST /scenarios/:name/reset
    ResetScenario(String),
    /// GET/PUT/POST /settings
    Settings,
    /// GET/DELETE /requests (alias /requestlogs)
    Requests,
    /// GET /requests/:guid
    Request(Uuid),
    /// POST /reset
    Reset,
    /// GET /health
    Health,
}

impl AdminRoute {
    fn parse(segments: &[&str]) -> Option<Self> {
        match segments {
            ["mappings"] => Some(AdminRoute::Mappings),
            ["mappings", "save"] => Some(AdminRoute::SaveMappings),
            ["mappings", guid] => guid.parse().ok().map(AdminRoute::Mapping),
            ["scenarios"] => Some(AdminRoute::Scenarios),
            ["scenarios", "reset"] => Some(AdminRoute::ResetScenarios),
            ["scenarios", name, "reset"] => Some(AdminRoute::ResetScenario(
                urlencoding::decode(name).ok()?.into_owned(),
            )),
            ["settings"] => Some(AdminRoute::Settings),
            ["requests"] | ["requestlogs"] => Some(AdminRoute::Requests),
            ["requests", guid] | ["requestlogs", guid] => {
                guid.parse().ok().map(AdminRoute::Request)
            }
            ["reset"] => Some(AdminRoute::Reset),
            ["health"] => Some(AdminRoute::Health),
            _ => None,
        }
    }
}

/// Main request router
pub async fn route_request(req: Request<Incoming>, api: &AdminApi) -> Response<Full<Bytes>> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    if let Some(credentials) = &api.credentials {
        if !credentials.authorize(req.headers()) {
            warn!("Admin API: unauthorized {} {}", method, path);
            return unauthorized();
        }
    }

    debug!("Admin API: {} {}", method, path);

    let relative = path.strip_prefix(ADMIN_PREFIX).unwrap_or(&path);
    let segments: Vec<&str> = relative.split('/').filter(|s| !s.is_empty()).collect();
    let Some(route) = AdminRoute::parse(&segments) else {
        return not_found();
    };

    let engine = &api.engine;
    match (&method, route) {
        // /mappings
        (&Method::GET, AdminRoute::Mappings) => mappings::handle_list(engine),
        (&Method::POST, AdminRoute::Mappings) => mappings::handle_create(req, engine).await,
        (&Method::DELETE, AdminRoute::Mappings) => mappings::handle_delete_all(engine),
        (&Method::POST, AdminRoute::SaveMappings) => {
            mappings::handle_save(Arc::clone(engine)).await
        }

        // /mappings/:guid
        (&Method::GET, AdminRoute::Mapping(guid)) => mappings::handle_get(guid, engine),
        (&Method::PUT, AdminRoute::Mapping(guid)) => {
            mappings::handle_update(guid, req, engine).await
        }
        (&Method::DELETE, AdminRoute::Mapping(guid)) => mappings::handle_delete(guid, engine),

        // /scenarios
        (&Method::GET, AdminRoute::Scenarios) => scenarios::handle_list(engine),
        (&Method::POST, AdminRoute::ResetScenarios) | (&Method::DELETE, AdminRoute::Scenarios) => {
            scenarios::handle_reset(engine)
        }
        (&Method::PUT, AdminRoute::ResetScenario(name))
        | (&Method::POST, AdminRoute::ResetScenario(name)) => {
            scenarios::handle_reset_one(&name, engine)
        }

        // /settings
        (&Method::GET, AdminRoute::Settings) => settings::handle_get(engine),
        (&Method::PUT, AdminRoute::Settings) | (&Method::POST, AdminRoute::Settings) => {
            settings::handle_update(req, engine).await
        }

        // /requests
        (&Method::GET, AdminRoute::Requests) => requests::handle_list(engine),
        (&Method::DELETE, AdminRoute::Requests) => requests::handle_clear(engine),
        (&Method::GET, AdminRoute::Request(guid)) => requests::handle_get(guid, engine),

        (&Method::POST, AdminRoute::Reset) => system::handle_reset(engine),
        (&Method::GET, AdminRoute::Health) => system::handle_health(engine),

        _ => not_found(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_route_parse() {
        assert_eq!(AdminRoute::parse(&["mappings"]), Some(AdminRoute::Mappings));
        assert_eq!(
            AdminRoute::parse(&["mappings", "save"]),
            Some(AdminRoute::SaveMappings)
        );
        let guid = Uuid::new_v4();
        let guid_str = guid.to_string();
        assert_eq!(
            AdminRoute::parse(&["mappings", guid_str.as_str()]),
            Some(AdminRoute::Mapping(guid))
        );
        assert_eq!(
            AdminRoute::parse(&["scenarios", "reset"]),
            Some(AdminRoute::ResetScenarios)
        );
        assert_eq!(
            AdminRoute::parse(&["scenarios", "todo%20list", "reset"]),
            Some(AdminRoute::ResetScenario("todo list".to_string()))
        );
        assert_eq!(
            AdminRoute::parse(&["requestlogs"]),
            Some(AdminRoute::Requests)
        );
        assert_eq!(AdminRoute::parse(&["settings"]), Some(AdminRoute::Settings));

        // Invalid routes
        assert_eq!(AdminRoute::parse(&["mappings", "not-a-guid"]), None);
        assert_eq!(AdminRoute::parse(&["unknown"]), None);
        assert_eq!(AdminRoute::parse(&[]), None);
    }
}
