//! Admin REST API, served under `/__admin` on every mock endpoint.
//!
//! - Mappings: list, add (single or array), get, replace, delete, save to disk
//! - Scenarios: list and reset
//! - Settings: read and partially update the runtime settings
//! - Requests: list, get and clear the request log
//! - Health and full reset
//!
//! When credentials are configured every admin request must carry a matching
//! basic `Authorization` header.

mod auth;
mod handlers;
mod router;
mod types;

pub use auth::Credentials;
pub use types::{ErrorDetail, ErrorResponse, MappingSummary, StatusResponse};

use crate::server::Engine;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response};
use std::sync::Arc;

/// Path prefix of every admin route.
pub const ADMIN_PREFIX: &str = "/__admin";

pub fn is_admin_path(path: &str) -> bool {
    path.strip_prefix(ADMIN_PREFIX)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

pub struct AdminApi {
    engine: Arc<Engine>,
    credentials: Option<Credentials>,
}

impl AdminApi {
    pub fn new(engine: Arc<Engine>, credentials: Option<Credentials>) -> Self {
        Self {
            engine,
            credentials,
        }
    }

    pub async fn handle(&self, req: Request<Incoming>) -> Response<Full<Bytes>> {
        router::route_request(req, self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_admin_path() {
        assert!(is_admin_path("/__admin"));
        assert!(is_admin_path("/__admin/mappings"));
        assert!(!is_admin_path("/__administrator"));
        assert!(!is_admin_path("/api/__admin"));
    }
}
