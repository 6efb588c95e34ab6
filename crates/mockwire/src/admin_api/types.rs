//! Response types and helpers for the Admin API.

use crate::mapping::{Mapping, MappingModel};
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::Serialize;
use uuid::Uuid;

/// Error response format
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub errors: Vec<ErrorDetail>,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// A registered mapping as listed by `GET /__admin/mappings`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingSummary<'a> {
    #[serde(flatten)]
    pub model: &'a MappingModel,
    pub usage_count: u64,
}

impl<'a> From<&'a Mapping> for MappingSummary<'a> {
    fn from(mapping: &'a Mapping) -> Self {
        Self {
            model: mapping.model(),
            usage_count: mapping.usage_count(),
        }
    }
}

/// Body of successful mutations.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guid: Option<Uuid>,
}

impl StatusResponse {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            guid: None,
        }
    }

    pub fn with_guid(mut self, guid: Uuid) -> Self {
        self.guid = Some(guid);
        self
    }
}

// =============================================================================
// Response helper functions
// =============================================================================

/// Create a JSON response
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_string_pretty(body).unwrap_or_else(|_| "{}".to_string());
    build_response_with_headers(status, [("Content-Type", "application/json")], json)
}

/// Build an HTTP response with headers.
///
/// Falls back to a minimal 500 response if `Response::builder()` rejects the
/// headers.
pub fn build_response_with_headers(
    status: StatusCode,
    headers: impl IntoIterator<Item = (impl AsRef<str>, impl AsRef<str>)>,
    body: impl Into<Bytes>,
) -> Response<Full<Bytes>> {
    let mut builder = Response::builder().status(status);
    for (key, value) in headers {
        builder = builder.header(key.as_ref(), value.as_ref());
    }
    builder.body(Full::new(body.into())).unwrap_or_else(|_| {
        let mut response = Response::new(Full::new(Bytes::from("Internal Server Error")));
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        response
    })
}

/// Create an error response
pub fn error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    let error = ErrorResponse {
        errors: vec![ErrorDetail {
            code: status.as_str().to_string(),
            message: message.to_string(),
        }],
    };
    json_response(status, &error)
}

/// Create a not found response
pub fn not_found() -> Response<Full<Bytes>> {
    error_response(StatusCode::NOT_FOUND, "Not Found")
}

pub fn mapping_not_found(guid: Uuid) -> Response<Full<Bytes>> {
    error_response(StatusCode::NOT_FOUND, &format!("Mapping {guid} not found"))
}

/// Collect request body into bytes
pub async fn collect_body(req: Request<Incoming>) -> Result<Bytes, String> {
    use http_body_util::BodyExt;
    req.collect()
        .await
        .map(|c| c.to_bytes())
        .map_err(|e| format!("Failed to read request body: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{MappingBuilder, MappingRegistry};
    use crate::request::RequestBuilder;
    use crate::response::ResponseBuilder;

    #[test]
    fn test_error_response_format() {
        let resp = error_response(StatusCode::BAD_REQUEST, "Test error");
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            resp.headers().get("Content-Type").unwrap(),
            "application/json"
        );
    }

    #[test]
    fn test_error_response_body() {
        let error = ErrorResponse {
            errors: vec![ErrorDetail {
                code: "409".to_string(),
                message: "Mapping exists".to_string(),
            }],
        };
        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json["errors"][0]["code"], "409");
        assert_eq!(json["errors"][0]["message"], "Mapping exists");
    }

    #[test]
    fn test_not_found_response() {
        let resp = not_found();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_mapping_summary_flattens_model() {
        let mut registry = MappingRegistry::new();
        let mapping = registry
            .register(
                MappingBuilder::given(RequestBuilder::new().with_path("/ping"))
                    .with_title("ping")
                    .respond_with(ResponseBuilder::new().with_body("pong")),
            )
            .unwrap();

        let json = serde_json::to_value(MappingSummary::from(mapping.as_ref())).unwrap();
        assert_eq!(json["title"], "ping");
        assert_eq!(json["usageCount"], 0);
        assert_eq!(json["guid"], mapping.guid().to_string());
    }
}
