use super::{FaultKind, FaultModel};
use crate::mapping::{HeaderValues, ResponseModel};
use base64::Engine;
use serde::Serialize;
use std::time::Duration;

/// Fluent builder for a mapping's response.
///
/// Setters overwrite: the last status setter wins, a header set twice keeps the
/// later value, and each body setter replaces any earlier body.
///
/// ```
/// use mockwire::response::ResponseBuilder;
///
/// let response = ResponseBuilder::new()
///     .with_not_found()
///     .with_success()
///     .with_header("Content-Type", "text/plain")
///     .with_body("ok")
///     .build();
/// assert_eq!(response.status_code, Some(200));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ResponseBuilder {
    model: ResponseModel,
}

impl ResponseBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status_code(mut self, status: u16) -> Self {
        self.model.status_code = Some(status);
        self
    }

    pub fn with_success(self) -> Self {
        self.with_status_code(200)
    }

    pub fn with_not_found(self) -> Self {
        self.with_status_code(404)
    }

    /// Set a header, replacing any existing header of the same name (case-insensitive).
    pub fn with_header(mut self, name: &str, value: impl Into<HeaderValues>) -> Self {
        self.model
            .headers
            .retain(|existing, _| !existing.eq_ignore_ascii_case(name));
        self.model.headers.insert(name.to_string(), value.into());
        self
    }

    pub fn with_headers<I, K, V>(self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<HeaderValues>,
    {
        headers
            .into_iter()
            .fold(self, |builder, (name, value)| builder.with_header(name.as_ref(), value))
    }

    fn clear_body(&mut self) {
        self.model.body = None;
        self.model.body_as_json = None;
        self.model.body_as_bytes = None;
        self.model.body_as_file = None;
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.clear_body();
        self.model.body = Some(body.into());
        self
    }

    /// Serialize `body` as the JSON response body. Values that fail to serialize
    /// leave the body unset.
    pub fn with_body_as_json<T: Serialize>(mut self, body: &T) -> Self {
        self.clear_body();
        self.model.body_as_json = serde_json::to_value(body).ok();
        self
    }

    pub fn with_body_as_bytes(mut self, body: impl AsRef<[u8]>) -> Self {
        self.clear_body();
        self.model.body_as_bytes =
            Some(base64::engine::general_purpose::STANDARD.encode(body.as_ref()));
        self
    }

    /// Serve the contents of a file, resolved against the files directory when relative.
    pub fn with_body_from_file(mut self, path: impl Into<String>) -> Self {
        self.clear_body();
        self.model.body_as_file = Some(path.into());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.model.delay = Some(delay.as_millis().min(u64::MAX as u128) as u64);
        self
    }

    pub fn with_fault(mut self, kind: FaultKind, probability: f64) -> Self {
        self.model.fault = Some(FaultModel::new(kind, probability));
        self
    }

    /// Enable `{{request.*}}` substitution in the body and header values.
    pub fn with_transformer(mut self) -> Self {
        self.model.use_transformer = true;
        self
    }

    /// Forward matching requests to `base_url` instead of rendering a response.
    pub fn with_proxy(mut self, base_url: impl Into<String>) -> Self {
        self.model.proxy_url = Some(base_url.into());
        self
    }

    pub fn build(self) -> ResponseModel {
        self.model
    }
}

impl From<ResponseBuilder> for ResponseModel {
    fn from(builder: ResponseBuilder) -> Self {
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_last_status_setter_wins() {
        let response = ResponseBuilder::new()
            .with_success()
            .with_not_found()
            .build();
        assert_eq!(response.status_code, Some(404));

        let response = ResponseBuilder::new()
            .with_status_code(500)
            .with_success()
            .build();
        assert_eq!(response.status_code, Some(200));
    }

    #[test]
    fn test_header_overwrite_is_case_insensitive() {
        let response = ResponseBuilder::new()
            .with_header("X-Test", "one")
            .with_header("x-test", "two")
            .build();
        assert_eq!(response.headers.len(), 1);
        assert_eq!(response.headers["x-test"], HeaderValues::from("two"));
    }

    #[test]
    fn test_with_headers_multi_value() {
        let response = ResponseBuilder::new()
            .with_headers([("Set-Cookie", vec!["a=1".to_string(), "b=2".to_string()])])
            .build();
        assert_eq!(response.headers["Set-Cookie"].values(), vec!["a=1", "b=2"]);
    }

    #[test]
    fn test_body_setters_replace_each_other() {
        let response = ResponseBuilder::new()
            .with_body("text")
            .with_body_as_json(&json!({"a": 1}))
            .build();
        assert_eq!(response.body, None);
        assert_eq!(response.body_as_json, Some(json!({"a": 1})));

        let response = ResponseBuilder::new()
            .with_body_as_json(&json!({"a": 1}))
            .with_body_as_bytes([0u8, 1, 2])
            .build();
        assert_eq!(response.body_as_json, None);
        assert_eq!(response.body_as_bytes.as_deref(), Some("AAEC"));
        assert!(response.validate().is_ok());
    }

    #[test]
    fn test_delay_fault_and_transformer() {
        let response = ResponseBuilder::new()
            .with_delay(Duration::from_millis(250))
            .with_fault(FaultKind::ConnectionClose, 0.5)
            .with_transformer()
            .build();
        assert_eq!(response.delay, Some(250));
        assert_eq!(
            response.fault,
            Some(FaultModel::new(FaultKind::ConnectionClose, 0.5))
        );
        assert!(response.use_transformer);
    }
}
