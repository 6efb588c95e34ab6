//! Resolve a response definition against the originating request.
//!
//! Rendering is pure apart from reading body files. Delay and fault decisions
//! are carried on the result and applied by the connection handler after the
//! registry lock is released.

use super::template::process_template;
use super::FaultModel;
use crate::error::PersistenceError;
use crate::mapping::ResponseModel;
use crate::persistence::FileSystemHandler;
use crate::request::RequestMessage;
use base64::Engine;
use bytes::Bytes;
use hyper::StatusCode;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Invalid status code {0}")]
    InvalidStatus(u16),
    #[error("Invalid bodyAsBytes: {0}")]
    InvalidBytes(String),
    #[error("Failed to serialize bodyAsJson: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to read body file: {0}")]
    File(#[from] PersistenceError),
}

/// A fully resolved response ready to be written.
#[derive(Debug, Clone)]
pub struct RenderedResponse {
    pub status: StatusCode,
    /// Header name/value pairs in definition order; repeated names are kept
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub delay: Option<Duration>,
    pub fault: Option<FaultModel>,
}

impl RenderedResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// The file `model` takes its body from, when `bodyAsFile` is the body in effect.
/// Relative paths resolve against `files_dir`.
pub fn body_file_path(model: &ResponseModel, files_dir: &Path) -> Option<PathBuf> {
    if model.body.is_some() || model.body_as_json.is_some() || model.body_as_bytes.is_some() {
        return None;
    }
    let path = Path::new(model.body_as_file.as_ref()?);
    Some(if path.is_absolute() {
        path.to_path_buf()
    } else {
        files_dir.join(path)
    })
}

/// Render `model` for `request`. Relative `bodyAsFile` paths resolve against `files_dir`.
pub fn render(
    model: &ResponseModel,
    request: &RequestMessage,
    files: &dyn FileSystemHandler,
    files_dir: &Path,
) -> Result<RenderedResponse, RenderError> {
    let status_code = model.status_code.unwrap_or(200);
    let status =
        StatusCode::from_u16(status_code).map_err(|_| RenderError::InvalidStatus(status_code))?;

    let transform = |text: &str| {
        if model.use_transformer {
            process_template(text, request)
        } else {
            text.to_string()
        }
    };

    let mut headers: Vec<(String, String)> = model
        .headers
        .iter()
        .flat_map(|(name, values)| {
            values
                .values()
                .into_iter()
                .map(|value| (name.clone(), transform(value)))
                .collect::<Vec<_>>()
        })
        .collect();

    let body = if let Some(text) = &model.body {
        Bytes::from(transform(text))
    } else if let Some(json) = &model.body_as_json {
        if !headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case("content-type"))
        {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }
        Bytes::from(transform(&serde_json::to_string(json)?))
    } else if let Some(encoded) = &model.body_as_bytes {
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map(Bytes::from)
            .map_err(|e| RenderError::InvalidBytes(e.to_string()))?
    } else if let Some(path) = body_file_path(model, files_dir) {
        Bytes::from(files.read_file(&path)?)
    } else {
        Bytes::new()
    };

    Ok(RenderedResponse {
        status,
        headers,
        body,
        delay: model.delay.map(Duration::from_millis),
        fault: model.fault.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::LocalFileSystemHandler;
    use crate::response::{FaultKind, ResponseBuilder};
    use serde_json::json;
    use tempfile::TempDir;

    fn render_simple(model: &ResponseModel, request: &RequestMessage) -> RenderedResponse {
        render(model, request, &LocalFileSystemHandler, Path::new(".")).unwrap()
    }

    #[test]
    fn test_defaults_to_200_empty() {
        let rendered = render_simple(&ResponseModel::default(), &RequestMessage::new("GET", "/"));
        assert_eq!(rendered.status, StatusCode::OK);
        assert!(rendered.body.is_empty());
        assert!(rendered.delay.is_none());
    }

    #[test]
    fn test_templating_only_when_enabled() {
        let request = RequestMessage::new("GET", "/foo_path");
        let plain = ResponseBuilder::new().with_body("path={{request.path}}").build();
        assert_eq!(
            render_simple(&plain, &request).body,
            Bytes::from_static(b"path={{request.path}}")
        );

        let templated = ResponseBuilder::new()
            .with_body("path={{request.path}}")
            .with_header("X-Method", "{{request.method}}")
            .with_transformer()
            .build();
        let rendered = render_simple(&templated, &request);
        assert_eq!(rendered.body, Bytes::from_static(b"path=/foo_path"));
        assert_eq!(rendered.header("x-method"), Some("GET"));
    }

    #[test]
    fn test_json_body_sets_content_type() {
        let model = ResponseBuilder::new()
            .with_body_as_json(&json!({"ok": true}))
            .build();
        let rendered = render_simple(&model, &RequestMessage::new("GET", "/"));
        assert_eq!(rendered.header("content-type"), Some("application/json"));
        assert_eq!(rendered.body, Bytes::from_static(br#"{"ok":true}"#));

        let explicit = ResponseBuilder::new()
            .with_header("Content-Type", "application/vnd.api+json")
            .with_body_as_json(&json!([]))
            .build();
        let rendered = render_simple(&explicit, &RequestMessage::new("GET", "/"));
        assert_eq!(rendered.headers.len(), 1);
    }

    #[test]
    fn test_bytes_and_file_bodies() {
        let model = ResponseBuilder::new().with_body_as_bytes([1u8, 2, 3]).build();
        let rendered = render_simple(&model, &RequestMessage::new("GET", "/"));
        assert_eq!(rendered.body, Bytes::from_static(&[1, 2, 3]));

        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("hello.txt"), "from file").unwrap();
        let model = ResponseBuilder::new().with_body_from_file("hello.txt").build();
        let rendered = render(
            &model,
            &RequestMessage::new("GET", "/"),
            &LocalFileSystemHandler,
            dir.path(),
        )
        .unwrap();
        assert_eq!(rendered.body, Bytes::from_static(b"from file"));

        let missing = ResponseBuilder::new().with_body_from_file("nope.txt").build();
        let err = render(
            &missing,
            &RequestMessage::new("GET", "/"),
            &LocalFileSystemHandler,
            dir.path(),
        )
        .unwrap_err();
        assert!(matches!(err, RenderError::File(_)));
    }

    #[test]
    fn test_delay_and_fault_carried() {
        let model = ResponseBuilder::new()
            .with_delay(Duration::from_millis(40))
            .with_fault(FaultKind::EmptyResponse, 1.0)
            .build();
        let rendered = render_simple(&model, &RequestMessage::new("GET", "/"));
        assert_eq!(rendered.delay, Some(Duration::from_millis(40)));
        assert_eq!(rendered.fault.unwrap().kind, FaultKind::EmptyResponse);
    }
}
