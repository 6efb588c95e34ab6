//! Basic authentication for the Admin API.

use super::types::build_response_with_headers;
use base64::Engine;
use bytes::Bytes;
use http_body_util::Full;
use hyper::header::AUTHORIZATION;
use hyper::{HeaderMap, Response, StatusCode};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Whether `headers` carry a matching `Authorization: Basic` header.
    pub fn authorize(&self, headers: &HeaderMap) -> bool {
        let Some(value) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) else {
            return false;
        };
        let Some(encoded) = value
            .strip_prefix("Basic ")
            .or_else(|| value.strip_prefix("basic "))
        else {
            return false;
        };
        let Ok(decoded) = base64::engine::general_purpose::STANDARD.decode(encoded.trim()) else {
            return false;
        };
        let Ok(decoded) = String::from_utf8(decoded) else {
            return false;
        };
        match decoded.split_once(':') {
            Some((username, password)) => {
                username == self.username && password == self.password
            }
            None => false,
        }
    }
}

pub fn unauthorized() -> Response<Full<Bytes>> {
    build_response_with_headers(
        StatusCode::UNAUTHORIZED,
        [
            ("WWW-Authenticate", "Basic realm=\"mockwire\""),
            ("Content-Type", "application/json"),
        ],
        r#"{"errors":[{"code":"401","message":"Unauthorized"}]}"#,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_authorize() {
        let credentials = Credentials::new("admin", "secret");
        let encoded = base64::engine::general_purpose::STANDARD.encode("admin:secret");

        assert!(credentials.authorize(&headers_with(&format!("Basic {encoded}"))));
        assert!(!credentials.authorize(&HeaderMap::new()));
        assert!(!credentials.authorize(&headers_with("Bearer token")));

        let wrong = base64::engine::general_purpose::STANDARD.encode("admin:wrong");
        assert!(!credentials.authorize(&headers_with(&format!("Basic {wrong}"))));
        assert!(!credentials.authorize(&headers_with("Basic !!not-base64!!")));
    }

    #[test]
    fn test_password_may_contain_colon() {
        let credentials = Credentials::new("admin", "a:b");
        let encoded = base64::engine::general_purpose::STANDARD.encode("admin:a:b");
        assert!(credentials.authorize(&headers_with(&format!("Basic {encoded}"))));
    }

    #[test]
    fn test_unauthorized_response() {
        let resp = unauthorized();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(resp.headers().contains_key("www-authenticate"));
    }
}
