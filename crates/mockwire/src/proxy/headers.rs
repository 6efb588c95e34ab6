//! Header helpers for mock and proxied responses.
//!
//! The fault marker header, the hop-by-hop list stripped when forwarding, and an
//! extension trait for inserting headers without runtime `.parse().unwrap()` calls.

use hyper::header::{HeaderName, HeaderValue};
use hyper::Response;

pub static X_MOCKWIRE_FAULT: HeaderName = HeaderName::from_static("x-mockwire-fault");

/// Connection-scoped headers that are never forwarded in either direction.
pub const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// Headers not copied onto the outbound upstream request.
pub fn is_excluded_outbound(name: &str) -> bool {
    is_hop_by_hop(name)
        || name.eq_ignore_ascii_case("host")
        || name.eq_ignore_ascii_case("content-length")
}

/// Extension trait for inserting mockwire headers into responses.
pub trait MockwireHeadersExt {
    /// Insert a header with a dynamic value.
    /// Returns false if the value couldn't be converted to a valid header value.
    fn set_header_value(&mut self, name: &HeaderName, value: &str) -> bool;

    /// Append a header by name and value, skipping invalid pairs.
    fn append_header(&mut self, name: &str, value: &str) -> bool;
}

impl<B> MockwireHeadersExt for Response<B> {
    fn set_header_value(&mut self, name: &HeaderName, value: &str) -> bool {
        match HeaderValue::from_str(value) {
            Ok(header_value) => {
                self.headers_mut().insert(name.clone(), header_value);
                true
            }
            Err(_) => false,
        }
    }

    fn append_header(&mut self, name: &str, value: &str) -> bool {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers_mut().append(name, value);
                true
            }
            _ => false,
        }
    }
}
