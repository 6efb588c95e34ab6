//! Response templating.
//!
//! Substitutes request values into response bodies and header values. Runs only
//! for responses that enable the transformer.
//!
//! # Supported Template Variables
//!
//! - `{{request.path}}` - The request path
//! - `{{request.url}}` - The absolute request URL
//! - `{{request.method}}` - The HTTP method
//! - `{{request.query.<name>}}` - First query parameter value
//! - `{{request.headers.<name>}}` - First header value (case-insensitive)
//! - `{{request.cookies.<name>}}` - Cookie value
//! - `{{request.body}}` - The raw request body
//! - `{{request.bodyAsJson.<a.b.0>}}` - Value from the parsed JSON body
//! - `{{request.clientIP}}` - Remote address of the caller
//!
//! Unknown variables render as an empty string.
//!
//! # Example
//!
//! ```text
//! Hello world! Your path is {{request.path}}.
//! ```

use crate::request::RequestMessage;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

static TEMPLATE_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_template_regex() -> &'static Regex {
    TEMPLATE_REGEX.get_or_init(|| {
        Regex::new(r"\{\{\s*request\.([a-zA-Z]+)(?:\.([^\s}]+))?\s*\}\}")
            .unwrap_or_else(|e| panic!("template regex is a valid literal: {e}"))
    })
}

/// Resolve a single template variable against the request.
fn lookup(request: &RequestMessage, field: &str, key: Option<&str>) -> Option<String> {
    match (field, key) {
        ("path", None) => Some(request.path.clone()),
        ("url", None) => Some(request.url.clone()),
        ("method", None) => Some(request.method.clone()),
        ("body", None) => Some(String::from_utf8_lossy(&request.body).into_owned()),
        ("clientIP", None) => Some(request.client_ip.clone()),
        ("query", Some(name)) => request.query_values(name).first().cloned(),
        ("headers", Some(name)) => request.header(name).map(str::to_string),
        ("cookies", Some(name)) => request.cookie(name).map(str::to_string),
        ("bodyAsJson", Some(path)) => request
            .body_json()
            .and_then(|json| navigate_json(json, path))
            .map(render_json_value),
        _ => None,
    }
}

/// Follow a dotted path (`a.b.0`) through a JSON document.
fn navigate_json<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn render_json_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Process a template string, substituting variables with request data.
pub fn process_template(template: &str, request: &RequestMessage) -> String {
    get_template_regex()
        .replace_all(template, |caps: &regex::Captures| {
            let field = &caps[1];
            let key = caps.get(2).map(|m| m.as_str());
            lookup(request, field, key).unwrap_or_default()
        })
        .into_owned()
}
