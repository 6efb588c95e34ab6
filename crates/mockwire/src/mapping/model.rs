//! Mapping document wire format.
//!
//! These are the plain records that fluent builders finalize into, that static
//! mapping files and the admin API carry as JSON, and that recording produces.
//!
//! ```json
//! {
//!   "guid": "...",
//!   "priority": 1,
//!   "request": { "path": "/exact", "methods": ["GET"] },
//!   "response": { "statusCode": 200, "body": "ok" }
//! }
//! ```

use crate::error::ConfigError;
use crate::matchers::MatcherDefinition;
use crate::response::FaultModel;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

fn is_false(value: &bool) -> bool {
    !*value
}

/// A stored rule pairing a request predicate with a response definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingModel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Lower number means higher precedence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when_state_is: Option<String>,
    #[serde(
        default,
        alias = "willSetStateTo",
        skip_serializing_if = "Option::is_none"
    )]
    pub set_state_to: Option<String>,
    /// Selection weight among otherwise tied mappings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default)]
    pub request: RequestModel,
    #[serde(default)]
    pub response: ResponseModel,
}

impl MappingModel {
    /// Parse a document holding either one mapping or an array of mappings.
    pub fn parse_many(json: &[u8]) -> Result<Vec<MappingModel>, serde_json::Error> {
        match serde_json::from_slice::<Value>(json)? {
            Value::Array(items) => items.into_iter().map(serde_json::from_value).collect(),
            other => serde_json::from_value(other).map(|m| vec![m]),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scenario.is_none() && (self.when_state_is.is_some() || self.set_state_to.is_some())
        {
            return Err(ConfigError::InvalidMapping(
                "whenStateIs and setStateTo require a scenario".to_string(),
            ));
        }
        if let Some(weight) = self.weight {
            if !weight.is_finite() || weight <= 0.0 {
                return Err(ConfigError::InvalidMapping(format!(
                    "weight must be a positive number, got {weight}"
                )));
            }
        }
        self.response.validate()
    }
}

/// A value condition: a bare wildcard pattern or an explicit matcher list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueCondition {
    Pattern(String),
    Matchers { matchers: Vec<MatcherDefinition> },
}

impl ValueCondition {
    pub fn matchers(&self) -> Vec<MatcherDefinition> {
        match self {
            ValueCondition::Pattern(pattern) => vec![MatcherDefinition::wildcard(pattern.clone())],
            ValueCondition::Matchers { matchers } => matchers.clone(),
        }
    }
}

impl From<MatcherDefinition> for ValueCondition {
    fn from(matcher: MatcherDefinition) -> Self {
        ValueCondition::Matchers {
            matchers: vec![matcher],
        }
    }
}

/// Condition on a named attribute (query parameter, header or cookie).
///
/// No matchers means the attribute only has to be present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedCondition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matchers: Vec<MatcherDefinition>,
    /// Compare the attribute name case-insensitively
    #[serde(default, skip_serializing_if = "is_false")]
    pub ignore_case: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub reject_on_match: bool,
}

impl NamedCondition {
    pub fn new(name: impl Into<String>, matchers: Vec<MatcherDefinition>) -> Self {
        Self {
            name: name.into(),
            matchers,
            ignore_case: false,
            reject_on_match: false,
        }
    }
}

/// Body condition, either a single matcher or a list of alternatives.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BodyCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matcher: Option<MatcherDefinition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matchers: Vec<MatcherDefinition>,
}

impl BodyCondition {
    pub fn all_matchers(&self) -> impl Iterator<Item = &MatcherDefinition> {
        self.matcher.iter().chain(self.matchers.iter())
    }
}

/// Request predicate; conditions on different attributes are combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestModel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<ValueCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<ValueCondition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<NamedCondition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<NamedCondition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cookies: Vec<NamedCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<BodyCondition>,
    #[serde(
        default,
        rename = "clientIP",
        skip_serializing_if = "Option::is_none"
    )]
    pub client_ip: Option<ValueCondition>,
}

/// One header value or several.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderValues {
    One(String),
    Many(Vec<String>),
}

impl HeaderValues {
    pub fn values(&self) -> Vec<&str> {
        match self {
            HeaderValues::One(value) => vec![value.as_str()],
            HeaderValues::Many(values) => values.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for HeaderValues {
    fn from(value: &str) -> Self {
        HeaderValues::One(value.to_string())
    }
}

impl From<Vec<String>> for HeaderValues {
    fn from(values: Vec<String>) -> Self {
        match <[String; 1]>::try_from(values) {
            Ok([single]) => HeaderValues::One(single),
            Err(values) => HeaderValues::Many(values),
        }
    }
}

/// Response definition. At most one body source may be set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseModel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, HeaderValues>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_as_json: Option<Value>,
    /// Base64 encoded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_as_bytes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_as_file: Option<String>,
    /// Delay in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fault: Option<FaultModel>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub use_transformer: bool,
    /// Forward matching requests to this base URL instead of rendering
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<String>,
}

impl ResponseModel {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(status) = self.status_code {
            if !(100..=999).contains(&status) {
                return Err(ConfigError::InvalidMapping(format!(
                    "invalid status code {status}"
                )));
            }
        }
        let body_sources = [
            self.body.is_some(),
            self.body_as_json.is_some(),
            self.body_as_bytes.is_some(),
            self.body_as_file.is_some(),
        ];
        if body_sources.iter().filter(|set| **set).count() > 1 {
            return Err(ConfigError::InvalidMapping(
                "only one of body, bodyAsJson, bodyAsBytes and bodyAsFile may be set".to_string(),
            ));
        }
        if let Some(encoded) = &self.body_as_bytes {
            base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .map_err(|e| ConfigError::InvalidMapping(format!("bodyAsBytes: {e}")))?;
        }
        if let Some(fault) = &self.fault {
            let p = fault.probability();
            if !(0.0..=1.0).contains(&p) {
                return Err(ConfigError::InvalidMapping(format!(
                    "fault probability must be within [0, 1], got {p}"
                )));
            }
        }
        Ok(())
    }
}
