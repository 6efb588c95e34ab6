//! JSON body matchers.
//!
//! - `JsonMatcher` - structural equality, or subset matching in partial mode
//! - `JsonPathMatcher` - RFC 9535 JSONPath that must select at least one node

use super::matcher::{MatchBehaviour, MatchScore, Matcher};
use crate::error::ConfigError;
use serde_json::Value;
use serde_json_path::JsonPath;

/// Structural comparison of the parsed body against an expected document.
///
/// In partial mode, objects in the body may carry extra keys and the score is the
/// fraction of expected leaves found, which lets partial mapping rank near misses.
#[derive(Debug, Clone)]
pub struct JsonMatcher {
    expected: Value,
    partial: bool,
    ignore_case: bool,
    behaviour: MatchBehaviour,
}

impl JsonMatcher {
    pub fn new(expected: Value) -> Self {
        Self {
            expected,
            partial: false,
            ignore_case: false,
            behaviour: MatchBehaviour::AcceptOnMatch,
        }
    }

    pub fn partial(expected: Value) -> Self {
        Self {
            partial: true,
            ..Self::new(expected)
        }
    }

    pub fn with_options(mut self, ignore_case: bool, behaviour: MatchBehaviour) -> Self {
        self.ignore_case = ignore_case;
        self.behaviour = behaviour;
        self
    }

    pub fn expected(&self) -> &Value {
        &self.expected
    }

    pub fn is_partial(&self) -> bool {
        self.partial
    }

    /// Score an already parsed document.
    pub fn score_value(&self, actual: &Value) -> f64 {
        if self.partial {
            let (matched, total) = partial_leaves(actual, &self.expected, self.ignore_case);
            if total == 0 {
                return MatchScore::PERFECT;
            }
            matched as f64 / total as f64
        } else {
            MatchScore::from_bool(json_deep_equals(actual, &self.expected, self.ignore_case))
        }
    }
}

impl Matcher for JsonMatcher {
    fn name(&self) -> &'static str {
        if self.partial {
            "JsonPartialMatcher"
        } else {
            "JsonMatcher"
        }
    }

    fn behaviour(&self) -> MatchBehaviour {
        self.behaviour
    }

    fn raw_score(&self, input: &str) -> f64 {
        match serde_json::from_str::<Value>(input) {
            Ok(actual) => self.score_value(&actual),
            Err(_) => MatchScore::MISMATCH,
        }
    }
}

fn strings_equal(a: &str, b: &str, ignore_case: bool) -> bool {
    if ignore_case {
        a.to_lowercase() == b.to_lowercase()
    } else {
        a == b
    }
}

/// Strict structural equality: same keys, same array lengths.
fn json_deep_equals(actual: &Value, expected: &Value, ignore_case: bool) -> bool {
    match (actual, expected) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::String(a), Value::String(b)) => strings_equal(a, b, ignore_case),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len()
                && a.iter()
                    .zip(b.iter())
                    .all(|(x, y)| json_deep_equals(x, y, ignore_case))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && b.iter().all(|(key, expected_val)| {
                    a.get(key).is_some_and(|actual_val| {
                        json_deep_equals(actual_val, expected_val, ignore_case)
                    })
                })
        }
        _ => false,
    }
}

/// Count `(matched, total)` expected leaves present in `actual`.
fn partial_leaves(actual: &Value, expected: &Value, ignore_case: bool) -> (usize, usize) {
    match expected {
        Value::Object(expected_map) => {
            let actual_map = actual.as_object();
            expected_map
                .iter()
                .map(|(key, expected_val)| {
                    match actual_map.and_then(|m| m.get(key)) {
                        Some(actual_val) => partial_leaves(actual_val, expected_val, ignore_case),
                        None => (0, leaf_count(expected_val)),
                    }
                })
                .fold((0, 0), |(m, t), (dm, dt)| (m + dm, t + dt))
        }
        Value::Array(expected_items) => {
            let actual_items = actual.as_array();
            expected_items
                .iter()
                .enumerate()
                .map(|(i, expected_val)| match actual_items.and_then(|a| a.get(i)) {
                    Some(actual_val) => partial_leaves(actual_val, expected_val, ignore_case),
                    None => (0, leaf_count(expected_val)),
                })
                .fold((0, 0), |(m, t), (dm, dt)| (m + dm, t + dt))
        }
        leaf => (
            usize::from(json_deep_equals(actual, leaf, ignore_case)),
            1,
        ),
    }
}

fn leaf_count(value: &Value) -> usize {
    match value {
        Value::Object(map) => map.values().map(leaf_count).sum(),
        Value::Array(items) => items.iter().map(leaf_count).sum(),
        _ => 1,
    }
}

/// Matches when the JSONPath query selects at least one node in the body.
#[derive(Debug, Clone)]
pub struct JsonPathMatcher {
    sources: Vec<String>,
    paths: Vec<JsonPath>,
    behaviour: MatchBehaviour,
}

impl JsonPathMatcher {
    pub fn new(path: impl Into<String>) -> Result<Self, ConfigError> {
        Self::with_patterns(vec![path.into()], MatchBehaviour::AcceptOnMatch)
    }

    pub fn with_patterns(
        sources: Vec<String>,
        behaviour: MatchBehaviour,
    ) -> Result<Self, ConfigError> {
        let paths = sources
            .iter()
            .map(|source| {
                JsonPath::parse(source).map_err(|e| ConfigError::InvalidJsonPath {
                    pattern: source.clone(),
                    message: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            sources,
            paths,
            behaviour,
        })
    }

    pub fn patterns(&self) -> &[String] {
        &self.sources
    }

    pub fn score_value(&self, actual: &Value) -> f64 {
        MatchScore::from_bool(
            self.paths
                .iter()
                .any(|path| !path.query(actual).is_empty()),
        )
    }
}

impl Matcher for JsonPathMatcher {
    fn name(&self) -> &'static str {
        "JsonPathMatcher"
    }

    fn behaviour(&self) -> MatchBehaviour {
        self.behaviour
    }

    fn raw_score(&self, input: &str) -> f64 {
        match serde_json::from_str::<Value>(input) {
            Ok(actual) => self.score_value(&actual),
            Err(_) => MatchScore::MISMATCH,
        }
    }
}
