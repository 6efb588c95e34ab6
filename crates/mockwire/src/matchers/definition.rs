//! Wire model for matchers and compilation into runtime matchers.

use super::expression::ExpressionMatcher;
use super::json::{JsonMatcher, JsonPathMatcher};
use super::matcher::{MatchBehaviour, Matcher};
use super::{ExactMatcher, RegexMatcher, WildcardMatcher};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Matcher kind as written in mapping documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatcherKind {
    ExactMatcher,
    WildcardMatcher,
    RegexMatcher,
    #[serde(alias = "ExpressionMatcher")]
    LinqMatcher,
    JsonMatcher,
    JsonPartialMatcher,
    JsonPathMatcher,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// A matcher condition as stored in a mapping document.
///
/// ```json
/// { "name": "WildcardMatcher", "pattern": "/some*", "ignoreCase": true }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatcherDefinition {
    pub name: MatcherKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patterns: Vec<Value>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub ignore_case: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub reject_on_match: bool,
}

impl MatcherDefinition {
    fn of(name: MatcherKind, pattern: Value) -> Self {
        Self {
            name,
            pattern: Some(pattern),
            patterns: Vec::new(),
            ignore_case: false,
            reject_on_match: false,
        }
    }

    pub fn exact(pattern: impl Into<String>) -> Self {
        Self::of(MatcherKind::ExactMatcher, Value::String(pattern.into()))
    }

    pub fn wildcard(pattern: impl Into<String>) -> Self {
        Self::of(MatcherKind::WildcardMatcher, Value::String(pattern.into()))
    }

    pub fn regex(pattern: impl Into<String>) -> Self {
        Self::of(MatcherKind::RegexMatcher, Value::String(pattern.into()))
    }

    pub fn expression(expression: impl Into<String>) -> Self {
        Self::of(MatcherKind::LinqMatcher, Value::String(expression.into()))
    }

    pub fn json(expected: Value) -> Self {
        Self::of(MatcherKind::JsonMatcher, expected)
    }

    pub fn json_partial(expected: Value) -> Self {
        Self::of(MatcherKind::JsonPartialMatcher, expected)
    }

    pub fn json_path(path: impl Into<String>) -> Self {
        Self::of(MatcherKind::JsonPathMatcher, Value::String(path.into()))
    }

    pub fn with_ignore_case(mut self, ignore_case: bool) -> Self {
        self.ignore_case = ignore_case;
        self
    }

    pub fn with_behaviour(mut self, behaviour: MatchBehaviour) -> Self {
        self.reject_on_match = behaviour == MatchBehaviour::RejectOnMatch;
        self
    }

    pub fn behaviour(&self) -> MatchBehaviour {
        MatchBehaviour::from_reject(self.reject_on_match)
    }

    fn all_patterns(&self) -> impl Iterator<Item = &Value> {
        self.pattern.iter().chain(self.patterns.iter())
    }

    fn string_patterns(&self) -> Result<Vec<String>, ConfigError> {
        let patterns = self
            .all_patterns()
            .map(|value| match value {
                Value::String(s) => Ok(s.clone()),
                other => Err(self.invalid(format!("pattern must be a string, found {other}"))),
            })
            .collect::<Result<Vec<_>, _>>()?;
        if patterns.is_empty() {
            return Err(self.invalid("at least one pattern is required".to_string()));
        }
        Ok(patterns)
    }

    /// JSON matchers accept the expected document inline or as a JSON string.
    fn json_pattern(&self) -> Result<Value, ConfigError> {
        match self.all_patterns().next() {
            Some(Value::String(text)) => {
                Ok(serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.clone())))
            }
            Some(value) => Ok(value.clone()),
            None => Err(self.invalid("a pattern is required".to_string())),
        }
    }

    fn invalid(&self, message: String) -> ConfigError {
        ConfigError::InvalidMatcher {
            name: format!("{:?}", self.name),
            message,
        }
    }
}

/// Compiled matcher ready for request-time evaluation.
#[derive(Debug, Clone)]
pub enum CompiledMatcher {
    Exact(ExactMatcher),
    Wildcard(WildcardMatcher),
    Regex(RegexMatcher),
    Expression(ExpressionMatcher),
    Json(JsonMatcher),
    JsonPath(JsonPathMatcher),
}

impl CompiledMatcher {
    /// Compile a definition, failing fast on invalid patterns.
    pub fn compile(definition: &MatcherDefinition) -> Result<Self, ConfigError> {
        let behaviour = definition.behaviour();
        let ignore_case = definition.ignore_case;
        let compiled = match definition.name {
            MatcherKind::ExactMatcher => CompiledMatcher::Exact(ExactMatcher::with_patterns(
                definition.string_patterns()?,
                ignore_case,
                behaviour,
            )),
            MatcherKind::WildcardMatcher => {
                CompiledMatcher::Wildcard(WildcardMatcher::with_patterns(
                    definition.string_patterns()?,
                    ignore_case,
                    behaviour,
                )?)
            }
            MatcherKind::RegexMatcher => CompiledMatcher::Regex(RegexMatcher::with_patterns(
                definition.string_patterns()?,
                ignore_case,
                behaviour,
            )?),
            MatcherKind::LinqMatcher => CompiledMatcher::Expression(
                ExpressionMatcher::with_patterns(definition.string_patterns()?, behaviour)?,
            ),
            MatcherKind::JsonMatcher => CompiledMatcher::Json(
                JsonMatcher::new(definition.json_pattern()?).with_options(ignore_case, behaviour),
            ),
            MatcherKind::JsonPartialMatcher => CompiledMatcher::Json(
                JsonMatcher::partial(definition.json_pattern()?)
                    .with_options(ignore_case, behaviour),
            ),
            MatcherKind::JsonPathMatcher => CompiledMatcher::JsonPath(
                JsonPathMatcher::with_patterns(definition.string_patterns()?, behaviour)?,
            ),
        };
        Ok(compiled)
    }

    fn inner(&self) -> &dyn Matcher {
        match self {
            CompiledMatcher::Exact(m) => m,
            CompiledMatcher::Wildcard(m) => m,
            CompiledMatcher::Regex(m) => m,
            CompiledMatcher::Expression(m) => m,
            CompiledMatcher::Json(m) => m,
            CompiledMatcher::JsonPath(m) => m,
        }
    }

    /// Score a body whose JSON form has already been parsed, avoiding a re-parse
    /// for JSON matchers.
    pub fn score_body(&self, text: Option<&str>, json: Option<&Value>) -> f64 {
        match (self, json) {
            (CompiledMatcher::Json(m), Some(value)) => m.behaviour().apply(m.score_value(value)),
            (CompiledMatcher::JsonPath(m), Some(value)) => {
                m.behaviour().apply(m.score_value(value))
            }
            _ => self.match_score(text),
        }
    }
}

impl Matcher for CompiledMatcher {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn behaviour(&self) -> MatchBehaviour {
        self.inner().behaviour()
    }

    fn raw_score(&self, input: &str) -> f64 {
        self.inner().raw_score(input)
    }
}
