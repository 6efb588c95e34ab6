//! Compiled request predicate.
//!
//! Each attribute condition yields a score; the request score is the average
//! over all conditions and the request matches only when every condition is
//! perfect. Alternatives within one condition take the best score.

use super::model::{NamedCondition, RequestModel, ValueCondition};
use crate::error::ConfigError;
use crate::matchers::{CompiledMatcher, MatchBehaviour, MatchScore, Matcher};
use crate::request::RequestMessage;
use serde_json::Value;

/// Result of evaluating a predicate against a request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredicateResult {
    pub score: f64,
    pub perfect: bool,
}

#[derive(Debug, Clone)]
struct Alternatives(Vec<CompiledMatcher>);

impl Alternatives {
    fn compile(condition: &ValueCondition) -> Result<Self, ConfigError> {
        condition
            .matchers()
            .iter()
            .map(CompiledMatcher::compile)
            .collect::<Result<Vec<_>, _>>()
            .map(Alternatives)
    }

    fn score(&self, value: Option<&str>) -> f64 {
        self.0
            .iter()
            .map(|m| m.match_score(value))
            .fold(MatchScore::MISMATCH, f64::max)
    }

    fn score_body(&self, text: Option<&str>, json: Option<&Value>) -> f64 {
        self.0
            .iter()
            .map(|m| m.score_body(text, json))
            .fold(MatchScore::MISMATCH, f64::max)
    }
}

#[derive(Debug, Clone)]
struct NamedMatcher {
    name: String,
    matchers: Vec<CompiledMatcher>,
    ignore_case: bool,
    behaviour: MatchBehaviour,
}

impl NamedMatcher {
    fn compile(condition: &NamedCondition) -> Result<Self, ConfigError> {
        Ok(Self {
            name: condition.name.clone(),
            matchers: condition
                .matchers
                .iter()
                .map(CompiledMatcher::compile)
                .collect::<Result<Vec<_>, _>>()?,
            ignore_case: condition.ignore_case,
            behaviour: MatchBehaviour::from_reject(condition.reject_on_match),
        })
    }

    /// Best score over every value of the attribute. No matchers checks presence.
    fn score<'a>(&self, values: impl Iterator<Item = &'a str>) -> f64 {
        let values: Vec<&str> = values.collect();
        let raw = if values.is_empty() {
            if self.matchers.is_empty() {
                MatchScore::MISMATCH
            } else {
                self.matchers
                    .iter()
                    .map(|m| m.match_score(None))
                    .fold(MatchScore::MISMATCH, f64::max)
            }
        } else if self.matchers.is_empty() {
            MatchScore::PERFECT
        } else {
            values
                .iter()
                .flat_map(|value| self.matchers.iter().map(|m| m.match_score(Some(value))))
                .fold(MatchScore::MISMATCH, f64::max)
        };
        self.behaviour.apply(raw)
    }
}

/// Compiled form of a `RequestModel`.
#[derive(Debug, Clone, Default)]
pub struct RequestMatcher {
    url: Option<Alternatives>,
    path: Option<Alternatives>,
    methods: Vec<String>,
    params: Vec<NamedMatcher>,
    headers: Vec<NamedMatcher>,
    cookies: Vec<NamedMatcher>,
    body: Option<Alternatives>,
    client_ip: Option<Alternatives>,
}

impl RequestMatcher {
    pub fn compile(model: &RequestModel) -> Result<Self, ConfigError> {
        let compile_named = |conditions: &[NamedCondition]| {
            conditions
                .iter()
                .map(NamedMatcher::compile)
                .collect::<Result<Vec<_>, _>>()
        };
        let body = match &model.body {
            Some(condition) => {
                let matchers = condition
                    .all_matchers()
                    .map(CompiledMatcher::compile)
                    .collect::<Result<Vec<_>, _>>()?;
                (!matchers.is_empty()).then_some(Alternatives(matchers))
            }
            None => None,
        };

        Ok(Self {
            url: model.url.as_ref().map(Alternatives::compile).transpose()?,
            path: model.path.as_ref().map(Alternatives::compile).transpose()?,
            methods: model.methods.iter().map(|m| m.to_uppercase()).collect(),
            params: compile_named(&model.params)?,
            headers: compile_named(&model.headers)?,
            cookies: compile_named(&model.cookies)?,
            body,
            client_ip: model
                .client_ip
                .as_ref()
                .map(Alternatives::compile)
                .transpose()?,
        })
    }

    pub fn evaluate(&self, request: &RequestMessage) -> PredicateResult {
        let mut scores = Vec::new();

        if let Some(url) = &self.url {
            scores.push(url.score(Some(&request.url)));
        }
        if let Some(path) = &self.path {
            scores.push(path.score(Some(&request.path)));
        }
        if !self.methods.is_empty() {
            scores.push(MatchScore::from_bool(
                self.methods.iter().any(|m| *m == request.method),
            ));
        }
        for param in &self.params {
            let values = request
                .query
                .iter()
                .filter(|(name, _)| names_equal(name, &param.name, param.ignore_case))
                .flat_map(|(_, values)| values.iter().map(String::as_str));
            scores.push(param.score(values));
        }
        for header in &self.headers {
            let values = request.header_values(&header.name).iter().map(String::as_str);
            scores.push(header.score(values));
        }
        for cookie in &self.cookies {
            let values = request
                .cookies
                .iter()
                .filter(|(name, _)| names_equal(name, &cookie.name, cookie.ignore_case))
                .map(|(_, value)| value.as_str());
            scores.push(cookie.score(values));
        }
        if let Some(body) = &self.body {
            scores.push(body.score_body(request.body_text(), request.body_json()));
        }
        if let Some(client_ip) = &self.client_ip {
            scores.push(client_ip.score(Some(&request.client_ip)));
        }

        PredicateResult {
            score: MatchScore::average(&scores),
            perfect: scores.iter().all(|s| MatchScore::is_perfect(*s)),
        }
    }
}

fn names_equal(actual: &str, expected: &str, ignore_case: bool) -> bool {
    if ignore_case {
        actual.eq_ignore_ascii_case(expected)
    } else {
        actual == expected
    }
}
