//! Wildcard patterns: `*` matches any run of characters, `?` any single character.

use super::matcher::{MatchBehaviour, MatchScore, Matcher};
use crate::error::ConfigError;
use regex::{Regex, RegexBuilder};

/// Matches when the whole value fits one of the wildcard patterns.
#[derive(Debug, Clone)]
pub struct WildcardMatcher {
    patterns: Vec<String>,
    compiled: Vec<Regex>,
    behaviour: MatchBehaviour,
}

impl WildcardMatcher {
    pub fn new(pattern: impl Into<String>) -> Result<Self, ConfigError> {
        Self::with_patterns(vec![pattern.into()], false, MatchBehaviour::AcceptOnMatch)
    }

    pub fn with_patterns(
        patterns: Vec<String>,
        ignore_case: bool,
        behaviour: MatchBehaviour,
    ) -> Result<Self, ConfigError> {
        let compiled = patterns
            .iter()
            .map(|p| compile_wildcard(p, ignore_case))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            patterns,
            compiled,
            behaviour,
        })
    }

    pub fn ignore_case(self, ignore_case: bool) -> Result<Self, ConfigError> {
        Self::with_patterns(self.patterns, ignore_case, self.behaviour)
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

/// Translate a wildcard pattern into an anchored regex.
fn compile_wildcard(pattern: &str, ignore_case: bool) -> Result<Regex, ConfigError> {
    let mut source = String::with_capacity(pattern.len() + 8);
    source.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => source.push_str(".*"),
            '?' => source.push('.'),
            other => source.push_str(&regex::escape(&other.to_string())),
        }
    }
    source.push('$');

    RegexBuilder::new(&source)
        .case_insensitive(ignore_case)
        .dot_matches_new_line(true)
        .build()
        .map_err(|source| ConfigError::InvalidRegex {
            pattern: pattern.to_string(),
            source,
        })
}

impl Matcher for WildcardMatcher {
    fn name(&self) -> &'static str {
        "WildcardMatcher"
    }

    fn behaviour(&self) -> MatchBehaviour {
        self.behaviour
    }

    fn raw_score(&self, input: &str) -> f64 {
        MatchScore::from_bool(self.compiled.iter().any(|re| re.is_match(input)))
    }
}
