//! Regular expression matching.
//!
//! Patterns are used as written: anchors apply only when the pattern contains them.

use super::matcher::{MatchBehaviour, MatchScore, Matcher};
use crate::error::ConfigError;
use regex::{Regex, RegexBuilder};

#[derive(Debug, Clone)]
pub struct RegexMatcher {
    patterns: Vec<String>,
    compiled: Vec<Regex>,
    behaviour: MatchBehaviour,
}

impl RegexMatcher {
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
            .map(|pattern| {
                RegexBuilder::new(pattern)
                    .case_insensitive(ignore_case)
                    .build()
                    .map_err(|source| ConfigError::InvalidRegex {
                        pattern: pattern.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            patterns,
            compiled,
            behaviour,
        })
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

impl Matcher for RegexMatcher {
    fn name(&self) -> &'static str {
        "RegexMatcher"
    }

    fn behaviour(&self) -> MatchBehaviour {
        self.behaviour
    }

    fn raw_score(&self, input: &str) -> f64 {
        MatchScore::from_bool(self.compiled.iter().any(|re| re.is_match(input)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regex_anchored_by_pattern() {
        let matcher = RegexMatcher::new(r"^\w.*\d+$").unwrap();
        assert!(matcher.matches(Some("Tom1993")));
        assert!(!matcher.matches(Some("Tom1993nice")));
    }

    #[test]
    fn test_regex_unanchored_finds_substring() {
        let matcher = RegexMatcher::new(r"\d{3}").unwrap();
        assert!(matcher.matches(Some("abc123def")));
    }

    #[test]
    fn test_invalid_regex_fails_at_compile() {
        let err = RegexMatcher::new("(unclosed").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRegex { .. }));
    }

    #[test]
    fn test_regex_ignore_case() {
        let matcher =
            RegexMatcher::with_patterns(vec!["^abc$".into()], true, MatchBehaviour::AcceptOnMatch)
                .unwrap();
        assert!(matcher.matches(Some("ABC")));
    }
}
