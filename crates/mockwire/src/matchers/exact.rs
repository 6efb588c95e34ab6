//! Exact string equality.

use super::matcher::{CachedValue, MatchBehaviour, MatchScore, Matcher};

/// Matches when the value equals one of the patterns.
#[derive(Debug, Clone)]
pub struct ExactMatcher {
    patterns: Vec<CachedValue>,
    ignore_case: bool,
    behaviour: MatchBehaviour,
}

impl ExactMatcher {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self::with_patterns(vec![pattern.into()], false, MatchBehaviour::AcceptOnMatch)
    }

    pub fn with_patterns(
        patterns: Vec<String>,
        ignore_case: bool,
        behaviour: MatchBehaviour,
    ) -> Self {
        Self {
            patterns: patterns.into_iter().map(CachedValue::new).collect(),
            ignore_case,
            behaviour,
        }
    }

    pub fn ignore_case(mut self, ignore_case: bool) -> Self {
        self.ignore_case = ignore_case;
        self
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|p| p.value.as_str())
    }
}

impl Matcher for ExactMatcher {
    fn name(&self) -> &'static str {
        "ExactMatcher"
    }

    fn behaviour(&self) -> MatchBehaviour {
        self.behaviour
    }

    fn raw_score(&self, input: &str) -> f64 {
        MatchScore::from_bool(
            self.patterns
                .iter()
                .any(|p| p.equals(input, !self.ignore_case)),
        )
    }
}
