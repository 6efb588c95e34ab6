//! Core matching traits and helpers.
//!
//! This module provides:
//! - `CachedValue` - A pattern with pre-computed lowercase for case-insensitive matching
//! - `MatchBehaviour` - Accept/reject polarity of a condition
//! - `MatchScore` - Score constants and helpers
//! - `Matcher` - The trait every compiled matcher implements

use serde::{Deserialize, Serialize};
use std::fmt;

/// A string value with pre-computed lowercase for efficient case-insensitive matching.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedValue {
    /// Original value (for case-sensitive matching)
    pub value: String,
    /// Pre-computed lowercase (for case-insensitive matching)
    pub lower: String,
}

impl CachedValue {
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        let lower = value.to_lowercase();
        Self { value, lower }
    }

    /// Check equality against a string value.
    #[inline]
    pub fn equals(&self, value: &str, case_sensitive: bool) -> bool {
        if case_sensitive {
            value == self.value
        } else {
            value.to_lowercase() == self.lower
        }
    }
}

impl From<&str> for CachedValue {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Polarity of a matcher condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MatchBehaviour {
    #[default]
    AcceptOnMatch,
    RejectOnMatch,
}

impl MatchBehaviour {
    pub fn from_reject(reject_on_match: bool) -> Self {
        if reject_on_match {
            MatchBehaviour::RejectOnMatch
        } else {
            MatchBehaviour::AcceptOnMatch
        }
    }

    /// Apply polarity to a raw score.
    #[inline]
    pub fn apply(self, score: f64) -> f64 {
        match self {
            MatchBehaviour::AcceptOnMatch => score,
            MatchBehaviour::RejectOnMatch => MatchScore::PERFECT - score,
        }
    }
}

/// Score constants and helpers. Scores are always within `[0, 1]`.
pub struct MatchScore;

impl MatchScore {
    pub const PERFECT: f64 = 1.0;
    pub const MISMATCH: f64 = 0.0;

    #[inline]
    pub fn from_bool(matched: bool) -> f64 {
        if matched {
            Self::PERFECT
        } else {
            Self::MISMATCH
        }
    }

    /// Average of a set of scores; an empty set is a perfect match.
    pub fn average(scores: &[f64]) -> f64 {
        if scores.is_empty() {
            return Self::PERFECT;
        }
        scores.iter().sum::<f64>() / scores.len() as f64
    }

    pub fn is_perfect(score: f64) -> bool {
        score >= Self::PERFECT - f64::EPSILON
    }
}

/// A compiled matcher that scores a single extracted request value.
pub trait Matcher: fmt::Debug + Send + Sync {
    /// Wire name of the matcher (e.g. `ExactMatcher`).
    fn name(&self) -> &'static str;

    fn behaviour(&self) -> MatchBehaviour;

    /// Score for a present value, before polarity is applied.
    fn raw_score(&self, input: &str) -> f64;

    /// Score in `[0, 1]` with polarity applied. An absent value never matches
    /// an accepting condition.
    fn match_score(&self, input: Option<&str>) -> f64 {
        let raw = input
            .map(|value| self.raw_score(value))
            .unwrap_or(MatchScore::MISMATCH);
        self.behaviour().apply(raw)
    }

    fn matches(&self, input: Option<&str>) -> bool {
        MatchScore::is_perfect(self.match_score(input))
    }
}
