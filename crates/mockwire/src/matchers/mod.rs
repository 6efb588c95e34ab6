//! Matcher library.
//!
//! Pure functions deciding whether a single extracted request attribute (path,
//! header, query parameter, cookie, body, client IP) satisfies a declared pattern.
//! Every matcher produces a score in `[0, 1]`; a perfect score means a match.
//! Polarity (`AcceptOnMatch` / `RejectOnMatch`) inverts the score.
//!
//! Patterns are compiled when a mapping is registered, so invalid regexes,
//! expressions and JSONPaths are reported as `ConfigError` before any request
//! is served.
//!
//! # Module Structure
//!
//! - `matcher` - `Matcher` trait, `MatchBehaviour`, `MatchScore`, `CachedValue`
//! - `exact` - Exact string equality
//! - `wildcard` - `*` / `?` patterns
//! - `regex_matcher` - Regular expressions
//! - `expression` - Constrained boolean expressions over the value
//! - `json` - JSON equality, partial JSON and JSONPath
//! - `definition` - Wire model and compilation

mod definition;
mod exact;
mod expression;
mod json;
mod matcher;
mod regex_matcher;
mod wildcard;

pub use definition::{CompiledMatcher, MatcherDefinition, MatcherKind};
pub use exact::ExactMatcher;
pub use expression::ExpressionMatcher;
pub use json::{JsonMatcher, JsonPathMatcher};
pub use matcher::{CachedValue, MatchBehaviour, MatchScore, Matcher};
pub use regex_matcher::RegexMatcher;
pub use wildcard::WildcardMatcher;
