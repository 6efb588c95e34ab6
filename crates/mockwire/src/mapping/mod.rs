//! Mappings: wire model, fluent builder, compiled predicate and registry.
//!
//! # Module Structure
//!
//! - `model` - `MappingModel`, `RequestModel`, `ResponseModel` documents
//! - `builder` - `MappingBuilder`
//! - `predicate` - `RequestMatcher`, the compiled request predicate
//! - `registry` - `MappingRegistry` and best-match selection

mod builder;
mod model;
mod predicate;
mod registry;

pub use builder::MappingBuilder;
pub use model::{
    BodyCondition, HeaderValues, MappingModel, NamedCondition, RequestModel, ResponseModel,
    ValueCondition,
};
pub use predicate::{PredicateResult, RequestMatcher};
pub use registry::{
    Candidate, Mapping, MappingRegistry, MatchOptions, MatchReport, DEFAULT_PRIORITY,
};
