//! Response construction.
//!
//! Turns a mapping's response definition into an outbound HTTP response:
//! status, headers, body (raw text, JSON, bytes or a file), optional templating,
//! delay and fault injection.
//!
//! # Module Structure
//!
//! - `builder` - Fluent `ResponseBuilder` producing a `ResponseModel`
//! - `renderer` - Resolves a `ResponseModel` against a request into a `RenderedResponse`
//! - `template` - `{{request.*}}` substitution
//! - `fault` - Fault kinds, seeded fault decisions, corrupted bodies

mod builder;
pub mod fault;
mod renderer;
pub mod template;

pub use builder::ResponseBuilder;
pub use fault::{FaultDecision, FaultKind, FaultModel};
pub use renderer::{body_file_path, render, RenderError, RenderedResponse};

use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use std::convert::Infallible;

/// Body type written by the server. Fault bodies fail mid-stream with an I/O error.
pub type ResponseBody = BoxBody<Bytes, std::io::Error>;

/// Wrap a complete payload as a `ResponseBody`.
pub fn full_body(payload: impl Into<Bytes>) -> ResponseBody {
    Full::new(payload.into())
        .map_err(|never: Infallible| match never {})
        .boxed()
}
