//! Proxy and record engine.
//!
//! Used when no mapping matches and a global proxy url is configured, or when a
//! matched mapping declares `proxyUrl`. The upstream response is returned to the
//! caller as-is (minus hop-by-hop headers); when recording is enabled and the
//! status passes the configured pattern, the exchange becomes a new mapping.
//!
//! # Module Structure
//!
//! - `forwarding` - `ProxyClient` and `UpstreamResponse`
//! - `recording` - `StatusCodePattern` and mapping synthesis
//! - `headers` - Hop-by-hop handling and mockwire header names
//! - `network` - Listener socket creation
//! - `tls` - TLS acceptor for https endpoints

mod forwarding;
pub mod headers;
pub(crate) mod network;
mod recording;
pub(crate) mod tls;

pub use forwarding::{ProxyClient, UpstreamResponse};
pub use recording::{synthesize_mapping, StatusCodePattern};
