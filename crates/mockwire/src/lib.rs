//! Mockwire: an embeddable HTTP stub server.
//!
//! Register request/response mappings, start a server on one or more
//! endpoints, and let it answer matching requests with canned (optionally
//! templated, delayed or faulted) responses. Unmatched requests can be proxied
//! to a real upstream and recorded as new mappings.
//!
//! ```no_run
//! use mockwire::mapping::MappingBuilder;
//! use mockwire::request::RequestBuilder;
//! use mockwire::response::ResponseBuilder;
//! use mockwire::{MockServer, ServerSettings};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let server = MockServer::start(ServerSettings::default()).await?;
//! server.register(
//!     MappingBuilder::given(RequestBuilder::new().with_path("/hello").using_get())
//!         .respond_with(ResponseBuilder::new().with_status_code(200).with_body("hi")),
//! )?;
//! println!("{}/hello", server.url());
//! server.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod admin_api;
pub mod config;
pub mod error;
pub mod mapping;
pub mod matchers;
pub mod persistence;
pub mod proxy;
pub mod request;
pub mod request_log;
pub mod response;
pub mod scenario;
pub mod server;

pub use config::{ProxyAndRecordSettings, RuntimeSettings, ServerSettings, TieBreak};
pub use error::{ConfigError, PersistenceError, ProxyError, ServerError};
pub use server::{MockServer, ServerHandle};
