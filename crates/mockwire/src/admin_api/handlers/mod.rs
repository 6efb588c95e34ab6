//! Admin API request handlers, one module per resource.

pub mod mappings;
pub mod requests;
pub mod scenarios;
pub mod settings;
pub mod system;
