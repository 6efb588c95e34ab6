//! Shared helpers for integration tests.

#![allow(dead_code)]

use mockwire::{MockServer, ServerHandle, ServerSettings};
use reqwest::Client;
use std::time::Duration;

/// Start a server on a dynamic localhost port.
pub async fn start(settings: ServerSettings) -> ServerHandle {
    MockServer::start(ServerSettings {
        host: "127.0.0.1".to_string(),
        ..settings
    })
    .await
    .expect("failed to start mock server")
}

pub async fn start_default() -> ServerHandle {
    start(ServerSettings::default()).await
}

pub fn client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

pub fn admin_url(server: &ServerHandle, path: &str) -> String {
    format!("{}/__admin{}", server.url(), path)
}
