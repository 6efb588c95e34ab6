//! Proxying unmatched requests upstream and recording them as mappings.

mod common;

use common::{client, start, start_default};
use mockwire::mapping::{MappingBuilder, MappingModel};
use mockwire::request::RequestBuilder;
use mockwire::response::ResponseBuilder;
use mockwire::{ProxyAndRecordSettings, ServerHandle, ServerSettings};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;

async fn upstream() -> ServerHandle {
    let server = start_default().await;
    server
        .register(
            MappingBuilder::given(RequestBuilder::new().with_path("/api/data").using_get())
                .respond_with(
                    ResponseBuilder::new()
                        .with_status_code(200)
                        .with_header("X-Upstream", "real")
                        .with_body_as_json(&json!({ "source": "upstream" })),
                ),
        )
        .unwrap();
    server
        .register(
            MappingBuilder::given(RequestBuilder::new().with_path("/api/broken"))
                .respond_with(ResponseBuilder::new().with_status_code(500).with_body("boom")),
        )
        .unwrap();
    server
}

fn recording_settings(url: String) -> ServerSettings {
    let mut proxy = ProxyAndRecordSettings::new(url);
    proxy.save_mapping = true;
    proxy.save_mapping_for_status_code_pattern = "2xx".to_string();
    ServerSettings {
        proxy_and_record: Some(proxy),
        ..Default::default()
    }
}

fn header_map(resp: &reqwest::Response) -> BTreeMap<String, Vec<String>> {
    let mut headers: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in resp.headers() {
        headers
            .entry(name.as_str().to_string())
            .or_default()
            .push(value.to_str().unwrap().to_string());
    }
    headers
}

#[tokio::test]
async fn test_unmatched_request_is_proxied_and_recorded() {
    let upstream = upstream().await;
    let server = start(recording_settings(upstream.url())).await;
    let client = client();
    let url = format!("{}/api/data?page=2", server.url());

    let proxied = client.get(&url).send().await.unwrap();
    assert_eq!(proxied.status(), 200);
    assert_eq!(proxied.headers().get("x-upstream").unwrap(), "real");
    let proxied_headers = header_map(&proxied);
    let proxied_body = proxied.bytes().await.unwrap();
    let body: Value = serde_json::from_slice(&proxied_body).unwrap();
    assert_eq!(body["source"], "upstream");

    let recorded = server.mappings();
    assert_eq!(recorded.len(), 1);
    assert_eq!(
        recorded[0].title(),
        Some("Proxy Mapping for GET /api/data")
    );
    assert_eq!(recorded[0].model().response.status_code, Some(200));

    // Replayed from the recorded mapping once the upstream is gone
    upstream.stop().await;
    let replayed = client.get(&url).send().await.unwrap();
    assert_eq!(replayed.status(), 200);
    assert_eq!(header_map(&replayed), proxied_headers);
    assert_eq!(replayed.bytes().await.unwrap(), proxied_body);

    let entries = server.log_entries();
    assert!(entries[0].proxied);
    assert!(!entries[1].proxied);
    assert_eq!(entries[1].mapping_guid, Some(recorded[0].guid()));
}

#[tokio::test]
async fn test_status_pattern_filters_recording() {
    let upstream = upstream().await;
    let server = start(recording_settings(upstream.url())).await;

    let resp = client()
        .get(format!("{}/api/broken", server.url()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
    assert_eq!(resp.text().await.unwrap(), "boom");
    assert!(server.mappings().is_empty());
}

#[tokio::test]
async fn test_proxy_without_recording() {
    let upstream = upstream().await;
    let server = start(ServerSettings {
        proxy_and_record: Some(ProxyAndRecordSettings::new(upstream.url())),
        ..Default::default()
    })
    .await;

    let resp = client()
        .get(format!("{}/api/data", server.url()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(server.mappings().is_empty());
}

#[tokio::test]
async fn test_mapping_level_proxy_forwards_without_recording() {
    let upstream = upstream().await;
    let server = start_default().await;
    server
        .register(
            MappingBuilder::given(RequestBuilder::new().with_path("/api/*"))
                .respond_with(ResponseBuilder::new().with_proxy(upstream.url())),
        )
        .unwrap();

    let resp = client()
        .get(format!("{}/api/data", server.url()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers().get("x-upstream").unwrap(), "real");
    assert_eq!(server.mappings().len(), 1);
    assert!(server.log_entries()[0].proxied);
}

#[tokio::test]
async fn test_unreachable_upstream_is_bad_gateway() {
    let gone = start_default().await;
    let url = gone.url();
    gone.stop().await;

    let server = start(recording_settings(url)).await;
    let resp = client()
        .get(format!("{}/anything", server.url()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 502);
    assert!(server.mappings().is_empty());
}

#[tokio::test]
async fn test_recorded_mapping_written_to_file() {
    let upstream = upstream().await;
    let dir = tempfile::tempdir().unwrap();
    let mut proxy = ProxyAndRecordSettings::new(upstream.url());
    proxy.save_mapping_to_file = true;
    let server = start(ServerSettings {
        proxy_and_record: Some(proxy),
        mappings_directory: dir.path().to_path_buf(),
        ..Default::default()
    })
    .await;

    client()
        .get(format!("{}/api/data", server.url()))
        .send()
        .await
        .unwrap();
    // Only written to disk, not registered
    assert!(server.mappings().is_empty());

    let mut written = Vec::new();
    for _ in 0..50 {
        written = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .collect();
        if !written.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(written.len(), 1);

    // The write may still be in progress right after the file appears
    let mut parsed = Vec::new();
    for _ in 0..50 {
        if let Ok(parsed_file) =
            MappingModel::parse_many(&std::fs::read(&written[0]).unwrap())
        {
            parsed = parsed_file;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(parsed.len(), 1);
    assert_eq!(parsed[0].response.status_code, Some(200));
}
