//! Loading mappings from, and saving them to, the mappings directory.

mod common;

use common::{admin_url, client, start};
use mockwire::mapping::{MappingBuilder, MappingModel};
use mockwire::request::RequestBuilder;
use mockwire::response::ResponseBuilder;
use mockwire::{MockServer, ServerError, ServerSettings};
use serde_json::json;
use serial_test::serial;
use std::path::Path;

fn write_json(dir: &Path, name: &str, value: serde_json::Value) {
    std::fs::write(dir.join(name), serde_json::to_vec_pretty(&value).unwrap()).unwrap();
}

fn static_settings(dir: &Path) -> ServerSettings {
    ServerSettings {
        read_static_mappings: true,
        mappings_directory: dir.to_path_buf(),
        ..Default::default()
    }
}

#[tokio::test]
#[serial]
async fn test_load_static_mappings_at_start() {
    let dir = tempfile::tempdir().unwrap();
    write_json(
        dir.path(),
        "single.json",
        json!({
            "request": { "path": "/static", "methods": ["GET"] },
            "response": { "statusCode": 200, "body": "from disk" }
        }),
    );
    write_json(
        dir.path(),
        "many.json",
        json!([
            { "request": { "path": "/one" }, "response": { "body": "1" } },
            { "request": { "path": "/two" }, "response": { "body": "2" } }
        ]),
    );
    std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let server = start(static_settings(dir.path())).await;
    assert_eq!(server.mappings().len(), 3);

    let resp = client()
        .get(format!("{}/static", server.url()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.text().await.unwrap(), "from disk");
}

#[tokio::test]
#[serial]
async fn test_missing_directory_loads_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let server = start(static_settings(&dir.path().join("absent"))).await;
    assert!(server.mappings().is_empty());
}

#[tokio::test]
#[serial]
async fn test_malformed_file_fails_start() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("broken.json"), "{ not json").unwrap();

    let result = MockServer::start(static_settings(dir.path())).await;
    assert!(matches!(result, Err(ServerError::Persistence(_))));
}

#[tokio::test]
#[serial]
async fn test_invalid_matcher_fails_start() {
    let dir = tempfile::tempdir().unwrap();
    write_json(
        dir.path(),
        "bad.json",
        json!({
            "request": { "path": { "matchers": [{ "name": "RegexMatcher", "pattern": "(" }] } },
            "response": { "body": "never" }
        }),
    );

    let result = MockServer::start(static_settings(dir.path())).await;
    assert!(matches!(result, Err(ServerError::Config(_))));
}

#[tokio::test]
#[serial]
async fn test_save_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let settings = ServerSettings {
        mappings_directory: dir.path().to_path_buf(),
        ..Default::default()
    };

    let server = start(settings).await;
    let mapping = server
        .register(
            MappingBuilder::given(RequestBuilder::new().with_path("/saved"))
                .with_title("saved")
                .respond_with(ResponseBuilder::new().with_status_code(202)),
        )
        .unwrap();
    assert_eq!(server.save_static_mappings().unwrap(), 1);
    server.stop().await;

    let file = dir.path().join(format!("{}.json", mapping.guid()));
    let saved = MappingModel::parse_many(&std::fs::read(&file).unwrap()).unwrap();
    assert_eq!(saved[0].guid, Some(mapping.guid()));
    assert_eq!(saved[0].title.as_deref(), Some("saved"));

    let reloaded = start(static_settings(dir.path())).await;
    let resp = client()
        .get(format!("{}/saved", reloaded.url()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 202);
    assert_eq!(reloaded.mappings()[0].guid(), mapping.guid());
}

#[tokio::test]
#[serial]
async fn test_save_through_admin_api() {
    let dir = tempfile::tempdir().unwrap();
    let server = start(ServerSettings {
        mappings_directory: dir.path().to_path_buf(),
        ..Default::default()
    })
    .await;
    let client = client();
    client
        .post(admin_url(&server, "/mappings"))
        .json(&json!({ "request": { "path": "/a" }, "response": { "body": "a" } }))
        .send()
        .await
        .unwrap();

    let resp = client
        .post(admin_url(&server, "/mappings/save"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[tokio::test]
#[serial]
async fn test_body_from_file() {
    let files = tempfile::tempdir().unwrap();
    std::fs::write(files.path().join("payload.xml"), "<ok/>").unwrap();
    let server = start(ServerSettings {
        files_directory: files.path().to_path_buf(),
        ..Default::default()
    })
    .await;
    server
        .register(
            MappingBuilder::given(RequestBuilder::new().with_path("/file")).respond_with(
                ResponseBuilder::new()
                    .with_header("Content-Type", "application/xml")
                    .with_body_from_file("payload.xml"),
            ),
        )
        .unwrap();
    server
        .register(
            MappingBuilder::given(RequestBuilder::new().with_path("/missing"))
                .respond_with(ResponseBuilder::new().with_body_from_file("nope.xml")),
        )
        .unwrap();

    let client = client();
    let resp = client
        .get(format!("{}/file", server.url()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.text().await.unwrap(), "<ok/>");

    let missing = client
        .get(format!("{}/missing", server.url()))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 500);
}

#[tokio::test]
#[serial]
async fn test_default_directory_is_relative_to_working_dir() {
    let cwd = std::env::current_dir().unwrap();
    let dir = tempfile::tempdir().unwrap();
    std::env::set_current_dir(dir.path()).unwrap();

    let server = MockServer::start(ServerSettings::default()).await.unwrap();
    server
        .register(
            MappingBuilder::given(RequestBuilder::new().with_path("/rel"))
                .respond_with(ResponseBuilder::new().with_body("rel")),
        )
        .unwrap();
    let saved = server.save_static_mappings();
    server.stop().await;
    std::env::set_current_dir(cwd).unwrap();

    assert_eq!(saved.unwrap(), 1);
    let written = std::fs::read_dir(dir.path().join("__admin").join("mappings"))
        .unwrap()
        .count();
    assert_eq!(written, 1);
}
