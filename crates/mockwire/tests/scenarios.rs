//! Scenario state machine driven over HTTP.

mod common;

use common::{admin_url, client, start_default};
use mockwire::mapping::MappingBuilder;
use mockwire::request::RequestBuilder;
use mockwire::response::ResponseBuilder;
use serde_json::{json, Value};

fn todo_list_mappings() -> Vec<mockwire::mapping::MappingModel> {
    vec![
        MappingBuilder::given(RequestBuilder::new().with_path("/todo/items").using_get())
            .in_scenario("To do list")
            .when_state_is("Started")
            .respond_with(ResponseBuilder::new().with_body("Buy milk")),
        MappingBuilder::given(RequestBuilder::new().with_path("/todo/items").using_post())
            .in_scenario("To do list")
            .when_state_is("Started")
            .will_set_state_to("Cancel newspaper item added")
            .respond_with(ResponseBuilder::new().with_status_code(201)),
        MappingBuilder::given(RequestBuilder::new().with_path("/todo/items").using_get())
            .in_scenario("To do list")
            .when_state_is("Cancel newspaper item added")
            .respond_with(ResponseBuilder::new().with_body("Buy milk;Cancel newspaper")),
    ]
}

#[tokio::test]
async fn test_scenario_transitions_change_responses() {
    let server = start_default().await;
    server.register_all(todo_list_mappings()).unwrap();

    let client = client();
    let url = format!("{}/todo/items", server.url());

    assert_eq!(client.get(&url).send().await.unwrap().text().await.unwrap(), "Buy milk");
    assert_eq!(client.post(&url).send().await.unwrap().status(), 201);
    assert_eq!(
        client.get(&url).send().await.unwrap().text().await.unwrap(),
        "Buy milk;Cancel newspaper"
    );

    // No mapping accepts POST in the new state
    assert_eq!(client.post(&url).send().await.unwrap().status(), 404);

    let scenarios = server.scenarios();
    assert_eq!(scenarios.len(), 1);
    assert_eq!(scenarios[0].current(), "Cancel newspaper item added");
    assert!(scenarios[0].started);
    assert_eq!(scenarios[0].transitions, 1);
}

fn stateless_entry_mappings() -> Vec<mockwire::mapping::MappingModel> {
    let path = || RequestBuilder::new().with_path("/flow");
    vec![
        MappingBuilder::given(path().using_get())
            .in_scenario("flow")
            .will_set_state_to("S1")
            .respond_with(ResponseBuilder::new().with_body("A")),
        MappingBuilder::given(path().using_post())
            .in_scenario("flow")
            .when_state_is("S1")
            .will_set_state_to("S2")
            .respond_with(ResponseBuilder::new().with_body("B")),
        MappingBuilder::given(path().using_get())
            .in_scenario("flow")
            .when_state_is("S2")
            .respond_with(ResponseBuilder::new().with_body("C")),
    ]
}

#[tokio::test]
async fn test_mapping_without_required_state_starts_the_flow() {
    let server = start_default().await;
    server.register_all(stateless_entry_mappings()).unwrap();
    let client = client();
    let url = format!("{}/flow", server.url());

    let mut bodies = Vec::new();
    bodies.push(client.get(&url).send().await.unwrap().text().await.unwrap());
    bodies.push(client.post(&url).send().await.unwrap().text().await.unwrap());
    bodies.push(client.get(&url).send().await.unwrap().text().await.unwrap());
    assert_eq!(bodies, vec!["A", "B", "C"]);

    server.reset_scenarios();
    let mut bodies = Vec::new();
    for _ in 0..3 {
        bodies.push(client.get(&url).send().await.unwrap().text().await.unwrap());
    }
    assert_eq!(bodies, vec!["A", "A", "A"]);
}

#[tokio::test]
async fn test_scenario_reset_through_admin_api() {
    let server = start_default().await;
    server.register_all(todo_list_mappings()).unwrap();

    let client = client();
    let url = format!("{}/todo/items", server.url());
    client.post(&url).send().await.unwrap();

    let listed: Value = client
        .get(admin_url(&server, "/scenarios"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed[0]["name"], "To do list");
    assert_eq!(listed[0]["state"], "Cancel newspaper item added");

    let reset = client
        .post(admin_url(&server, "/scenarios/reset"))
        .send()
        .await
        .unwrap();
    assert_eq!(reset.status(), 200);
    assert_eq!(client.get(&url).send().await.unwrap().text().await.unwrap(), "Buy milk");
}

#[tokio::test]
async fn test_reset_single_scenario() {
    let server = start_default().await;
    server.register_all(todo_list_mappings()).unwrap();
    let client = client();
    client
        .post(format!("{}/todo/items", server.url()))
        .send()
        .await
        .unwrap();

    let reset = client
        .put(admin_url(&server, "/scenarios/To%20do%20list/reset"))
        .send()
        .await
        .unwrap();
    assert_eq!(reset.status(), 200);
    assert_eq!(server.scenarios()[0].current(), "Started");

    let unknown = client
        .put(admin_url(&server, "/scenarios/missing/reset"))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), 404);
}

#[tokio::test]
async fn test_scenario_mappings_from_json() {
    let server = start_default().await;
    let client = client();
    let created = client
        .post(admin_url(&server, "/mappings"))
        .json(&json!([
            {
                "scenario": "login",
                "request": { "path": "/session", "methods": ["POST"] },
                "response": { "statusCode": 200, "body": "logged in" },
                "setStateTo": "LoggedIn"
            },
            {
                "scenario": "login",
                "whenStateIs": "LoggedIn",
                "request": { "path": "/profile" },
                "response": { "statusCode": 200, "body": "profile" }
            }
        ]))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), 201);

    let profile = format!("{}/profile", server.url());
    assert_eq!(client.get(&profile).send().await.unwrap().status(), 404);
    client
        .post(format!("{}/session", server.url()))
        .send()
        .await
        .unwrap();
    assert_eq!(client.get(&profile).send().await.unwrap().text().await.unwrap(), "profile");
}

#[tokio::test]
async fn test_concurrent_requests_transition_once() {
    let server = start_default().await;
    server
        .register(
            MappingBuilder::given(RequestBuilder::new().with_path("/once"))
                .in_scenario("gate")
                .when_state_is("Started")
                .will_set_state_to("Open")
                .respond_with(ResponseBuilder::new().with_body("first")),
        )
        .unwrap();
    server
        .register(
            MappingBuilder::given(RequestBuilder::new().with_path("/once"))
                .in_scenario("gate")
                .when_state_is("Open")
                .respond_with(ResponseBuilder::new().with_body("after")),
        )
        .unwrap();

    let client = client();
    let url = format!("{}/once", server.url());
    let requests = (0..8).map(|_| {
        let client = client.clone();
        let url = url.clone();
        async move { client.get(&url).send().await.unwrap().text().await.unwrap() }
    });
    let bodies = futures::future::join_all(requests).await;

    assert_eq!(bodies.iter().filter(|b| b.as_str() == "first").count(), 1);
    assert_eq!(bodies.iter().filter(|b| b.as_str() == "after").count(), 7);
    assert_eq!(server.scenarios()[0].transitions, 1);
}

#[tokio::test]
async fn test_concurrent_requests_advance_state_once_each() {
    const STEPS: usize = 16;
    let server = start_default().await;
    let state = |i: usize| {
        if i == 0 {
            "Started".to_string()
        } else {
            format!("S{i}")
        }
    };
    let mappings = (0..STEPS)
        .map(|i| {
            MappingBuilder::given(RequestBuilder::new().with_path("/chain"))
                .in_scenario("chain")
                .when_state_is(state(i))
                .will_set_state_to(state(i + 1))
                .respond_with(ResponseBuilder::new().with_body(format!("step-{i}")))
        })
        .collect();
    server.register_all(mappings).unwrap();

    let client = client();
    let url = format!("{}/chain", server.url());
    let requests = (0..STEPS).map(|_| {
        let client = client.clone();
        let url = url.clone();
        async move { client.get(&url).send().await.unwrap().text().await.unwrap() }
    });
    let mut bodies = futures::future::join_all(requests).await;
    bodies.sort();

    let mut expected: Vec<String> = (0..STEPS).map(|i| format!("step-{i}")).collect();
    expected.sort();
    assert_eq!(bodies, expected);

    let scenarios = server.scenarios();
    assert_eq!(scenarios[0].transitions, STEPS as u64);
    assert_eq!(scenarios[0].current(), state(STEPS));
}
