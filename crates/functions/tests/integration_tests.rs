use bucketnest_functions::{FunctionOptions, FunctionsClient, FunctionsError};
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_get_with_query_uses_anon_key_by_default() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/functions/v1/get-shared-collection"))
        .and(query_param("slug", "abc123defg"))
        .and(header("apikey", "anon"))
        .and(header("Authorization", "Bearer anon"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "collection": { "id": "c1" },
            "items": []
        })))
        .mount(&mock_server)
        .await;

    let client = FunctionsClient::new(&mock_server.uri(), "anon", reqwest::Client::new());
    let body: Value = client
        .get("get-shared-collection", &[("slug", "abc123defg")], None)
        .await
        .unwrap();

    assert_eq!(body["collection"]["id"], "c1");
}

#[tokio::test]
async fn test_not_found_is_distinct() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/functions/v1/get-shared-collection"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "error": "Collection not found" })),
        )
        .mount(&mock_server)
        .await;

    let client = FunctionsClient::new(&mock_server.uri(), "anon", reqwest::Client::new());
    let result = client
        .get::<Value>("get-shared-collection", &[("slug", "missing")], None)
        .await;

    match result {
        Err(FunctionsError::NotFound { function, message }) => {
            assert_eq!(function, "get-shared-collection");
            assert!(message.contains("Collection not found"));
        }
        other => panic!("Expected NotFound, got {:?}", other),
    }
}

#[tokio::test]
async fn test_invoke_posts_body_with_custom_auth() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/functions/v1/echo"))
        .and(header("Authorization", "Bearer user-token"))
        .and(header("x-trace", "t1"))
        .and(body_json(json!({ "ping": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "pong": true })))
        .mount(&mock_server)
        .await;

    let client = FunctionsClient::new(&mock_server.uri(), "anon", reqwest::Client::new());
    let mut headers = std::collections::HashMap::new();
    headers.insert("x-trace".to_string(), "t1".to_string());
    let options = FunctionOptions {
        headers: Some(headers),
        authorization: Some("user-token".to_string()),
    };

    let body: Value = client
        .invoke("echo", Some(json!({ "ping": true })), Some(options))
        .await
        .unwrap();
    assert_eq!(body["pong"], true);
}

#[tokio::test]
async fn test_server_error_keeps_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/functions/v1/broken"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&mock_server)
        .await;

    let client = FunctionsClient::new(&mock_server.uri(), "anon", reqwest::Client::new());
    let result = client.invoke::<Value, Value>("broken", None, None).await;

    match result {
        Err(FunctionsError::FunctionError { status, message }) => {
            assert_eq!(status.as_u16(), 500);
            assert_eq!(message, "boom");
        }
        other => panic!("Expected FunctionError, got {:?}", other),
    }
}
