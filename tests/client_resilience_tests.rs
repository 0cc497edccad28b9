//! Integration tests for the resilient Fabric client against a mock server.

use fabric_ontology::cancellation::CancellationTokenSource;
use fabric_ontology::client::FabricClient;
use fabric_ontology::config::FabricConfig;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> FabricConfig {
    // SAFETY: tests run single-threaded within this process's test harness
    // and each sets the same var to the same value.
    unsafe {
        std::env::set_var("AZURE_ACCESS_TOKEN", "test-token");
    }
    let mut config = FabricConfig::default();
    config.api_base_url = server.uri();
    config.workspace_id = "ws-1".to_string();
    config.rate_limit.enabled = false;
    config
}

#[tokio::test]
async fn list_ontologies_returns_parsed_items() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/workspaces/ws-1/ontologies"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{"id": "1", "displayName": "Demo", "description": "a demo"}]
        })))
        .mount(&server)
        .await;

    let client = FabricClient::new(config_for(&server));
    let token = CancellationTokenSource::new().token();
    let ontologies = client.list(&token).await.unwrap();

    assert_eq!(ontologies.len(), 1);
    assert_eq!(ontologies[0].display_name, "Demo");
}

#[tokio::test]
async fn transient_503_is_retried_until_success() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/workspaces/ws-1/ontologies/42"))
        .respond_with(ResponseTemplate::new(503).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/workspaces/ws-1/ontologies/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "42", "displayName": "Recovered", "description": ""
        })))
        .mount(&server)
        .await;

    let client = FabricClient::new(config_for(&server));
    let token = CancellationTokenSource::new().token();
    let ontology = client.get("42", &token).await.unwrap();

    assert_eq!(ontology.display_name, "Recovered");
}

#[tokio::test]
async fn permanent_404_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/workspaces/ws-1/ontologies/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "errorCode": "ItemNotFound", "message": "no such ontology"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = FabricClient::new(config_for(&server));
    let token = CancellationTokenSource::new().token();
    let err = client.get("missing", &token).await.unwrap_err();

    assert!(!err.is_retryable());
}

#[tokio::test]
async fn create_ontology_follows_long_running_operation_to_completion() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/workspaces/ws-1/ontologies"))
        .respond_with(
            ResponseTemplate::new(202)
                .insert_header("Location", format!("{}/operations/op-1", server.uri()))
                .insert_header("Retry-After", "1"),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/operations/op-1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Location", format!("{}/operations/op-1/result", server.uri()))
                .set_body_json(json!({"status": "Succeeded"})),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/operations/op-1/result"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "99", "displayName": "Created_Ontology", "description": ""
        })))
        .mount(&server)
        .await;

    let client = FabricClient::new(config_for(&server));
    let token = CancellationTokenSource::new().token();
    let ontology = client.create("Created Ontology", "", None, &token).await.unwrap();

    assert_eq!(ontology.id, "99");
}
