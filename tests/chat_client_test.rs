//! Integration tests for the chat-completions client against a mock server.

mod common;

use aicommit::config::{Endpoint, ServiceConfig};
use aicommit::error::ServiceError;
use aicommit::git::Diff;
use aicommit::llm::{ChatCompletionsClient, CompletionBackend, CompletionRequest};
use aicommit::MessageGenerator;
use common::chat_response;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn openai_config(server: &MockServer) -> ServiceConfig {
    openai_config_for(server.uri())
}

fn openai_config_for(base_url: String) -> ServiceConfig {
    ServiceConfig {
        api_key: "test-key".to_string(),
        endpoint: Endpoint::OpenAi {
            base_url,
            model: "gpt-4o-mini".to_string(),
        },
        timeout: None,
    }
}

fn request(count: usize) -> CompletionRequest {
    CompletionRequest {
        system_prompt: "You generate commit messages.".to_string(),
        user_prompt: "diff --git a/x b/x".to_string(),
        count,
        max_tokens: 200,
        temperature: 0.7,
    }
}

#[tokio::test]
async fn test_openai_request_shape_and_choices() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "n": 3,
            "max_tokens": 200,
            "messages": [
                { "role": "system", "content": "You generate commit messages." },
                { "role": "user", "content": "diff --git a/x b/x" }
            ]
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(chat_response(&["a", "b", "c"])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = ChatCompletionsClient::new(&openai_config(&server)).unwrap();
    let choices = client.complete(&request(3)).await.unwrap();

    assert_eq!(choices, ["a", "b", "c"]);
}

#[tokio::test]
async fn test_azure_uses_deployment_url_and_api_key_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/deployments/commit-gen/chat/completions"))
        .and(query_param("api-version", "2025-01-01-preview"))
        .and(header("api-key", "azure-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_response(&["Add tests"])))
        .expect(1)
        .mount(&server)
        .await;

    let config = ServiceConfig {
        api_key: "azure-key".to_string(),
        endpoint: Endpoint::Azure {
            resource_url: format!("{}/", server.uri()),
            deployment: "commit-gen".to_string(),
            api_version: "2025-01-01-preview".to_string(),
        },
        timeout: None,
    };
    let client = ChatCompletionsClient::new(&config).unwrap();
    let choices = client.complete(&request(1)).await.unwrap();

    assert_eq!(choices, ["Add tests"]);
}

#[tokio::test]
async fn test_non_success_status_is_status_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let client = ChatCompletionsClient::new(&openai_config(&server)).unwrap();
    let result = client.complete(&request(1)).await;

    match result {
        Err(ServiceError::Status { status, body }) => {
            assert_eq!(status, 429);
            assert_eq!(body, "rate limited");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_body_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let client = ChatCompletionsClient::new(&openai_config(&server)).unwrap();
    let result = client.complete(&request(1)).await;

    assert!(matches!(result, Err(ServiceError::InvalidResponse(_))));
}

#[tokio::test]
async fn test_zero_choices_is_empty_ok() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let client = ChatCompletionsClient::new(&openai_config(&server)).unwrap();
    let choices = client.complete(&request(5)).await.unwrap();
    assert!(choices.is_empty());

    // The generator turns that into a distinct error.
    let diff = Diff::new("+line\n", vec![]);
    let result = MessageGenerator::new(&client).generate(&diff, "en", 5).await;
    assert!(matches!(result, Err(ServiceError::NoChoices)));
}

#[tokio::test]
async fn test_unreachable_backend_is_request_error() {
    // Bind then release a port so nothing is listening on it.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let config = openai_config_for(format!("http://{addr}"));

    let client = ChatCompletionsClient::new(&config).unwrap();
    let result = client.complete(&request(1)).await;

    assert!(matches!(result, Err(ServiceError::Request(_))));
}

#[tokio::test]
async fn test_generator_normalizes_backend_choices() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "n": 2 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_response(&[
            "  Fix parser\n\nhandle empty input  ",
            "\n",
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let client = ChatCompletionsClient::new(&openai_config(&server)).unwrap();
    let diff = Diff::new("+line\n", vec![]);
    let candidates = MessageGenerator::new(&client)
        .generate(&diff, "en", 2)
        .await
        .unwrap();

    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates.get(0), Some("Fix parser handle empty input"));
}
