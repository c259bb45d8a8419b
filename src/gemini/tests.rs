use super::*;
use crate::config::GeminiConfig;

fn test_config() -> GeminiConfig {
    GeminiConfig {
        endpoint: "http://localhost:9999".to_string(),
        model: "test-model".to_string(),
        embedding_model: "test-embed".to_string(),
        embedding_dimension: 8,
        batch_size: 4,
        ..GeminiConfig::default()
    }
}

#[test]
fn client_configuration() {
    let client = GeminiClient::with_api_key(&test_config(), "secret".to_string())
        .expect("Failed to create client");

    assert_eq!(client.model, "test-model");
    assert_eq!(client.embedding_model, "test-embed");
    assert_eq!(client.batch_size, 4);
    assert_eq!(client.embedding_dimension(), 8);
    assert_eq!(client.retry_attempts, DEFAULT_RETRY_ATTEMPTS);
}

#[test]
fn client_builder_methods() {
    let client = GeminiClient::with_api_key(&test_config(), "secret".to_string())
        .expect("Failed to create client")
        .with_timeout(Duration::from_secs(60))
        .with_retry_attempts(5);

    assert_eq!(client.retry_attempts, 5);
}

#[test]
fn model_urls_follow_v1beta_layout() {
    let client = GeminiClient::with_api_key(&test_config(), "secret".to_string())
        .expect("Failed to create client");

    let url = client
        .model_url("test-model", "generateContent")
        .expect("URL should build");
    assert_eq!(
        url.as_str(),
        "http://localhost:9999/v1beta/models/test-model:generateContent"
    );

    let url = client
        .model_url("test-embed", "batchEmbedContents")
        .expect("URL should build");
    assert!(url.path().ends_with("test-embed:batchEmbedContents"));
}

#[test]
fn generate_request_includes_history_then_prompt() {
    let history = vec![
        ChatTurn {
            role: Role::User,
            content: "first".to_string(),
        },
        ChatTurn {
            role: Role::Model,
            content: "reply".to_string(),
        },
    ];

    let mut contents: Vec<Content> = history
        .iter()
        .map(|turn| Content {
            role: turn.role.as_str().to_string(),
            parts: vec![Part {
                text: turn.content.clone(),
            }],
        })
        .collect();
    contents.push(Content {
        role: "user".to_string(),
        parts: vec![Part {
            text: "now".to_string(),
        }],
    });
    let request = GenerateRequest { contents };

    let json = serde_json::to_value(&request).expect("serialize should succeed");
    let contents = json["contents"].as_array().expect("contents array");
    assert_eq!(contents.len(), 3);
    assert_eq!(contents[0]["role"], "user");
    assert_eq!(contents[1]["role"], "model");
    assert_eq!(contents[2]["parts"][0]["text"], "now");
}

#[test]
fn embed_request_carries_dimension() {
    let client = GeminiClient::with_api_key(&test_config(), "secret".to_string())
        .expect("Failed to create client");

    let request = client.embed_request("hello");
    let json = serde_json::to_value(&request).expect("serialize should succeed");
    assert_eq!(json["model"], "models/test-embed");
    assert_eq!(json["outputDimensionality"], 8);
    assert_eq!(json["content"]["parts"][0]["text"], "hello");
}

#[test]
fn generation_response_parsing() {
    let body = r#"{
        "candidates": [
            {"content": {"role": "model", "parts": [{"text": "Hello back"}]}}
        ]
    }"#;
    let response: GenerateResponse = serde_json::from_str(body).expect("parse should succeed");
    let text = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content.parts.into_iter().next())
        .map(|p| p.text)
        .expect("candidate text");
    assert_eq!(text, "Hello back");
}

#[test]
fn empty_candidates_is_an_error_at_the_caller() {
    let body = r#"{"candidates": []}"#;
    let response: GenerateResponse = serde_json::from_str(body).expect("parse should succeed");
    assert!(response.candidates.is_empty());
}
