use chat_widget::config::{CompletionConfig, RequestStyle};
use chat_widget::message::Attachment;
use chat_widget::store::{MessageStore, ERROR_REPLY};
use chat_widget::upload::Uploader;
use chat_widget::{CompletionClient, CompletionError, CompletionRequest, HttpCompletionClient};
use httpmock::prelude::*;
use serde_json::json;

fn config_for(server: &MockServer) -> CompletionConfig {
    CompletionConfig {
        endpoint: server.url("/v1/chat/completions"),
        api_key: Some("test-key".to_string()),
        model: "test-model".to_string(),
        ..CompletionConfig::default()
    }
}

#[tokio::test]
async fn chat_request_carries_model_prompt_and_bearer_token() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/chat/completions")
            .header("authorization", "Bearer test-key")
            .json_body(json!({
                "model": "test-model",
                "messages": [{ "role": "user", "content": "hi" }],
                "max_tokens": 150,
                "temperature": 0.7
            }));
        then.status(200).json_body(json!({
            "choices": [{ "message": { "role": "assistant", "content": "hello" } }]
        }));
    });

    let client = HttpCompletionClient::new(config_for(&server)).unwrap();
    let reply = client.complete(&CompletionRequest::new("hi")).await.unwrap();

    mock.assert();
    assert_eq!(reply, "hello");
}

#[tokio::test]
async fn prompt_style_sends_prompt_string() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/completions")
            .json_body_partial(r#"{ "model": "test-model", "prompt": "hi" }"#);
        then.status(200).json_body(json!({ "choices": [{ "text": "from prompt" }] }));
    });

    let config = CompletionConfig {
        endpoint: server.url("/v1/completions"),
        request_style: RequestStyle::Prompt,
        ..config_for(&server)
    };
    let client = HttpCompletionClient::new(config).unwrap();
    let reply = client.complete(&CompletionRequest::new("hi")).await.unwrap();

    mock.assert();
    assert_eq!(reply, "from prompt");
}

#[tokio::test]
async fn attachments_are_described_in_the_prompt() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/chat/completions")
            .body_contains("Attached files:")
            .body_contains("notes.txt (text/plain, 5 bytes)");
        then.status(200).json_body(json!({ "choices": [{ "message": { "content": "got it" } }] }));
    });

    let client = HttpCompletionClient::new(config_for(&server)).unwrap();
    let request = CompletionRequest {
        text: "read this".to_string(),
        attachments: vec![Attachment::from_bytes("notes.txt", b"hello".to_vec())],
    };

    assert_eq!(client.complete(&request).await.unwrap(), "got it");
    mock.assert();
}

#[tokio::test]
async fn non_success_status_is_reported() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/v1/chat/completions");
        then.status(401).body("bad key");
    });

    let client = HttpCompletionClient::new(config_for(&server)).unwrap();
    let err = client.complete(&CompletionRequest::new("hi")).await.unwrap_err();

    match err {
        CompletionError::Status { code, body } => {
            assert_eq!(code, 401);
            assert_eq!(body, "bad key");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn unexpected_shape_is_malformed() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/v1/chat/completions");
        then.status(200).json_body(json!({ "output": "wrong place" }));
    });

    let client = HttpCompletionClient::new(config_for(&server)).unwrap();
    let err = client.complete(&CompletionRequest::new("hi")).await.unwrap_err();
    assert!(matches!(err, CompletionError::Malformed(_)));
}

#[tokio::test]
async fn unreachable_endpoint_is_a_transport_error() {
    let config = CompletionConfig {
        endpoint: "http://127.0.0.1:1/v1/chat/completions".to_string(),
        timeout_seconds: 5,
        ..CompletionConfig::default()
    };
    let client = HttpCompletionClient::new(config).unwrap();
    let err = client.complete(&CompletionRequest::new("hi")).await.unwrap_err();
    assert!(matches!(err, CompletionError::Transport(_)));
}

#[tokio::test]
async fn store_turns_failures_into_error_reply() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/v1/chat/completions");
        then.status(500);
    });

    let client = HttpCompletionClient::new(config_for(&server)).unwrap();
    let mut store = MessageStore::new("Hello!");
    store.append_user_message(&client, "hi", Vec::new()).await.unwrap();

    let contents: Vec<&str> = store.messages().iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["Hello!", "hi", ERROR_REPLY]);
    assert!(!store.is_waiting_for_reply());
}

#[tokio::test]
async fn remote_upload_assigns_returned_urls() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/upload")
            .header_exists("content-type")
            .body_contains("a.txt")
            .body_contains("b.txt");
        then.status(200).json_body(json!({
            "urls": ["https://files.example.com/1", "https://files.example.com/2"]
        }));
    });

    let uploader = Uploader::new(Some(server.url("/upload")));
    let mut files = vec![
        Attachment::from_bytes("a.txt", b"a".to_vec()),
        Attachment::from_bytes("b.txt", b"b".to_vec()),
    ];
    uploader.publish(&mut files).await;

    mock.assert();
    assert_eq!(files[0].url.as_deref(), Some("https://files.example.com/1"));
    assert_eq!(files[1].url.as_deref(), Some("https://files.example.com/2"));
}

#[tokio::test]
async fn failed_upload_falls_back_to_local_urls() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/upload");
        then.status(503);
    });

    let uploader = Uploader::new(Some(server.url("/upload")));
    let mut files = vec![Attachment::from_bytes("a.txt", b"a".to_vec())];
    uploader.publish(&mut files).await;

    assert_eq!(files[0].url.as_deref(), Some("data:text/plain;base64,YQ=="));
}
