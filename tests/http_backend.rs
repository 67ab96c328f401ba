//! HTTP backend against a mock chat-completions server

mod helpers;

use helpers::completion;
use promptcheck::llm::{ChatClient, ClientConfig, Message, RequestOptions, ServiceErrorKind};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer, max_retries: u32) -> ChatClient {
    let config = ClientConfig::new("sk-test")
        .with_base_url(format!("{}/v1", server.uri()))
        .with_max_retries(max_retries)
        .with_backoff_factor(0.01)
        .with_timeout(2.0);
    ChatClient::new(config).unwrap()
}

fn ping() -> Vec<Message> {
    vec![Message::user("ping")]
}

#[tokio::test]
async fn posts_model_messages_and_options() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "messages": [{"role": "user", "content": "ping"}],
            "temperature": 0
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("pong")))
        .expect(1)
        .mount(&server)
        .await;

    let mut options = RequestOptions::new();
    options.insert("temperature".to_string(), json!(0));
    let response = client_for(&server, 0)
        .chat_async(&ping(), &options)
        .await
        .unwrap();

    assert_eq!(response["choices"][0]["message"]["content"], json!("pong"));
}

#[tokio::test]
async fn server_error_is_retried_until_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("finally")))
        .expect(1)
        .mount(&server)
        .await;

    let response = client_for(&server, 3)
        .chat_async(&ping(), &RequestOptions::new())
        .await
        .unwrap();

    assert_eq!(response["choices"][0]["message"]["content"], json!("finally"));
}

#[tokio::test]
async fn rate_limit_exhausts_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .expect(3)
        .mount(&server)
        .await;

    let error = client_for(&server, 2)
        .chat_async(&ping(), &RequestOptions::new())
        .await
        .unwrap_err();

    assert_eq!(error.kind, ServiceErrorKind::RateLimit);
    assert_eq!(error.status, Some(429));
    assert!(error.to_string().contains("slow down"));
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    for (status, kind) in [
        (400, ServiceErrorKind::BadRequest),
        (401, ServiceErrorKind::Authentication),
        (403, ServiceErrorKind::PermissionDenied),
        (404, ServiceErrorKind::NotFound),
        (422, ServiceErrorKind::Unprocessable),
    ] {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(status))
            .expect(1)
            .mount(&server)
            .await;

        let error = client_for(&server, 3)
            .chat_async(&ping(), &RequestOptions::new())
            .await
            .unwrap_err();

        assert_eq!(error.kind, kind, "status {}", status);
        server.verify().await;
    }
}

#[tokio::test]
async fn undecodable_body_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let error = client_for(&server, 3)
        .chat_async(&ping(), &RequestOptions::new())
        .await
        .unwrap_err();

    assert_eq!(error.kind, ServiceErrorKind::InvalidResponse);
}

#[tokio::test]
async fn truncated_body_is_a_retried_connection_failure() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    // Promises 200 bytes of body, sends a fragment and hangs up
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = accepted.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            let mut buffer = vec![0u8; 16 * 1024];
            let _ = socket.read(&mut buffer).await;
            let _ = socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 200\r\n\r\n{\"choi",
                )
                .await;
            let _ = socket.shutdown().await;
        }
    });

    let config = ClientConfig::new("sk-test")
        .with_base_url(format!("http://{}/v1", address))
        .with_max_retries(1)
        .with_backoff_factor(0.01)
        .with_timeout(2.0);
    let error = ChatClient::new(config)
        .unwrap()
        .chat_async(&ping(), &RequestOptions::new())
        .await
        .unwrap_err();

    assert_eq!(error.kind, ServiceErrorKind::Connection);
    assert!(error.is_transient());
    assert_eq!(accepted.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn slow_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion("late"))
                .set_delay(Duration::from_millis(1500)),
        )
        .mount(&server)
        .await;

    let config = ClientConfig::new("sk-test")
        .with_base_url(format!("{}/v1", server.uri()))
        .with_max_retries(0)
        .with_timeout(0.2);
    let error = ChatClient::new(config)
        .unwrap()
        .chat_async(&ping(), &RequestOptions::new())
        .await
        .unwrap_err();

    assert_eq!(error.kind, ServiceErrorKind::Timeout);
}

#[test]
fn blocking_path_retries_against_the_same_server() {
    // The blocking client must not run inside an async context, so the mock
    // server lives on its own runtime and the call happens on this thread.
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let server = runtime.block_on(MockServer::start());
    runtime.block_on(
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server),
    );
    runtime.block_on(
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("blocking pong")))
            .mount(&server),
    );

    let response = client_for(&server, 2)
        .chat(&ping(), &RequestOptions::new())
        .unwrap();

    assert_eq!(
        response["choices"][0]["message"]["content"],
        json!("blocking pong")
    );
    let requests = runtime.block_on(server.received_requests()).unwrap();
    assert_eq!(requests.len(), 2);
}
