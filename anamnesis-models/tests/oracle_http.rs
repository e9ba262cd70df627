//! ProviderOracle against a canned local HTTP endpoint.

use std::sync::Arc;
use std::time::Duration;

use anamnesis_core::{OracleClient, OracleRequest, OracleRole, Parsed};
use anamnesis_models::ProviderOracle;
use anamnesis_models::auth::ApiKey;
use anamnesis_models::providers::{OllamaProvider, OpenAiCompatProvider};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Serve one HTTP request with `status` and `body`; hands back the raw request.
async fn serve_once(status: &'static str, body: String) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut raw = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&raw);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if raw.len() >= end + 4 + length {
                    break;
                }
            }
        }
        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        let _ = tx.send(String::from_utf8_lossy(&raw).into_owned());
    });
    (format!("http://{addr}"), rx)
}

#[tokio::test]
async fn openai_compatible_reply_reaches_the_engine_cleaned() {
    let body = serde_json::json!({
        "choices": [{
            "message": {"role": "assistant", "content": "<think>hmm</think>```json\n{\"score\": 2, \"summary\": \"ok\"}\n```"},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5}
    })
    .to_string();
    let (base_url, request_rx) = serve_once("200 OK", body).await;
    let provider = OpenAiCompatProvider::new(format!("{base_url}/v1"), Some(ApiKey::new("sk-test")));
    let client = OracleClient::new(Arc::new(ProviderOracle::new(Arc::new(provider), "gpt-test")))
        .with_timeout(Duration::from_secs(5));

    let reply = client
        .ask(&OracleRequest::new(OracleRole::Scorer, "Topic: Sleep").expect_json())
        .await
        .unwrap();

    assert_eq!(reply, r#"{"score": 2, "summary": "ok"}"#);
    let raw = request_rx.await.unwrap();
    assert!(raw.starts_with("POST /v1/chat/completions"));
    assert!(raw.to_ascii_lowercase().contains("authorization: bearer sk-test"));
    assert!(raw.contains(r#""response_format":{"type":"json_object"}"#));
}

#[tokio::test]
async fn provider_error_status_degrades_to_default() {
    let (base_url, _rx) = serve_once("500 Internal Server Error", r#"{"error": "boom"}"#.into()).await;
    let provider = OllamaProvider::with_base_url(base_url);
    let client = OracleClient::new(Arc::new(ProviderOracle::new(Arc::new(provider), "llama3")));

    let parsed = client
        .ask_text(&OracleRequest::new(OracleRole::Interviewer, "next question"), "fallback")
        .await;

    assert!(parsed.is_fallback());
    assert!(matches!(parsed, Parsed::Fallback { ref value, .. } if value == "fallback"));
}
