use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use adlens_core::errors::GatewayError;
use adlens_core::provider::{ChatMessage, ChatModel, ChatRequest};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Client for an Ollama-compatible `/api/chat` endpoint. Non-streaming.
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<ChatOptions>,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f64,
}

#[derive(Deserialize)]
struct ChatReply {
    message: Option<ReplyMessage>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: String,
}

impl OllamaProvider {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::InvalidRequest(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            timeout,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }

    fn map_transport_error(&self, error: reqwest::Error) -> GatewayError {
        if error.is_timeout() {
            GatewayError::Timeout(self.timeout)
        } else {
            GatewayError::NetworkError(error.to_string())
        }
    }
}

#[async_trait]
impl ChatModel for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip_all, fields(model = %self.model, json = request.json_output))]
    async fn complete(&self, request: &ChatRequest) -> Result<String, GatewayError> {
        let body = ChatBody {
            model: &self.model,
            messages: &request.messages,
            stream: false,
            format: request.json_output.then_some("json"),
            options: request.temperature.map(|temperature| ChatOptions { temperature }),
        };

        let resp = self
            .client
            .post(self.endpoint())
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::from_status(status, body));
        }

        let reply: ChatReply = resp
            .json()
            .await
            .map_err(|e| GatewayError::MalformedResponse(e.to_string()))?;

        if let Some(error) = reply.error {
            return Err(GatewayError::MalformedResponse(error));
        }
        let content = reply
            .message
            .map(|m| m.content)
            .ok_or_else(|| GatewayError::MalformedResponse("reply has no message".into()))?;

        debug!(chars = content.len(), "completion received");
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> OllamaProvider {
        OllamaProvider::new(server.uri(), "llama3.2:3b", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn provider_properties() {
        let p = OllamaProvider::new("http://localhost:11434/", "m", Duration::from_secs(1)).unwrap();
        assert_eq!(p.name(), "ollama");
        assert_eq!(p.model(), "m");
        assert_eq!(p.endpoint(), "http://localhost:11434/api/chat");
    }

    #[tokio::test]
    async fn complete_sends_json_format_and_temperature() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(serde_json::json!({
                "model": "llama3.2:3b",
                "stream": false,
                "format": "json",
                "options": {"temperature": 0.0}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "llama3.2:3b",
                "message": {"role": "assistant", "content": "{\"query\": \"SELECT 1\"}"},
                "done": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let request = ChatRequest::prompt("plan this").with_temperature(0.0).json();
        let text = provider(&server).complete(&request).await.unwrap();
        assert_eq!(text, r#"{"query": "SELECT 1"}"#);
    }

    #[tokio::test]
    async fn plain_request_omits_format() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message": {"role": "assistant", "content": "insight"},
                "done": true
            })))
            .mount(&server)
            .await;

        let text = provider(&server)
            .complete(&ChatRequest::prompt("hi"))
            .await
            .unwrap();
        assert_eq!(text, "insight");

        let received = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
        assert!(body.get("format").is_none());
        assert!(body.get("options").is_none());
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[tokio::test]
    async fn missing_model_maps_to_model_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(404).set_body_string(r#"{"error":"model 'x' not found"}"#),
            )
            .mount(&server)
            .await;

        let err = provider(&server)
            .complete(&ChatRequest::prompt("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::ModelNotFound(_)));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn server_error_is_retryable_classification() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = provider(&server)
            .complete(&ChatRequest::prompt("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::ServerError { status: 500, .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn error_body_with_success_status_is_malformed() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"error": "overloaded"})),
            )
            .mount(&server)
            .await;

        let err = provider(&server)
            .complete(&ChatRequest::prompt("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::MalformedResponse(msg) if msg == "overloaded"));
    }

    #[tokio::test]
    async fn unreachable_server_is_network_error() {
        let p = OllamaProvider::new("http://127.0.0.1:1", "m", Duration::from_secs(2)).unwrap();
        let err = p.complete(&ChatRequest::prompt("hi")).await.unwrap_err();
        assert!(matches!(err, GatewayError::NetworkError(_) | GatewayError::Timeout(_)));
    }
}
