use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;
use crate::error::GenerationError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatMessage {
    fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

/// Produces the text of the day.
#[async_trait]
pub trait MessageGenerator: Send + Sync {
    async fn generate(&self) -> Result<String, GenerationError>;
}

/// Settings for one chat-completion request.
#[derive(Debug, Clone)]
pub struct CompletionSettings {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub system_prompt: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl From<&Config> for CompletionSettings {
    fn from(config: &Config) -> Self {
        Self {
            base_url: config.provider_base_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model_id.clone(),
            system_prompt: config.system_prompt.clone(),
            prompt: config.prompt_text.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout: config.request_timeout,
        }
    }
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct LlmClient {
    client: reqwest::Client,
    settings: CompletionSettings,
}

impl LlmClient {
    pub fn new(settings: CompletionSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .context("Failed to build HTTP client for provider")?;
        Ok(Self { client, settings })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl MessageGenerator for LlmClient {
    async fn generate(&self) -> Result<String, GenerationError> {
        let request = ChatRequest {
            model: self.settings.model.clone(),
            messages: vec![
                ChatMessage::new("system", &self.settings.system_prompt),
                ChatMessage::new("user", &self.settings.prompt),
            ],
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };

        let url = self.endpoint();
        debug!("Sending request to provider: {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.settings.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerationError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| GenerationError::Unreachable(e.to_string()))?;
        let chat_response: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(GenerationError::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn settings(base_url: String) -> CompletionSettings {
        CompletionSettings {
            base_url,
            api_key: "test_key".to_string(),
            model: "m".to_string(),
            system_prompt: "You are a helpful assistant creating inspiring messages.".to_string(),
            prompt: "p".to_string(),
            temperature: 0.8,
            max_tokens: 150,
            timeout: Duration::from_secs(5),
        }
    }

    fn client(server: &MockServer) -> LlmClient {
        LlmClient::new(settings(server.base_url())).expect("client")
    }

    #[tokio::test]
    async fn test_generate_returns_trimmed_first_choice() {
        let server = MockServer::start_async().await;

        let completion_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/chat/completions")
                .header("Authorization", "Bearer test_key")
                .is_true(|req| {
                    let body: serde_json::Value = match serde_json::from_slice(req.body().as_ref()) {
                        Ok(v) => v,
                        Err(_) => return false,
                    };
                    body["model"] == "m"
                        && body["max_tokens"] == 150
                        && body["messages"][0]["role"] == "system"
                        && body["messages"][1]["role"] == "user"
                        && body["messages"][1]["content"] == "p"
                        && body["messages"].as_array().map(|m| m.len()) == Some(2)
                });
            then.status(200).json_body(json!({
                "choices": [
                    { "message": { "role": "assistant", "content": "  Be kind today.\n" } },
                    { "message": { "role": "assistant", "content": "ignored" } }
                ]
            }));
        });

        let text = client(&server).generate().await.unwrap();

        assert_eq!(text, "Be kind today.");
        completion_mock.assert_calls(1);
    }

    #[tokio::test]
    async fn test_trailing_slash_in_base_url() {
        let server = MockServer::start_async().await;

        let completion_mock = server.mock(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200).json_body(json!({
                "choices": [ { "message": { "role": "assistant", "content": "Hi" } } ]
            }));
        });

        let client = LlmClient::new(settings(format!("{}/v1/", server.base_url()))).unwrap();
        assert_eq!(client.generate().await.unwrap(), "Hi");
        completion_mock.assert_calls(1);
    }

    #[tokio::test]
    async fn test_non_success_status() {
        let server = MockServer::start_async().await;

        let completion_mock = server.mock(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(429).body("rate limited");
        });

        let err = client(&server).generate().await.unwrap_err();

        match err {
            GenerationError::Status { status, ref body } => {
                assert_eq!(status, 429);
                assert_eq!(body, "rate limited");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(err.hint().is_some());
        completion_mock.assert_calls(1);
    }

    #[tokio::test]
    async fn test_invalid_json_body() {
        let server = MockServer::start_async().await;

        server.mock(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200).body("not json");
        });

        let err = client(&server).generate().await.unwrap_err();
        assert!(matches!(err, GenerationError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_empty_choices() {
        let server = MockServer::start_async().await;

        server.mock(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200).json_body(json!({ "choices": [] }));
        });

        let err = client(&server).generate().await.unwrap_err();
        assert!(matches!(err, GenerationError::Empty));
    }

    #[tokio::test]
    async fn test_blank_content() {
        let server = MockServer::start_async().await;

        server.mock(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200).json_body(json!({
                "choices": [ { "message": { "role": "assistant", "content": "   " } } ]
            }));
        });

        let err = client(&server).generate().await.unwrap_err();
        assert!(matches!(err, GenerationError::Empty));
    }

    #[tokio::test]
    async fn test_unreachable_provider() {
        // Bind then drop a listener so the port is very likely closed.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let client = LlmClient::new(settings(format!("http://127.0.0.1:{}", port))).unwrap();
        let err = client.generate().await.unwrap_err();
        assert!(matches!(err, GenerationError::Unreachable(_)));
    }
}
