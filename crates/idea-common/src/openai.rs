use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::http::{self, ClientError, RetryPolicy};

/// Connection settings for an OpenAI-compatible chat-completions host.
///
/// The idea engine points this at NVIDIA's hosted endpoint, but nothing here is
/// NVIDIA-specific.
#[derive(Clone, Debug)]
pub struct OpenAiClientConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub default_timeout: Duration,
    pub retry: RetryPolicy,
}

impl OpenAiClientConfig {
    pub fn from_env() -> Self {
        let base_url = std::env::var("NVIDIA_BASE_URL")
            .unwrap_or_else(|_| "https://integrate.api.nvidia.com/v1".to_string());

        let api_key = std::env::var("NVIDIA_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());

        let model = std::env::var("NVIDIA_MODEL")
            .unwrap_or_else(|_| "meta/llama-3.1-70b-instruct".to_string());

        let default_timeout = std::env::var("NVIDIA_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(60));

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            default_timeout,
            retry: RetryPolicy::from_env(),
        }
    }
}

#[derive(Clone)]
pub struct OpenAiClient {
    config: OpenAiClientConfig,
    http: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(config: OpenAiClientConfig) -> Result<Self, ClientError> {
        let http = http::build_http("idea-engine/openai")?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &OpenAiClientConfig {
        &self.config
    }

    pub async fn chat_completions(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ClientError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(ClientError::MissingCredential("NVIDIA_API_KEY"))?;
        let url = format!("{}/chat/completions", self.config.base_url);
        let timeout = self.config.default_timeout;
        let max_error_body_bytes = self.config.retry.max_error_body_bytes;
        http::request_with_retry(&self.config.retry, || {
            let req = request.clone();
            let url = url.clone();
            async move {
                let resp = self
                    .http
                    .post(&url)
                    .bearer_auth(api_key)
                    .timeout(timeout)
                    .json(&req)
                    .send()
                    .await?;
                http::parse_json_response(resp, max_error_body_bytes).await
            }
        })
        .await
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

/// Structured-output constraint: `{"type": "json_schema", "json_schema": {...}}`.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: String,
    pub json_schema: JsonSchemaFormat,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonSchemaFormat {
    pub name: String,
    pub schema: serde_json::Value,
}

impl ResponseFormat {
    pub fn json_schema(name: &str, schema: serde_json::Value) -> Self {
        Self {
            kind: "json_schema".to_string(),
            json_schema: JsonSchemaFormat {
                name: name.to_string(),
                schema,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<ChatCompletionChoice>,
}

impl ChatCompletionResponse {
    /// Text of the first choice, if the host returned any.
    pub fn text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .filter(|s| !s.trim().is_empty())
    }

    /// Why the first choice stopped, e.g. `length` when the output was cut off.
    pub fn finish_reason(&self) -> Option<&str> {
        self.choices.first().and_then(|c| c.finish_reason.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionChoice {
    pub message: ChatCompletionMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionMessage {
    pub content: Option<String>,
}
