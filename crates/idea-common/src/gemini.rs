/// Client for Gemini's native `generateContent` endpoint.
///
/// Only the subset the idea engine needs is modeled: a single user turn, a JSON
/// response constrained by a schema, optional Google Search grounding, and the
/// grounding chunks that come back with the first candidate.
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::http::{self, ClientError, RetryPolicy};

#[derive(Clone, Debug)]
pub struct GeminiClientConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub default_timeout: Duration,
    pub retry: RetryPolicy,
}

impl GeminiClientConfig {
    pub fn from_env() -> Self {
        let base_url = std::env::var("GEMINI_BASE_URL")
            .unwrap_or_else(|_| "https://generativelanguage.googleapis.com/v1beta".to_string());

        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());

        let model =
            std::env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-3-flash-preview".to_string());

        let default_timeout = std::env::var("GEMINI_TIMEOUT_SECS")
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
pub struct GeminiClient {
    config: GeminiClientConfig,
    http: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: GeminiClientConfig) -> Result<Self, ClientError> {
        let http = http::build_http("idea-engine/gemini")?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &GeminiClientConfig {
        &self.config
    }

    pub async fn generate_content(
        &self,
        request: GenerateContentRequest,
    ) -> Result<GenerateContentResponse, ClientError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(ClientError::MissingCredential("GEMINI_API_KEY"))?;
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url, self.config.model
        );
        let timeout = self.config.default_timeout;
        let max_error_body_bytes = self.config.retry.max_error_body_bytes;
        http::request_with_retry(&self.config.retry, || {
            let req = request.clone();
            let url = url.clone();
            async move {
                let resp = self
                    .http
                    .post(&url)
                    .header("x-goog-api-key", api_key)
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

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
}

impl GenerateContentRequest {
    /// One user prompt whose answer must be JSON matching `schema`.
    pub fn structured(prompt: &str, schema: serde_json::Value, search: bool) -> Self {
        let tools = if search {
            vec![Tool {
                google_search: Some(GoogleSearch {}),
            }]
        } else {
            Vec::new()
        };
        Self {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
            generation_config: Some(GenerationConfig {
                response_mime_type: Some("application/json".to_string()),
                response_json_schema: Some(schema),
            }),
            tools,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_json_schema: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_search: Option<GoogleSearch>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GoogleSearch {}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate; `None` when there is no text at all.
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// Why the first candidate stopped, e.g. `SAFETY` or `MAX_TOKENS`.
    pub fn finish_reason(&self) -> Option<&str> {
        self.candidates.first()?.finish_reason.as_deref()
    }

    /// Web grounding chunks attached to the first candidate.
    pub fn web_chunks(&self) -> Vec<&WebChunk> {
        self.candidates
            .first()
            .and_then(|c| c.grounding_metadata.as_ref())
            .map(|m| m.grounding_chunks.iter().filter_map(|g| g.web.as_ref()).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<Content>,
    pub finish_reason: Option<String>,
    pub grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingMetadata {
    #[serde(default)]
    pub grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroundingChunk {
    pub web: Option<WebChunk>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebChunk {
    pub uri: Option<String>,
    pub title: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_request_carries_schema_and_search_tool() {
        let req = GenerateContentRequest::structured(
            "give me an idea",
            serde_json::json!({"type": "object"}),
            true,
        );
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(value["contents"][0]["parts"][0]["text"], "give me an idea");
        assert_eq!(
            value["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert_eq!(value["generationConfig"]["responseJsonSchema"]["type"], "object");
        assert!(value["tools"][0]["googleSearch"].is_object());

        let plain = GenerateContentRequest::structured("x", serde_json::json!({}), false);
        let value = serde_json::to_value(&plain).unwrap();
        assert!(value.get("tools").is_none());
    }

    #[test]
    fn response_text_and_grounding_chunks() {
        let resp: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "{\"a\":"}, {"text": "1}"}]},
                "finishReason": "STOP",
                "groundingMetadata": {
                    "groundingChunks": [
                        {"web": {"uri": "https://example.com", "title": "Example"}},
                        {"retrievedContext": {}},
                        {"web": {"title": "No link"}}
                    ]
                }
            }]
        }))
        .unwrap();
        assert_eq!(resp.text().as_deref(), Some("{\"a\":1}"));
        assert_eq!(resp.finish_reason(), Some("STOP"));
        let chunks = resp.web_chunks();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].uri.as_deref(), Some("https://example.com"));
        assert_eq!(chunks[1].uri, None);
    }

    /// Accept one connection, read the full request, answer with `status_line` and `body`.
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
                    let len = head
                        .lines()
                        .find_map(|l| l.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if buf.len() >= end + 4 + len {
                        break;
                    }
                }
            }
            let response = format!(
                "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });
        format!("http://{addr}")
    }

    fn client(base_url: String) -> GeminiClient {
        GeminiClient::new(GeminiClientConfig {
            base_url,
            api_key: Some("test-key".to_string()),
            model: "m".to_string(),
            default_timeout: Duration::from_secs(5),
            retry: RetryPolicy::default(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn successful_status_with_non_json_body_is_invalid_json() {
        let base = serve_once("HTTP/1.1 200 OK", "this is not json").await;
        let err = client(base)
            .generate_content(GenerateContentRequest::structured("x", serde_json::json!({}), false))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidJson(_)), "{err}");
    }

    #[tokio::test]
    async fn successful_status_with_wrong_shape_is_invalid_json() {
        let base = serve_once("HTTP/1.1 200 OK", "{\"candidates\": \"nope\"}").await;
        let err = client(base)
            .generate_content(GenerateContentRequest::structured("x", serde_json::json!({}), false))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidJson(_)), "{err}");
    }

    #[tokio::test]
    async fn error_envelope_becomes_upstream_error() {
        let base = serve_once(
            "HTTP/1.1 400 Bad Request",
            "{\"error\": {\"message\": \"schema rejected\"}}",
        )
        .await;
        let err = client(base)
            .generate_content(GenerateContentRequest::structured("x", serde_json::json!({}), false))
            .await
            .unwrap_err();
        match err {
            ClientError::Upstream { status, message } => {
                assert_eq!(status.as_u16(), 400);
                assert_eq!(message, "schema rejected");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_candidates_have_no_text() {
        let resp: GenerateContentResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(resp.text().is_none());
        assert!(resp.web_chunks().is_empty());
    }
}
