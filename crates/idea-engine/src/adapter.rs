/// AI generation adapter: prompt in, validated [`Idea`] out.
///
/// The provider is reached through [`AiCapability`], which only knows how to send a
/// schema-constrained prompt and hand back raw text plus any citations. Everything that
/// makes the result a canonical idea (parsing, validation, citation filtering, identity
/// and timestamp) happens here, independent of the provider.
use std::future::Future;

use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};

use idea_common::gemini::{GeminiClient, GenerateContentRequest};
use idea_common::http::ClientError;
use idea_common::ids;
use idea_common::openai::{ChatCompletionRequest, Message, OpenAiClient, ResponseFormat};

use crate::error::EngineError;
use crate::model::{Difficulty, Domain, DomainFilter, Idea, Source};
use crate::prompt::{self, IdeaPayload};

/// Placeholder title for citations the provider left untitled.
const UNTITLED_SOURCE: &str = "Source";

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub response_schema: Value,
    /// Ask the provider to ground the answer with web search, where supported.
    pub search: bool,
}

/// What a provider returned, before any interpretation.
#[derive(Debug, Clone, Default)]
pub struct RawIdeaPayload {
    pub text: Option<String>,
    pub citations: Vec<RawCitation>,
}

#[derive(Debug, Clone, Default)]
pub struct RawCitation {
    pub title: Option<String>,
    pub uri: Option<String>,
}

pub trait AiCapability {
    fn generate(
        &self,
        request: &GenerationRequest,
    ) -> impl Future<Output = Result<RawIdeaPayload, ClientError>> + Send;
}

impl AiCapability for GeminiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<RawIdeaPayload, ClientError> {
        let body = GenerateContentRequest::structured(
            &request.prompt,
            request.response_schema.clone(),
            request.search,
        );
        let response = self.generate_content(body).await?;
        let citations = response
            .web_chunks()
            .into_iter()
            .map(|web| RawCitation {
                title: web.title.clone(),
                uri: web.uri.clone(),
            })
            .collect();
        let text = response.text();
        if text.is_none() {
            warn!(finish_reason = ?response.finish_reason(), "gemini returned no text");
        }
        Ok(RawIdeaPayload { text, citations })
    }
}

impl AiCapability for OpenAiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<RawIdeaPayload, ClientError> {
        // Chat-completions hosts have no search tool, so `request.search` is ignored.
        let body = ChatCompletionRequest {
            model: self.config().model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: "Respond with a single JSON object that matches the provided schema."
                        .to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: request.prompt.clone(),
                },
            ],
            temperature: None,
            max_tokens: None,
            response_format: Some(ResponseFormat::json_schema(
                "project_idea",
                request.response_schema.clone(),
            )),
        };
        let response = self.chat_completions(body).await?;
        let text = response.text().map(str::to_string);
        if text.is_none() {
            warn!(finish_reason = ?response.finish_reason(), "chat completion returned no text");
        }
        Ok(RawIdeaPayload {
            text,
            citations: Vec::new(),
        })
    }
}

/// The concrete provider clients, selected by [`crate::model::AiProvider`].
#[derive(Clone)]
pub enum ProviderClient {
    Gemini(GeminiClient),
    Nvidia(OpenAiClient),
}

impl AiCapability for ProviderClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<RawIdeaPayload, ClientError> {
        match self {
            ProviderClient::Gemini(c) => c.generate(request).await,
            ProviderClient::Nvidia(c) => c.generate(request).await,
        }
    }
}

pub struct AiAdapter<C> {
    capability: C,
    search: bool,
}

impl<C: AiCapability> AiAdapter<C> {
    pub fn new(capability: C) -> Self {
        Self {
            capability,
            search: true,
        }
    }

    pub fn without_search(mut self) -> Self {
        self.search = false;
        self
    }

    /// Ask the provider for one idea. Never retries; see [`normalize`] for validation.
    pub async fn generate(
        &self,
        level: Difficulty,
        domain: DomainFilter,
    ) -> Result<Idea, EngineError> {
        let request = GenerationRequest {
            prompt: prompt::build_prompt(level, domain),
            response_schema: prompt::response_schema(domain),
            search: self.search,
        };
        let raw = self
            .capability
            .generate(&request)
            .await
            .inspect_err(|e| warn!(error = %e, level = %level, domain = %domain, "ai request failed"))
            .map_err(|e| match e {
                ClientError::InvalidJson(e) => EngineError::MalformedResponse(e.to_string()),
                other => EngineError::AdapterUnavailable(other.to_string()),
            })?;
        let idea = normalize(raw, level, domain)
            .inspect_err(|e| warn!(error = %e, "ai response rejected"))?;
        info!(
            id = %idea.id,
            level = %idea.level,
            domain = %idea.domain,
            sources = idea.sources.as_ref().map_or(0, Vec::len),
            "ai idea generated"
        );
        Ok(idea)
    }
}

/// Turn a raw provider answer into a canonical idea.
///
/// The requested level always wins, as does the requested domain unless it was `all`,
/// in which case the payload must name one.
pub fn normalize(
    raw: RawIdeaPayload,
    level: Difficulty,
    domain: DomainFilter,
) -> Result<Idea, EngineError> {
    let text = raw
        .text
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| EngineError::MalformedResponse("no response text".to_string()))?;
    let payload: IdeaPayload = serde_json::from_str(&text)
        .map_err(|e| EngineError::MalformedResponse(format!("payload does not match schema: {e}")))?;

    let domain = match domain {
        DomainFilter::Only(d) => d,
        DomainFilter::All => payload
            .domain
            .as_deref()
            .ok_or_else(|| EngineError::MalformedResponse("missing domain".to_string()))?
            .parse::<Domain>()
            .map_err(|_| {
                EngineError::MalformedResponse(format!("unknown domain {:?}", payload.domain))
            })?,
    };

    let idea = Idea {
        id: ids::new_id(),
        title: payload.title,
        description: payload.description,
        level,
        domain,
        tech_stack: payload.tech_stack,
        usp: payload.usp,
        modules: payload.modules,
        roadmap: payload.roadmap,
        sources: collect_sources(raw.citations),
        timestamp: Utc::now(),
    };
    idea.validate().map_err(EngineError::MalformedResponse)?;
    Ok(idea)
}

/// Keep citations with a locator; `None` rather than an empty list when nothing survives.
fn collect_sources(citations: Vec<RawCitation>) -> Option<Vec<Source>> {
    let sources: Vec<Source> = citations
        .into_iter()
        .filter_map(|c| {
            let uri = c.uri.filter(|u| !u.trim().is_empty())?;
            let title = c
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| UNTITLED_SOURCE.to_string());
            Some(Source { title, uri })
        })
        .collect();
    if sources.is_empty() {
        None
    } else {
        Some(sources)
    }
}
