use std::sync::Arc;

use rmcp::{
    Json, ServerHandler,
    handler::server::router::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::*,
    tool, tool_handler, tool_router,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::info;

use idea_common::kv::HistoryBackend;

use crate::adapter::ProviderClient;
use crate::history::{HistoryStore, HISTORY_LIMIT};
use crate::model::{AiProvider, Difficulty, Domain, DomainFilter, GenerationConfig, Idea};
use crate::orchestrator::Orchestrator;

#[derive(Clone)]
pub struct IdeaServer {
    orchestrator: Arc<Orchestrator<ProviderClient>>,
    history: Arc<Mutex<HistoryStore<HistoryBackend>>>,
    default_provider: AiProvider,
    tool_router: ToolRouter<IdeaServer>,
}

impl IdeaServer {
    pub fn new(
        orchestrator: Orchestrator<ProviderClient>,
        history: HistoryStore<HistoryBackend>,
        default_provider: AiProvider,
    ) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            history: Arc::new(Mutex::new(history)),
            default_provider,
            tool_router: Self::tool_router(),
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct GenerateIdeaParams {
    /// One of "beginner", "intermediate", "professional".
    level: String,
    /// One of "all", "web", "app", "ai", "iot", "blockchain", "cybersecurity".
    domain: String,
    /// Ask an AI provider instead of picking from the curated catalog (default: false).
    #[serde(default)]
    use_ai: bool,
    /// "gemini" or "nvidia"; defaults to the server's configured provider.
    provider: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct GetIdeaParams {
    id: String,
}

#[derive(Debug, Serialize, JsonSchema)]
struct HistoryResponse {
    /// Newest first.
    ideas: Vec<Idea>,
    latest: Option<Idea>,
    /// Short list of the ideas generated before the latest one.
    previous: Vec<IdeaSummary>,
    limit: usize,
}

#[derive(Debug, Serialize, JsonSchema)]
struct IdeaSummary {
    id: String,
    title: String,
    level: Difficulty,
}

const PREVIOUS_SHOWN: usize = 5;

#[derive(Debug, Serialize, JsonSchema)]
struct OkResponse {
    ok: bool,
}

#[derive(Debug, Serialize, JsonSchema)]
struct LevelOption {
    id: Difficulty,
    label: String,
    description: String,
}

#[derive(Debug, Serialize, JsonSchema)]
struct DomainOption {
    id: String,
    label: String,
}

#[derive(Debug, Serialize, JsonSchema)]
struct ProviderOption {
    id: AiProvider,
    default: bool,
}

#[derive(Debug, Serialize, JsonSchema)]
struct OptionsResponse {
    levels: Vec<LevelOption>,
    domains: Vec<DomainOption>,
    providers: Vec<ProviderOption>,
    catalog_size: usize,
}

#[tool_router]
impl IdeaServer {
    #[tool(description = "Generate a final-year project idea for a difficulty level and domain, either from the curated catalog (use_ai=false) or from an AI provider (use_ai=true). The idea is added to history.")]
    async fn generate_idea(
        &self,
        Parameters(params): Parameters<GenerateIdeaParams>,
    ) -> Result<Json<Idea>, String> {
        let provider = params
            .provider
            .unwrap_or_else(|| self.default_provider.to_string());
        let config = GenerationConfig::parse(&params.level, &params.domain, params.use_ai, &provider)
            .map_err(|e| e.to_string())?;

        let idea = self
            .orchestrator
            .request(config)
            .await
            .map_err(|e| e.to_string())?;

        self.history
            .lock()
            .await
            .record(idea.clone())
            .await
            .map_err(|e| e.to_string())?;
        Ok(Json(idea))
    }

    #[tool(description = "Look up a previously generated idea by id without changing history.")]
    async fn get_idea(
        &self,
        Parameters(params): Parameters<GetIdeaParams>,
    ) -> Result<Json<Idea>, String> {
        let history = self.history.lock().await;
        let found = history.select(params.id.trim()).cloned();
        found
            .map(Json)
            .ok_or_else(|| format!("idea not found: {}", params.id))
    }

    #[tool(description = "List the most recently generated ideas, newest first.")]
    async fn list_history(&self) -> Result<Json<HistoryResponse>, String> {
        let history = self.history.lock().await;
        let previous = history
            .recent(PREVIOUS_SHOWN)
            .iter()
            .map(|idea| IdeaSummary {
                id: idea.id.clone(),
                title: idea.title.clone(),
                level: idea.level,
            })
            .collect();
        Ok(Json(HistoryResponse {
            ideas: history.entries().to_vec(),
            latest: history.latest().cloned(),
            previous,
            limit: HISTORY_LIMIT,
        }))
    }

    #[tool(description = "Delete all generated ideas from history.")]
    async fn clear_history(&self) -> Result<Json<OkResponse>, String> {
        self.history
            .lock()
            .await
            .clear()
            .await
            .map_err(|e| e.to_string())?;
        info!("history cleared");
        Ok(Json(OkResponse { ok: true }))
    }

    #[tool(description = "List the accepted levels, domains and AI providers with display labels.")]
    async fn list_options(&self) -> Result<Json<OptionsResponse>, String> {
        let levels = Difficulty::ALL
            .into_iter()
            .map(|d| LevelOption {
                id: d,
                label: d.label().to_string(),
                description: d.description().to_string(),
            })
            .collect();
        let domains = std::iter::once(DomainFilter::All)
            .chain(Domain::ALL.into_iter().map(DomainFilter::Only))
            .map(|d| DomainOption {
                id: d.to_string(),
                label: d.label().to_string(),
            })
            .collect();
        let providers = self
            .orchestrator
            .providers()
            .into_iter()
            .map(|p| ProviderOption {
                id: p,
                default: p == self.default_provider,
            })
            .collect();
        Ok(Json(OptionsResponse {
            levels,
            domains,
            providers,
            catalog_size: self.orchestrator.catalog().len(),
        }))
    }
}

#[tool_handler]
impl ServerHandler for IdeaServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_06_18,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "idea-engine".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Final-year project idea generator. Call list_options to see valid levels and \
domains, then generate_idea. Catalog mode (use_ai=false) may have no match for a combination; \
switch to use_ai=true in that case. Past ideas are available via list_history and get_idea."
                    .to_string(),
            ),
        }
    }
}
