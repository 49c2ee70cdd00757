mod adapter;
mod catalog;
mod config;
mod error;
mod history;
mod model;
mod orchestrator;
mod prompt;
mod server;

use rmcp::{ServiceExt, transport::stdio};
use tracing::info;
use tracing_subscriber::EnvFilter;

use idea_common::gemini::GeminiClient;
use idea_common::kv::{FileStore, HistoryBackend, MemoryStore};
use idea_common::openai::OpenAiClient;
use idea_common::redis::RedisCache;

use adapter::{AiAdapter, ProviderClient};
use catalog::Catalog;
use config::{Config, HistoryConfig};
use history::HistoryStore;
use model::AiProvider;
use orchestrator::Orchestrator;
use server::IdeaServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing to stderr (stdout is reserved for MCP JSON-RPC)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    info!("starting idea-engine MCP server");

    // 1. Load config from environment
    let config = Config::from_env()?;
    info!(
        gemini_model = %config.gemini.model,
        gemini_key = config.gemini.api_key.is_some(),
        nvidia_model = %config.nvidia.model,
        nvidia_key = config.nvidia.api_key.is_some(),
        default_provider = %config.default_provider,
        search = config.search,
        "configuration loaded"
    );

    // 2. Catalog and AI providers
    let catalog = Catalog::bundled()?;
    info!(templates = catalog.len(), "catalog loaded");

    let adapter = |client: ProviderClient| {
        let adapter = AiAdapter::new(client);
        if config.search {
            adapter
        } else {
            adapter.without_search()
        }
    };
    let orchestrator = Orchestrator::new(catalog)
        .with_backend(
            AiProvider::Gemini,
            adapter(ProviderClient::Gemini(GeminiClient::new(config.gemini.clone())?)),
        )
        .with_backend(
            AiProvider::Nvidia,
            adapter(ProviderClient::Nvidia(OpenAiClient::new(config.nvidia.clone())?)),
        );

    // 3. History storage
    let backend = match &config.history {
        HistoryConfig::Redis(url) => {
            let redis = RedisCache::new(Some(url.as_str()));
            if redis.is_available().await {
                info!("redis connected");
            } else {
                info!("redis unavailable, history will not persist until it is reachable");
            }
            HistoryBackend::Redis(redis)
        }
        HistoryConfig::File(dir) => {
            info!(dir = %dir.display(), "using file history");
            HistoryBackend::File(FileStore::new(dir.clone()))
        }
        HistoryConfig::Memory => HistoryBackend::Memory(MemoryStore::new()),
    };
    let backend_name = backend.name();
    let history = HistoryStore::open(backend).await;
    info!(backend = backend_name, entries = history.len(), "history loaded");

    // 4. Build MCP server and serve on stdio
    let server = IdeaServer::new(orchestrator, history, config.default_provider);

    info!("MCP server ready, serving on stdio");
    let service = server.serve(stdio()).await.inspect_err(|e| {
        tracing::error!(error = %e, "MCP server error");
    })?;

    service.waiting().await?;
    info!("MCP server shut down");
    Ok(())
}
