use std::path::PathBuf;

use idea_common::gemini::GeminiClientConfig;
use idea_common::openai::OpenAiClientConfig;

use crate::error::EngineError;
use crate::model::AiProvider;

/// Where generated-idea history lives between runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryConfig {
    Redis(String),
    File(PathBuf),
    Memory,
}

/// Application configuration loaded explicitly from environment variables.
///
/// Provider API keys are optional: a provider without a key still answers requests,
/// but every AI call through it fails as unavailable.
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini: GeminiClientConfig,
    pub nvidia: OpenAiClientConfig,
    pub history: HistoryConfig,
    /// Provider used when a request does not name one.
    pub default_provider: AiProvider,
    /// Whether AI requests ask for web-search grounding.
    pub search: bool,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Optional:
    /// - `GEMINI_*`, `NVIDIA_*`, `AI_*`: provider clients (see the client configs)
    /// - `IDEA_HISTORY_BACKEND`: `redis`, `file` or `memory` (default: `redis` when
    ///   `REDIS_URL` is set, otherwise `file`)
    /// - `REDIS_URL`: Redis connection string for the `redis` backend
    /// - `IDEA_HISTORY_DIR`: directory for the `file` backend (default: `$HOME/.idea-engine`)
    /// - `IDEA_DEFAULT_PROVIDER`: `gemini` (default) or `nvidia`
    /// - `IDEA_SEARCH`: `false` disables search grounding
    pub fn from_env() -> Result<Self, EngineError> {
        let (history, default_provider, search) = engine_settings(|k| std::env::var(k).ok())?;
        Ok(Self {
            gemini: GeminiClientConfig::from_env(),
            nvidia: OpenAiClientConfig::from_env(),
            history,
            default_provider,
            search,
        })
    }
}

fn engine_settings(
    var: impl Fn(&str) -> Option<String>,
) -> Result<(HistoryConfig, AiProvider, bool), EngineError> {
    let redis_url = var("REDIS_URL").filter(|u| !u.trim().is_empty());
    let backend = var("IDEA_HISTORY_BACKEND").map(|b| b.trim().to_ascii_lowercase());

    let history = match backend.as_deref() {
        Some("memory") => HistoryConfig::Memory,
        Some("redis") => HistoryConfig::Redis(redis_url.ok_or_else(|| {
            EngineError::Config(
                "REDIS_URL environment variable is required for the redis history backend"
                    .to_string(),
            )
        })?),
        Some("file") => HistoryConfig::File(history_dir(&var)),
        None => match redis_url {
            Some(url) => HistoryConfig::Redis(url),
            None => HistoryConfig::File(history_dir(&var)),
        },
        Some(other) => {
            return Err(EngineError::Config(format!(
                "unknown IDEA_HISTORY_BACKEND: {other:?} (expected redis, file or memory)"
            )))
        }
    };

    let default_provider = match var("IDEA_DEFAULT_PROVIDER") {
        Some(raw) => raw
            .parse::<AiProvider>()
            .map_err(|e| EngineError::Config(format!("IDEA_DEFAULT_PROVIDER: {e}")))?,
        None => AiProvider::Gemini,
    };

    let search = var("IDEA_SEARCH")
        .map(|s| !matches!(s.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off"))
        .unwrap_or(true);

    Ok((history, default_provider, search))
}

fn history_dir(var: &impl Fn(&str) -> Option<String>) -> PathBuf {
    if let Some(dir) = var("IDEA_HISTORY_DIR").filter(|d| !d.trim().is_empty()) {
        return PathBuf::from(dir);
    }
    var("HOME")
        .or_else(|| var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".idea-engine")
}
