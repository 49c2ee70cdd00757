use idea_common::error::CommonError;

use crate::model::{Difficulty, DomainFilter};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Caller input that does not name a known level, domain or provider.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("no catalog ideas for {domain} at {level} level; try AI mode")]
    NoMatchingTemplate {
        level: Difficulty,
        domain: DomainFilter,
    },

    #[error("ai provider unavailable: {0}")]
    AdapterUnavailable(String),

    #[error("malformed ai response: {0}")]
    MalformedResponse(String),

    #[error("history persistence failed: {0}")]
    Persistence(#[from] CommonError),

    #[error("config error: {0}")]
    Config(String),

    #[error("invalid catalog: {0}")]
    Catalog(String),
}
