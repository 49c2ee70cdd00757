/// Error types shared across the idea crates.
///
/// These errors represent failures in infrastructure components (Redis, the history files)
/// rather than in idea generation itself. Application-specific errors are defined in the
/// engine crate and wrap `CommonError` via `#[from]`.

#[derive(Debug, thiserror::Error)]
pub enum CommonError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("redis unavailable")]
    RedisUnavailable,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
