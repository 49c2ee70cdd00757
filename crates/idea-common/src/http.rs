/// Retry, backoff and error-body handling shared by the provider clients.
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::StatusCode;
use serde::Deserialize;
use tracing::warn;

#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub max_error_body_bytes: usize,
}

impl RetryPolicy {
    /// Read the shared `AI_*` retry knobs.
    ///
    /// Retries default to zero: a failed generation is reported to the caller, who
    /// decides whether to ask again. Operators can opt in with `AI_MAX_RETRIES`.
    pub fn from_env() -> Self {
        let max_retries = std::env::var("AI_MAX_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(0);

        let initial_backoff = std::env::var("AI_RETRY_INITIAL_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or_else(|| Duration::from_millis(200));

        let max_backoff = std::env::var("AI_RETRY_MAX_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or_else(|| Duration::from_millis(5_000));

        let max_error_body_bytes = std::env::var("AI_MAX_ERROR_BODY_BYTES")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(8 * 1024);

        Self {
            max_retries,
            initial_backoff,
            max_backoff,
            max_error_body_bytes,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_millis(5_000),
            max_error_body_bytes: 8 * 1024,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("no API key configured ({0})")]
    MissingCredential(&'static str),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid response JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("upstream returned error: status={status} message={message}")]
    Upstream { status: StatusCode, message: String },

    #[error("upstream returned non-JSON error: status={status} body={body}")]
    UpstreamBody { status: StatusCode, body: String },
}

pub(crate) fn build_http(user_agent: &str) -> Result<reqwest::Client, ClientError> {
    Ok(reqwest::Client::builder().user_agent(user_agent).build()?)
}

pub(crate) async fn parse_json_response<T: for<'de> Deserialize<'de>>(
    resp: reqwest::Response,
    max_error_body_bytes: usize,
) -> Result<T, ClientError> {
    if resp.status().is_success() {
        let body = resp.bytes().await?;
        return Ok(serde_json::from_slice::<T>(&body)?);
    }
    Err(to_upstream_error(resp, max_error_body_bytes).await)
}

async fn to_upstream_error(resp: reqwest::Response, max_error_body_bytes: usize) -> ClientError {
    let status = resp.status();
    let body = read_limited_text(resp, max_error_body_bytes).await;
    if let Ok(parsed) = serde_json::from_str::<ErrorEnvelope>(&body) {
        let message = parsed
            .error
            .message
            .unwrap_or_else(|| "unknown upstream error".to_string());
        return ClientError::Upstream { status, message };
    }
    ClientError::UpstreamBody { status, body }
}

pub(crate) async fn request_with_retry<T, Fut, F>(
    policy: &RetryPolicy,
    mut f: F,
) -> Result<T, ClientError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ClientError>>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match f().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                if attempt > policy.max_retries || !should_retry(&e) {
                    return Err(e);
                }
                let delay = backoff_delay(policy.initial_backoff, policy.max_backoff, attempt - 1);
                warn!(
                    attempt,
                    delay_ms = delay.as_millis(),
                    error = %e,
                    "ai request failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

fn should_retry(err: &ClientError) -> bool {
    match err {
        ClientError::Request(e) => e.is_timeout() || e.is_connect() || e.is_request(),
        ClientError::Upstream { status, .. } | ClientError::UpstreamBody { status, .. } => {
            *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
        }
        ClientError::InvalidJson(_) | ClientError::MissingCredential(_) => false,
    }
}

fn backoff_delay(initial: Duration, max: Duration, exponent: u32) -> Duration {
    let mult = 1u128.checked_shl(exponent).unwrap_or(u128::MAX);
    let base_ms = initial.as_millis().saturating_mul(mult);
    let capped_ms = std::cmp::min(base_ms, max.as_millis()) as u64;
    let jitter_cap = std::cmp::max(1, capped_ms / 4);
    let jitter_ms = pseudo_jitter_ms(jitter_cap);
    Duration::from_millis(capped_ms.saturating_add(jitter_ms))
}

fn pseudo_jitter_ms(max_inclusive: u64) -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0));
    let nanos = now.subsec_nanos() as u64;
    nanos % (max_inclusive + 1)
}

async fn read_limited_text(resp: reqwest::Response, max_bytes: usize) -> String {
    match resp.bytes().await {
        Ok(mut b) => {
            if b.len() > max_bytes {
                b.truncate(max_bytes);
            }
            String::from_utf8_lossy(&b).to_string()
        }
        Err(e) => {
            warn!(error = %e, "failed to read upstream error body");
            "<failed to read error body>".to_string()
        }
    }
}

/// Both Gemini and OpenAI-compatible hosts wrap failures as `{"error": {"message": ...}}`.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorObject,
}

#[derive(Debug, Deserialize)]
struct ErrorObject {
    message: Option<String>,
}
