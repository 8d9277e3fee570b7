// Providers module
// Blocking HTTP clients for the embedding and generation services

pub mod gemini;
pub mod ollama;


use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

pub use gemini::GeminiClient;
pub use ollama::OllamaClient;

/// Longest slice of an unparseable error body kept in a [`ServiceError`]
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Failure of a single call to an external embedding or generation service
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Invalid request: {0}")]
    Request(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl ServiceError {
    /// Whether the same request may succeed if sent again later
    #[inline]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Request(_) | Self::MalformedResponse(_) => false,
        }
    }
}

/// Build an agent that hands non-2xx responses back instead of failing, so
/// the provider's error body can be reported
pub(crate) fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build()
        .into()
}

/// Resolve `path` below `base_url`, keeping any path prefix the base carries
/// (`https://proxy/gemini` + `v1beta/models` is `https://proxy/gemini/v1beta/models`)
pub(crate) fn join_url(base_url: &Url, path: &str) -> Result<Url, ServiceError> {
    let mut base = base_url.clone();
    if !base.path().ends_with('/') {
        let prefix = format!("{}/", base.path());
        base.set_path(&prefix);
    }

    base.join(path.trim_start_matches('/'))
        .map_err(|e| ServiceError::Request(format!("Failed to build URL for {}: {}", path, e)))
}

/// Perform one request and return the body of a successful response.
///
/// There is no retry here: a failed call is reported to the caller, which
/// owns the retry policy. `error_message` pulls the provider's own message
/// out of an error body when it has one.
pub(crate) fn execute<F>(
    url: &Url,
    request_fn: F,
    error_message: fn(&str) -> Option<String>,
) -> Result<String, ServiceError>
where
    F: FnOnce() -> Result<ureq::http::Response<ureq::Body>, ureq::Error>,
{
    debug!("Sending request to {}", url);

    let mut response = request_fn().map_err(|e| classify_error(url, &e))?;
    let status = response.status();
    let body = response.body_mut().read_to_string().map_err(|e| {
        ServiceError::Transport(format!("Failed to read response from {}: {}", url, e))
    })?;

    if status.is_success() {
        debug!("Request to {} succeeded ({} bytes)", url, body.len());
        return Ok(body);
    }

    let message = error_message(&body)
        .unwrap_or_else(|| body.trim().chars().take(MAX_ERROR_BODY_CHARS).collect());
    warn!("Request to {} failed with status {}: {}", url, status, message);

    Err(ServiceError::Status {
        status: status.as_u16(),
        message,
    })
}

fn classify_error(url: &Url, error: &ureq::Error) -> ServiceError {
    match error {
        ureq::Error::StatusCode(status) => ServiceError::Status {
            status: *status,
            message: "request rejected".to_string(),
        },
        ureq::Error::ConnectionFailed
        | ureq::Error::HostNotFound
        | ureq::Error::Timeout(_)
        | ureq::Error::Io(_) => {
            warn!("Transport error for {}: {}", url, error);
            ServiceError::Transport(format!("{}: {}", url, error))
        }
        _ => {
            warn!("Non-retryable error for {}: {}", url, error);
            ServiceError::Request(format!("{}: {}", url, error))
        }
    }
}

pub(crate) fn parse_response<'de, T: serde::Deserialize<'de>>(
    body: &'de str,
    what: &str,
) -> Result<T, ServiceError> {
    serde_json::from_str(body)
        .map_err(|e| ServiceError::MalformedResponse(format!("Failed to parse {}: {}", what, e)))
}

pub(crate) fn to_json<T: serde::Serialize>(request: &T, what: &str) -> Result<String, ServiceError> {
    serde_json::to_string(request)
        .map_err(|e| ServiceError::Request(format!("Failed to serialize {}: {}", what, e)))
}
