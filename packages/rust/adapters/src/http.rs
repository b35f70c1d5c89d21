//! Shared HTTP plumbing for the networked adapters.

use std::time::Duration;

use hireflow_shared::{HireflowError, Result};
use reqwest::{Client, Response, StatusCode};

/// User-Agent sent with every request.
const USER_AGENT: &str = concat!("hireflow/", env!("CARGO_PKG_VERSION"));

/// Build the HTTP client used by all networked adapters.
pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(5))
        .timeout(timeout)
        .build()
        .map_err(|e| HireflowError::Network(format!("failed to build HTTP client: {e}")))
}

/// Map a transport-level error.
pub(crate) fn send_error(capability: &str, e: reqwest::Error) -> HireflowError {
    if e.is_timeout() {
        HireflowError::Timeout {
            capability: capability.to_string(),
            after_ms: 0,
        }
    } else {
        HireflowError::Network(format!("{capability}: {e}"))
    }
}

/// Classify a response by status code. Success passes through.
pub(crate) fn check_status(capability: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(HireflowError::connectivity(
            capability,
            format!("HTTP {status}"),
        )),
        StatusCode::TOO_MANY_REQUESTS => Err(HireflowError::RateLimited {
            retry_after_ms: retry_after_ms(&response),
        }),
        StatusCode::NOT_FOUND => Err(HireflowError::Unavailable(format!(
            "{capability}: HTTP {status}"
        ))),
        s if s.is_server_error() => Err(HireflowError::Network(format!(
            "{capability}: HTTP {status}"
        ))),
        _ => Err(HireflowError::Rejected(format!("{capability}: HTTP {status}"))),
    }
}

/// Parse a `Retry-After` header given in seconds.
fn retry_after_ms(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(|secs| secs * 1000)
}

/// Read a JSON body, mapping decode failures to `Rejected`.
pub(crate) async fn read_json<T: serde::de::DeserializeOwned>(
    capability: &str,
    response: Response,
) -> Result<T> {
    let body = response
        .text()
        .await
        .map_err(|e| HireflowError::Network(format!("{capability}: body read failed: {e}")))?;
    serde_json::from_str(&body)
        .map_err(|e| HireflowError::Rejected(format!("{capability}: malformed response: {e}")))
}
