//! Shared HTTP plumbing for connectors and model providers.
//!
//! Every outbound call goes through [`send_with_retry`], which applies the
//! same policy everywhere:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - Other 4xx → fail immediately
//! - Network errors → retry
//!
//! Backoff is exponential: 1s, 2s, 4s, … capped at 32s.

use anyhow::{bail, Result};
use reqwest::{Client, RequestBuilder, Response};
use std::time::Duration;

/// User agent sent with every upstream request.
pub const USER_AGENT: &str = concat!("ngo-report/", env!("CARGO_PKG_VERSION"));

/// Build a client with a per-request timeout.
pub fn build_client(timeout_secs: u64) -> Result<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(USER_AGENT)
        .build()?)
}

/// Send a request, retrying transient failures up to `max_retries` times.
///
/// `service` names the upstream in error messages (e.g. `"ReliefWeb"`).
/// On success the response has a 2xx status.
pub async fn send_with_retry(
    request: RequestBuilder,
    max_retries: u32,
    service: &str,
) -> Result<Response> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tracing::debug!(service, attempt, ?delay, "retrying upstream request");
            tokio::time::sleep(delay).await;
        }

        let Some(req) = request.try_clone() else {
            // Streaming bodies cannot be replayed; send once.
            return check(request.send().await?, service).await;
        };

        match req.send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return Ok(response);
                }

                let body_text = response.text().await.unwrap_or_default();
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(anyhow::anyhow!(
                        "{} API error {}: {}",
                        service,
                        status,
                        truncate(&body_text, 300)
                    ));
                    continue;
                }

                bail!(
                    "{} API error {}: {}",
                    service,
                    status,
                    truncate(&body_text, 300)
                );
            }
            Err(e) => {
                last_err = Some(anyhow::anyhow!("{} request failed: {}", service, e));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("{} request failed after retries", service)))
}

async fn check(response: Response, service: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body_text = response.text().await.unwrap_or_default();
    bail!(
        "{} API error {}: {}",
        service,
        status,
        truncate(&body_text, 300)
    )
}

/// Cut `s` to at most `max` bytes on a char boundary.
pub fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Join a base URL and a path without doubling the slash.
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello", 3), "hel");
        // 'é' is two bytes; cutting inside it backs off.
        assert_eq!(truncate("café", 4), "caf");
    }

    #[test]
    fn test_join_url() {
        assert_eq!(
            join_url("https://api.reliefweb.int/", "/v1/reports"),
            "https://api.reliefweb.int/v1/reports"
        );
        assert_eq!(join_url("http://x", "a"), "http://x/a");
    }

    #[tokio::test]
    async fn test_network_error_is_reported_with_service_name() {
        let client = build_client(2).unwrap();
        // Port 9 (discard) on localhost is almost never listening.
        let err = send_with_retry(client.get("http://127.0.0.1:9/"), 0, "World Bank")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("World Bank"));
    }
}
