//! HTTP retry helpers for transient errors.
//!
//! The HTTP fetcher sends every request through [`send_text`] so that
//! connection resets, timeouts, rate limiting and server errors are
//! retried with exponential backoff. The caller bounds the whole fetch
//! with its own timeout, so retries never extend a cycle past it.

use std::time::Duration;

use crate::FetchError;

/// A successfully received text response.
#[derive(Debug, Clone)]
pub struct TextResponse {
    /// Final URL after redirects.
    pub url: String,
    /// Decoded body.
    pub body: String,
    /// `Content-Type` header value, if present.
    pub content_type: Option<String>,
}

/// Sends an HTTP request and returns the response body as text.
///
/// `build_request` is called once per attempt because request builders
/// are consumed by `.send()`. If the body cannot be read the whole
/// request is re-sent, at most `max_retries` times.
///
/// # Errors
///
/// Returns [`FetchError`] if the request fails after all retries, the
/// server answers with a non-retryable status, or the body cannot be
/// read.
#[allow(clippy::future_not_send)]
pub async fn send_text<F>(build_request: F, max_retries: u32) -> Result<TextResponse, FetchError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut body_attempt = 0;

    loop {
        let response = send_inner(&build_request, max_retries).await?;

        let url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        match response.text().await {
            Ok(body) => {
                log::debug!("Received {} bytes from {url}", body.len());
                return Ok(TextResponse {
                    url,
                    body,
                    content_type,
                });
            }
            Err(e) if body_attempt < max_retries => {
                body_attempt += 1;
                let delay = backoff(body_attempt);
                log::warn!(
                    "Body read failed for {url} (retry {body_attempt}/{max_retries} in {delay:?}): {e}"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                log::error!("Body read failed for {url} after {max_retries} retries: {e}");
                return Err(FetchError::Http(e));
            }
        }
    }
}

/// Core retry loop. Returns the first response with a 2xx or 3xx status.
#[allow(clippy::future_not_send)]
async fn send_inner<F>(build_request: &F, max_retries: u32) -> Result<reqwest::Response, FetchError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut attempt = 0;

    loop {
        if attempt > 0 {
            let delay = backoff(attempt);
            log::warn!("  retry {attempt}/{max_retries} in {delay:?}...");
            tokio::time::sleep(delay).await;
        }

        match build_request().send().await {
            Err(e) => {
                if is_transient(&e) && attempt < max_retries {
                    log::warn!("  transient error: {e}");
                    attempt += 1;
                    continue;
                }
                return Err(FetchError::Http(e));
            }
            Ok(response) => {
                let status = response.status();

                if is_retryable_status(status) && attempt < max_retries {
                    log::warn!("  HTTP {status} from {}", response.url());
                    attempt += 1;
                    continue;
                }

                // Remaining 4xx are permanent; retryable statuses land here
                // once retries are exhausted.
                if status.is_client_error() || status.is_server_error() {
                    return Err(FetchError::Status {
                        status: status.as_u16(),
                        url: response.url().to_string(),
                    });
                }

                return Ok(response);
            }
        }
    }
}

/// Exponential backoff: 2s, 4s, 8s, capped at 16s.
const fn backoff(attempt: u32) -> Duration {
    let exp = if attempt > 4 { 4 } else { attempt };
    Duration::from_secs(1u64 << exp)
}

/// Returns `true` for 429 Too Many Requests and any 5xx.
fn is_retryable_status(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_decode() || e.is_request()
}
