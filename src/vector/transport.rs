// Shared HTTP plumbing for the REST vector backends: bounded retry with
// exponential backoff on transient failures, fail-fast on client errors.

use anyhow::{Context, Result, anyhow};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

pub(crate) const RETRY_ATTEMPTS: u32 = 3;
const BACKOFF_BASE_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Method {
    Get,
    Post,
    Put,
    Delete,
}

/// Send a JSON request, retrying server errors and transport failures with
/// exponential backoff. Client errors other than 429 fail immediately.
pub(crate) fn send_json(
    agent: &ureq::Agent,
    method: Method,
    url: &str,
    headers: &[(&'static str, String)],
    body: Option<&Value>,
) -> Result<Value> {
    let body_text = match body {
        Some(json) => Some(serde_json::to_string(json).context("Failed to encode request body")?),
        None => None,
    };

    let mut last_error = None;

    for attempt in 1..=RETRY_ATTEMPTS {
        debug!("HTTP request attempt {}/{} to {}", attempt, RETRY_ATTEMPTS, url);

        match perform(agent, method, url, headers, body_text.as_deref()) {
            Ok(response_text) => {
                return serde_json::from_str(&response_text)
                    .context("Failed to parse response body as JSON");
            }
            Err(error) => {
                let should_retry = match &error {
                    ureq::Error::StatusCode(status) => {
                        if *status >= 500 || *status == 429 {
                            warn!(
                                "Server error (status {}) from {}, attempt {}/{}",
                                status, url, attempt, RETRY_ATTEMPTS
                            );
                            true
                        } else {
                            return Err(anyhow!("Client error: HTTP {} from {}", status, url));
                        }
                    }
                    ureq::Error::ConnectionFailed
                    | ureq::Error::HostNotFound
                    | ureq::Error::Timeout(_)
                    | ureq::Error::Io(_) => {
                        warn!(
                            "Transport error calling {}: {}, attempt {}/{}",
                            url, error, attempt, RETRY_ATTEMPTS
                        );
                        true
                    }
                    _ => return Err(anyhow!("Non-retryable error calling {}: {}", url, error)),
                };

                if should_retry {
                    last_error = Some(anyhow!("Request error: {}", error));
                    if attempt < RETRY_ATTEMPTS {
                        let delay = Duration::from_millis(BACKOFF_BASE_MS * 2u64.pow(attempt - 1));
                        std::thread::sleep(delay);
                    }
                }
            }
        }
    }

    Err(last_error.unwrap_or_else(|| anyhow!("Request to {} failed after retries", url)))
}

fn perform(
    agent: &ureq::Agent,
    method: Method,
    url: &str,
    headers: &[(&'static str, String)],
    body: Option<&str>,
) -> Result<String, ureq::Error> {
    match (method, body) {
        (Method::Get, _) => {
            let mut request = agent.get(url);
            for (name, value) in headers {
                request = request.header(*name, value);
            }
            request.call()
        }
        (Method::Post, Some(text)) => {
            let mut request = agent.post(url);
            for (name, value) in headers {
                request = request.header(*name, value);
            }
            request.send(text)
        }
        (Method::Put, Some(text)) => {
            let mut request = agent.put(url);
            for (name, value) in headers {
                request = request.header(*name, value);
            }
            request.send(text)
        }
        (Method::Delete, Some(text)) => {
            let mut request = agent.delete(url);
            for (name, value) in headers {
                request = request.header(*name, value);
            }
            request.force_send_body().send(text)
        }
        (Method::Post | Method::Put, None) => {
            let mut request = agent.post(url);
            for (name, value) in headers {
                request = request.header(*name, value);
            }
            request.send("{}")
        }
        (Method::Delete, None) => {
            let mut request = agent.delete(url);
            for (name, value) in headers {
                request = request.header(*name, value);
            }
            request.call()
        }
    }
    .and_then(|mut response| response.body_mut().read_to_string())
}

/// Trim trailing slashes so path joining stays predictable.
pub(crate) fn normalize_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
