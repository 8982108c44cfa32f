//! HTTP error mapping
//!
//! Turns non-2xx responses and reqwest failures into [`RemoteCallError`]
//! variants, summarising error bodies so messages stay readable:
//!
//! | Status        | Variant                 | Body in message |
//! |---------------|-------------------------|-----------------|
//! | 401, 403      | `AuthenticationFailed`  | omitted         |
//! | 404           | `NotFound`              | summarised      |
//! | other 4xx     | `Client`                | summarised      |
//! | 5xx           | `Server`                | summarised      |
//! | anything else | `InvalidResponse`       | summarised      |

use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{error, warn};

use scriptmirror_core::domain::RemoteCallError;

/// Longest body snippet carried in an error message
pub const MAX_BODY_SNIPPET: usize = 2000;

/// Collapses whitespace runs and caps the result at [`MAX_BODY_SNIPPET`] chars
pub fn snippet(body: &str) -> String {
    let collapsed = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= MAX_BODY_SNIPPET {
        collapsed
    } else {
        collapsed.chars().take(MAX_BODY_SNIPPET).collect()
    }
}

/// Best human-readable message for an error body
///
/// JSON bodies yield their `message`, `error` or `error_description` field
/// (in that order); anything else is reduced to a snippet. A blank body
/// yields `reason`.
pub fn summarize_error_body(body: &str, reason: &str) -> String {
    if body.trim().is_empty() {
        return reason.to_string();
    }

    let Ok(serde_json::Value::Object(fields)) = serde_json::from_str::<serde_json::Value>(body)
    else {
        return snippet(body);
    };

    for key in ["message", "error", "error_description"] {
        if let Some(value) = fields.get(key) {
            return match value {
                serde_json::Value::String(s) => s.clone(),
                other => snippet(&other.to_string()),
            };
        }
    }
    snippet(body)
}

/// Maps a non-success status to a typed error
pub fn status_error(status: StatusCode, body: &str, context: &str) -> RemoteCallError {
    let reason = status.canonical_reason().unwrap_or("Unknown status");
    let code = status.as_u16();

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        warn!(status = code, context, body = "<omitted>", "Authentication rejected");
        return RemoteCallError::AuthenticationFailed(format!("{}: {}", context, reason));
    }

    let message = format!("{}: {}", context, summarize_error_body(body, reason));

    if status == StatusCode::NOT_FOUND {
        warn!(status = code, context, "Resource not found");
        RemoteCallError::NotFound(message)
    } else if status.is_client_error() {
        warn!(status = code, context, body = %snippet(body), "Client error");
        RemoteCallError::Client {
            status: code,
            message,
        }
    } else if status.is_server_error() {
        error!(status = code, context, body = %snippet(body), "Server error");
        RemoteCallError::Server {
            status: code,
            message,
        }
    } else {
        error!(status = code, context, "Unexpected status");
        RemoteCallError::InvalidResponse(format!("unexpected status {}: {}", code, message))
    }
}

/// Maps a reqwest failure (no usable response) to a typed error
pub fn transport_error(err: reqwest::Error, context: &str) -> RemoteCallError {
    if err.is_decode() {
        RemoteCallError::InvalidResponse(format!("{}: {}", context, err))
    } else {
        RemoteCallError::Transport(format!("{}: {}", context, err))
    }
}

/// Passes 2xx responses through; reads the body of anything else into an error
pub async fn ensure_success(response: Response, context: &str) -> Result<Response, RemoteCallError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, &body, context))
}

/// Sends a request and requires a 2xx response
pub async fn send(builder: RequestBuilder, context: &str) -> Result<Response, RemoteCallError> {
    let response = builder
        .send()
        .await
        .map_err(|e| transport_error(e, context))?;
    ensure_success(response, context).await
}

/// Decodes a JSON response body
pub async fn read_json<T: DeserializeOwned>(
    response: Response,
    context: &str,
) -> Result<T, RemoteCallError> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| transport_error(e, context))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| RemoteCallError::InvalidResponse(format!("{}: {}", context, e)))
}

/// Parses a base URL that path segments can be appended to
pub fn parse_base_url(base_url: &str) -> Result<Url, RemoteCallError> {
    let url = Url::parse(base_url)
        .map_err(|e| RemoteCallError::Transport(format!("Invalid base URL '{}': {}", base_url, e)))?;
    if url.cannot_be_a_base() {
        return Err(RemoteCallError::Transport(format!(
            "Invalid base URL '{}': cannot carry a path",
            base_url
        )));
    }
    Ok(url)
}

/// Appends percent-encoded path segments to `base`
pub fn join_segments(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}
