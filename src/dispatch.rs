/// Sends a built request to the relay

use crate::request::{NtfyRequest, RequestBody};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use thiserror::Error;

/// Longest response excerpt kept in a failure
pub const ERROR_BODY_CHARS: usize = 50;

#[derive(Debug, Error, PartialEq)]
pub enum SendError {
    #[error("{status} {body}")]
    Status { status: u16, body: String },
    #[error("{0}")]
    Transport(String),
    #[error("invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },
}

impl SendError {
    /// Status line for the popup
    pub fn user_message(&self) -> String {
        match self {
            SendError::Status { .. } => format!("Failed: {}", self),
            SendError::InvalidHeader { name, .. } => format!(
                "Error: {} cannot contain line breaks or control characters",
                header_field(name)
            ),
            SendError::Transport(_) => format!("Error: {}", self),
        }
    }
}

/// Form field a metadata header is filled from
fn header_field(name: &str) -> &str {
    match name {
        crate::request::HEADER_MESSAGE => "The message",
        crate::request::HEADER_TITLE => "The title",
        crate::request::HEADER_TAGS => "Tags",
        crate::request::HEADER_FILENAME => "The file name",
        _ => name,
    }
}

pub fn truncate_chars(input: &str, max_chars: usize) -> String {
    input.chars().take(max_chars).collect()
}

/// 2xx is success; anything else carries the status and a body excerpt
pub fn check_status(status: u16, body: &str) -> Result<(), SendError> {
    if (200..300).contains(&status) {
        Ok(())
    } else {
        Err(SendError::Status {
            status,
            body: truncate_chars(body, ERROR_BODY_CHARS),
        })
    }
}

fn header_map(request: &NtfyRequest) -> Result<HeaderMap, SendError> {
    let mut headers = HeaderMap::new();
    for (name, value) in &request.headers {
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| SendError::InvalidHeader {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        let header_value = HeaderValue::from_str(value).map_err(|e| SendError::InvalidHeader {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        headers.insert(header_name, header_value);
    }
    Ok(headers)
}

/// POST the request once. No retries and no timeout beyond the platform default.
pub async fn send(client: &reqwest::Client, request: &NtfyRequest) -> Result<(), SendError> {
    let headers = header_map(request)?;
    let body = match &request.body {
        RequestBody::Text(text) => reqwest::Body::from(text.clone()),
        RequestBody::Binary(bytes) => reqwest::Body::from(bytes.clone()),
    };

    log::debug!("POST {} ({} bytes)", request.url, request.body.as_bytes().len());

    let response = client
        .post(&request.url)
        .headers(headers)
        .body(body)
        .send()
        .await
        .map_err(|e| SendError::Transport(e.to_string()))?;

    let status = response.status().as_u16();
    if response.status().is_success() {
        log::info!("Notification accepted by {} (HTTP {})", request.url, status);
        return Ok(());
    }

    let body = response.text().await.unwrap_or_default();
    log::warn!("Relay rejected notification: HTTP {}", status);
    check_status(status, &body)
}
