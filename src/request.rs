/// Turns a notification into a wire-ready ntfy publish request
///
/// The relay takes the message in the body and everything else in `X-*`
/// headers. Header values are restricted to a byte-safe subset, so any value
/// carrying non-ASCII text is sent as an RFC 2047 encoded word.

use crate::config::{Config, Priority};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use percent_encoding::percent_decode_str;
use thiserror::Error;
use url::Url;

pub const HEADER_AUTHORIZATION: &str = "Authorization";
pub const HEADER_TITLE: &str = "X-Title";
pub const HEADER_PRIORITY: &str = "X-Priority";
pub const HEADER_TAGS: &str = "X-Tags";
pub const HEADER_FILENAME: &str = "X-Filename";
pub const HEADER_MESSAGE: &str = "X-Message";

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("invalid server URL: {0}")]
    InvalidServerUrl(#[from] url::ParseError),
    #[error("server URL has no usable origin: {0}")]
    UnsupportedScheme(String),
}

/// Binary payload sent as the request body
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Everything the user can put into one notification
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationOptions {
    pub message: Option<String>,
    pub title: Option<String>,
    pub priority: Priority,
    pub tags: Vec<String>,
    pub attachment: Option<Attachment>,
}

impl NotificationOptions {
    pub fn text(message: impl Into<String>) -> Self {
        NotificationOptions {
            message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Text(String),
    Binary(Vec<u8>),
}

impl RequestBody {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            RequestBody::Text(text) => text.as_bytes(),
            RequestBody::Binary(bytes) => bytes,
        }
    }
}

/// A POST against `{origin}/{topic}`
#[derive(Debug, Clone, PartialEq)]
pub struct NtfyRequest {
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: RequestBody,
}

impl NtfyRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Encode a header value as `=?utf-8?B?...?=` when it holds anything outside ASCII
pub fn encode_header_value(value: &str) -> String {
    if value.is_ascii() {
        value.to_string()
    } else {
        format!("=?utf-8?B?{}?=", STANDARD.encode(value.as_bytes()))
    }
}

/// Origin of the server URL; path, query and credentials are dropped
pub fn server_origin(server_url: &str) -> Result<String, RequestError> {
    let url = Url::parse(server_url.trim())?;
    origin_of(&url)
}

fn origin_of(url: &Url) -> Result<String, RequestError> {
    let origin = url.origin();
    if !origin.is_tuple() {
        return Err(RequestError::UnsupportedScheme(url.scheme().to_string()));
    }
    Ok(origin.ascii_serialization())
}

/// Bearer token wins; otherwise `user:pass@` from the server URL becomes Basic auth
fn authorization(config: &Config, url: &Url) -> Option<String> {
    if !config.access_token.is_empty() {
        return Some(format!("Bearer {}", config.access_token));
    }

    let password = url.password()?;
    if url.username().is_empty() {
        return None;
    }

    let user = percent_decode_str(url.username()).decode_utf8_lossy();
    let password = percent_decode_str(password).decode_utf8_lossy();
    let credentials = STANDARD.encode(format!("{}:{}", user, password));
    Some(format!("Basic {}", credentials))
}

/// Build the publish request for `topic`.
///
/// The topic is not escaped; callers pass a configured topic. The only failure
/// is an unparseable server URL.
pub fn build_request(
    config: &Config,
    topic: &str,
    options: &NotificationOptions,
) -> Result<NtfyRequest, RequestError> {
    let server_url = Url::parse(config.server_url.trim())?;
    let url = format!("{}/{}", origin_of(&server_url)?, topic);

    let mut headers = Vec::new();
    if let Some(auth) = authorization(config, &server_url) {
        headers.push((HEADER_AUTHORIZATION, auth));
    }

    if let Some(title) = options.title.as_deref().filter(|t| !t.is_empty()) {
        headers.push((HEADER_TITLE, encode_header_value(title)));
    }

    if !options.priority.is_default() {
        headers.push((HEADER_PRIORITY, options.priority.value().to_string()));
    }

    if !options.tags.is_empty() {
        headers.push((HEADER_TAGS, encode_header_value(&options.tags.join(","))));
    }

    let body = match &options.attachment {
        Some(attachment) => {
            headers.push((HEADER_FILENAME, encode_header_value(&attachment.filename)));
            // The body carries the file, so the message moves into a header
            if let Some(message) = options.message.as_deref().filter(|m| !m.is_empty()) {
                headers.push((HEADER_MESSAGE, encode_header_value(message)));
            }
            RequestBody::Binary(attachment.bytes.clone())
        }
        None => RequestBody::Text(options.message.clone().unwrap_or_default()),
    };

    Ok(NtfyRequest { url, headers, body })
}
