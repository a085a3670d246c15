/// Payload assembly for context-menu clicks

use crate::dispatch::{SendError, check_status};
use crate::menu::{MenuContext, ResolveError};
use crate::request::{Attachment, NotificationOptions, RequestError};
use crate::storage::StorageError;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

/// Badge stays up this long before it is cleared
pub const BADGE_CLEAR_MS: i32 = 2000;

const DEFAULT_IMAGE_NAME: &str = "image.png";

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("click carried no {0}")]
    MissingField(&'static str),
    #[error("permission for {0} was not granted")]
    PermissionDenied(String),
    #[error("failed to fetch image: {0}")]
    ImageFetch(String),
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error("send failed: {0}")]
    Send(#[from] SendError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// The parts of `contextMenus.OnClickData` we use
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickInfo {
    pub menu_item_id: String,
    #[serde(default)]
    pub selection_text: Option<String>,
    #[serde(default)]
    pub src_url: Option<String>,
    #[serde(default)]
    pub link_url: Option<String>,
    /// Only some browsers report the anchor text
    #[serde(default)]
    pub link_text: Option<String>,
    #[serde(default)]
    pub page_url: Option<String>,
}

/// The parts of `tabs.Tab` we use
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TabInfo {
    #[serde(default)]
    pub id: Option<i32>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

/// An `<a>` found on the page: resolved href and visible text
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Anchor {
    pub href: String,
    pub text: String,
}

/// Transient icon badge reporting a click's outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Badge {
    Success,
    Failure,
}

impl Badge {
    pub fn text(&self) -> &'static str {
        match self {
            Badge::Success => "✓",
            Badge::Failure => "✗",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Badge::Success => "#4CAF50",
            Badge::Failure => "#f44336",
        }
    }
}

/// Selected text becomes the message, without a title
pub fn selection_payload(info: &ClickInfo) -> NotificationOptions {
    NotificationOptions::text(info.selection_text.clone().unwrap_or_default())
}

/// Tab URL as message, tab title as title
pub fn page_payload(info: &ClickInfo, tab: Option<&TabInfo>) -> NotificationOptions {
    let url = tab
        .and_then(|t| t.url.clone())
        .or_else(|| info.page_url.clone())
        .unwrap_or_default();
    let title = tab.and_then(|t| t.title.clone()).unwrap_or_default();

    NotificationOptions::text(url).with_title(title)
}

/// Link URL as message; the anchor text, when known, as title
pub fn link_payload(link_url: &str, link_text: &str) -> NotificationOptions {
    NotificationOptions::text(link_url).with_title(link_text.trim())
}

/// Text of the first anchor whose href is exactly `url`, or empty
pub fn pick_anchor_text(anchors: &[Anchor], url: &str) -> String {
    anchors
        .iter()
        .filter(|a| a.href == url)
        .map(|a| a.text.trim())
        .find(|text| !text.is_empty())
        .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
        .unwrap_or_default()
}

/// Host permission pattern for an image, `None` when none is needed (e.g. `data:`)
pub fn permission_pattern(src_url: &str) -> Option<String> {
    let url = Url::parse(src_url).ok()?;
    match url.scheme() {
        "http" | "https" => Some(format!("{}/*", url.origin().ascii_serialization())),
        _ => None,
    }
}

/// Whether an image may be fetched, given the answer to the permission prompt.
///
/// `granted` is `None` when no prompt was issued or it failed. Sources that
/// need no host permission always pass.
pub fn require_grant(src_url: &str, granted: Option<bool>) -> Result<(), TriggerError> {
    match permission_pattern(src_url) {
        Some(pattern) if granted != Some(true) => Err(TriggerError::PermissionDenied(pattern)),
        _ => Ok(()),
    }
}

/// Last path segment when it looks like a file name, otherwise `image.<subtype>`
pub fn image_filename(src_url: &str, mime_type: Option<&str>) -> String {
    let Ok(url) = Url::parse(src_url) else {
        return DEFAULT_IMAGE_NAME.to_string();
    };

    let last = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();
    if last.contains('.') {
        return last.to_string();
    }

    let subtype = mime_type
        .and_then(|m| m.split(';').next())
        .and_then(|m| m.split('/').nth(1))
        .map(str::trim)
        .filter(|ext| !ext.is_empty())
        .unwrap_or("png");
    format!("image.{}", subtype)
}

/// Download an image as an attachment
pub async fn fetch_image(client: &reqwest::Client, src_url: &str) -> Result<Attachment, TriggerError> {
    let response = client
        .get(src_url)
        .send()
        .await
        .map_err(|e| TriggerError::ImageFetch(e.to_string()))?;

    let status = response.status().as_u16();
    check_status(status, "").map_err(|_| TriggerError::ImageFetch(format!("HTTP {}", status)))?;

    let mime_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = response
        .bytes()
        .await
        .map_err(|e| TriggerError::ImageFetch(e.to_string()))?;

    Ok(Attachment {
        filename: image_filename(src_url, mime_type.as_deref()),
        bytes: bytes.to_vec(),
    })
}

/// Which payload a click needs, before anything asynchronous happens
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadPlan {
    Ready(NotificationOptions),
    Image { src_url: String },
    Link { url: String, known_text: Option<String> },
}

pub fn plan_payload(
    context: MenuContext,
    info: &ClickInfo,
    tab: Option<&TabInfo>,
) -> Result<PayloadPlan, TriggerError> {
    match context {
        MenuContext::Selection => Ok(PayloadPlan::Ready(selection_payload(info))),
        MenuContext::Page => Ok(PayloadPlan::Ready(page_payload(info, tab))),
        MenuContext::Image => info
            .src_url
            .clone()
            .map(|src_url| PayloadPlan::Image { src_url })
            .ok_or(TriggerError::MissingField("image source")),
        MenuContext::Link => info
            .link_url
            .clone()
            .map(|url| PayloadPlan::Link {
                url,
                known_text: info.link_text.clone().filter(|t| !t.trim().is_empty()),
            })
            .ok_or(TriggerError::MissingField("link URL")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::menu::resolve_click;
    use crate::request::{RequestBody, build_request};

    fn create_test_click(menu_item_id: &str) -> ClickInfo {
        ClickInfo {
            menu_item_id: menu_item_id.to_string(),
            ..Default::default()
        }
    }

    fn anchor(href: &str, text: &str) -> Anchor {
        Anchor {
            href: href.to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_selection_click_end_to_end() {
        let config = Config::new("https://ntfy.example.com/app", "", &["alerts", "ops"]);
        let mut info = create_test_click("ntfy-send-selection-1");
        info.selection_text = Some("hello".to_string());

        let target = resolve_click(&config, &info.menu_item_id).unwrap();
        let plan = plan_payload(target.context, &info, None).unwrap();
        let PayloadPlan::Ready(options) = plan else {
            panic!("selection should be ready to send");
        };
        let request = build_request(&config, &target.topic, &options).unwrap();

        assert_eq!(request.url, "https://ntfy.example.com/ops");
        assert_eq!(request.body, RequestBody::Text("hello".to_string()));
        assert_eq!(request.header("X-Title"), None);
    }

    #[test]
    fn test_page_payload_uses_tab() {
        let info = create_test_click("ntfy-send-page");
        let tab = TabInfo {
            id: Some(7),
            url: Some("https://example.com/post".to_string()),
            title: Some("A post".to_string()),
        };

        let options = page_payload(&info, Some(&tab));

        assert_eq!(options.message.as_deref(), Some("https://example.com/post"));
        assert_eq!(options.title.as_deref(), Some("A post"));
    }

    #[test]
    fn test_page_payload_falls_back_to_page_url() {
        let mut info = create_test_click("ntfy-send-page");
        info.page_url = Some("https://example.com/".to_string());

        let options = page_payload(&info, None);

        assert_eq!(options.message.as_deref(), Some("https://example.com/"));
    }

    #[test]
    fn test_plan_requires_image_source() {
        let info = create_test_click("ntfy-send-image");

        let result = plan_payload(MenuContext::Image, &info, None);

        assert!(matches!(result, Err(TriggerError::MissingField(_))));
    }

    #[test]
    fn test_plan_link_keeps_browser_text() {
        let mut info = create_test_click("ntfy-send-link");
        info.link_url = Some("https://example.com/a".to_string());
        info.link_text = Some("  ".to_string());

        let plan = plan_payload(MenuContext::Link, &info, None).unwrap();

        assert_eq!(
            plan,
            PayloadPlan::Link {
                url: "https://example.com/a".to_string(),
                known_text: None,
            }
        );
    }

    #[test]
    fn test_pick_anchor_text_exact_match() {
        let anchors = vec![
            anchor("https://example.com/a?x=1", "Wrong"),
            anchor("https://example.com/a", "   "),
            anchor("https://example.com/a", "  Read\n   more  "),
        ];

        assert_eq!(pick_anchor_text(&anchors, "https://example.com/a"), "Read more");
        assert_eq!(pick_anchor_text(&anchors, "https://example.com/b"), "");
        assert_eq!(pick_anchor_text(&[], "https://example.com/a"), "");
    }

    #[test]
    fn test_link_payload() {
        let options = link_payload("https://example.com/a", " Read more ");

        assert_eq!(options.message.as_deref(), Some("https://example.com/a"));
        assert_eq!(options.title.as_deref(), Some("Read more"));
    }

    #[test]
    fn test_image_filename_from_path() {
        assert_eq!(image_filename("https://cdn.example.com/img/cat.jpg?w=200", Some("image/jpeg")), "cat.jpg");
    }

    #[test]
    fn test_image_filename_from_mime() {
        assert_eq!(image_filename("https://cdn.example.com/img/12345", Some("image/webp")), "image.webp");
        assert_eq!(image_filename("https://cdn.example.com/", Some("image/gif; charset=binary")), "image.gif");
        assert_eq!(image_filename("https://cdn.example.com/img/12345", None), "image.png");
        assert_eq!(image_filename("https://cdn.example.com/img/12345", Some("")), "image.png");
    }

    #[test]
    fn test_image_filename_unparseable_url() {
        assert_eq!(image_filename("::not a url::", Some("image/jpeg")), "image.png");
    }

    #[test]
    fn test_permission_pattern() {
        assert_eq!(
            permission_pattern("https://cdn.example.com:8443/a.png"),
            Some("https://cdn.example.com:8443/*".to_string())
        );
        assert_eq!(permission_pattern("data:image/png;base64,AAAA"), None);
        assert_eq!(permission_pattern("garbage"), None);
    }

    #[test]
    fn test_denied_grant_aborts_image() {
        let result = require_grant("https://cdn.example.com/a.png", Some(false));

        assert!(matches!(
            result,
            Err(TriggerError::PermissionDenied(pattern)) if pattern == "https://cdn.example.com/*"
        ));
        assert!(require_grant("https://cdn.example.com/a.png", None).is_err());
    }

    #[test]
    fn test_granted_or_unneeded_permission_passes() {
        assert!(require_grant("https://cdn.example.com/a.png", Some(true)).is_ok());
        assert!(require_grant("data:image/png;base64,AAAA", None).is_ok());
    }

    #[test]
    fn test_badge_styles() {
        assert_eq!(Badge::Success.text(), "✓");
        assert_eq!(Badge::Failure.color(), "#f44336");
    }

    #[test]
    fn test_click_info_from_browser_json() {
        let json = r#"{"menuItemId":"ntfy-send-image-0","srcUrl":"https://x.test/a.png","editable":false}"#;

        let info: ClickInfo = serde_json::from_str(json).unwrap();

        assert_eq!(info.menu_item_id, "ntfy-send-image-0");
        assert_eq!(info.src_url.as_deref(), Some("https://x.test/a.png"));
        assert_eq!(info.selection_text, None);
    }
}
