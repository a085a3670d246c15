/// UI module exports

pub mod components;
pub mod filepicker;
pub mod popup;
pub mod settings;

use crate::config::Theme;

/// Reflect the theme on `body[data-theme]`, where the stylesheet picks it up
pub fn apply_theme(theme: Theme) {
    let body = web_sys::window()
        .and_then(|w| w.document())
        .and_then(|d| d.body());

    if let Some(body) = body {
        if let Err(e) = body.set_attribute("data-theme", theme.as_str()) {
            log::warn!("Failed to apply theme: {:?}", e);
        }
    }
}

/// Theme passed to a helper window as `?theme=<name>`
pub fn theme_from_query(search: &str) -> Theme {
    url::form_urlencoded::parse(search.trim_start_matches('?').as_bytes())
        .find(|(key, _)| key == "theme")
        .map(|(_, value)| Theme::parse(&value))
        .unwrap_or_default()
}
