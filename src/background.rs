/// Background service worker: context menu lifecycle and click dispatch

use crate::config::{self, ConfigCache, KEY_ACCESS_TOKEN, KEY_SERVER_URL, KEY_TOPICS};
use crate::dispatch::send;
use crate::menu::{RebuildGate, build_menu, flatten_menu, resolve_click};
use crate::request::{NotificationOptions, build_request};
use crate::storage::ChromeStore;
use crate::trigger::{
    Anchor, BADGE_CLEAR_MS, Badge, ClickInfo, PayloadPlan, TabInfo, TriggerError, fetch_image,
    link_payload, pick_anchor_text, plan_payload, require_grant,
};
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{JsFuture, spawn_local};

// Import JS bridge functions
#[wasm_bindgen(module = "/js/background.js")]
extern "C" {
    #[wasm_bindgen(catch)]
    async fn removeAllMenus() -> Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn createMenuItem(props: JsValue) -> Result<(), JsValue>;

    fn setBadge(text: &str, color: &str);

    #[wasm_bindgen(catch)]
    async fn findAnchors(tab_id: i32) -> Result<JsValue, JsValue>;

    async fn sleep(ms: i32);
}

thread_local! {
    static CONFIG_CACHE: Rc<ConfigCache> = Rc::new(ConfigCache::new());
    static MENU_REBUILD: Rc<RebuildGate> = Rc::new(RebuildGate::new());
}

fn config_cache() -> Rc<ConfigCache> {
    CONFIG_CACHE.with(Rc::clone)
}

/// Answer to the host permission prompt, `None` when it failed or never ran
async fn permission_answer(permission: Option<js_sys::Promise>) -> Option<bool> {
    let promise = permission?;
    match JsFuture::from(promise).await {
        Ok(answer) => answer.as_bool(),
        Err(e) => {
            log::warn!("Permission prompt failed: {:?}", e);
            None
        }
    }
}

#[wasm_bindgen]
pub fn on_installed() {
    spawn_local(async move {
        match config::seed_defaults(&ChromeStore::sync()).await {
            Ok(true) => log::info!("The ntfy configuration is set to empty"),
            Ok(false) => {}
            Err(e) => log::error!("Failed to seed settings: {}", e),
        }
        refresh_menu().await;
    });
}

#[wasm_bindgen]
pub fn on_startup() {
    spawn_local(refresh_menu());
}

/// `chrome.storage.onChanged` hook
#[wasm_bindgen]
pub fn on_storage_changed(changes: JsValue, area: String) {
    if area != "sync" {
        return;
    }

    let touches = |key: &str| js_sys::Reflect::has(&changes, &JsValue::from_str(key)).unwrap_or(false);
    if !touches(KEY_TOPICS) && !touches(KEY_SERVER_URL) && !touches(KEY_ACCESS_TOKEN) {
        return;
    }

    config_cache().invalidate();
    if touches(KEY_TOPICS) || touches(KEY_SERVER_URL) {
        spawn_local(refresh_menu());
    }
}

/// `chrome.contextMenus.onClicked` hook.
///
/// For image clicks the loader issues the host permission prompt itself,
/// synchronously inside the browser event, and hands over its promise: the
/// module may still be loading when the click arrives.
#[wasm_bindgen]
pub fn on_context_menu_clicked(info: JsValue, tab: JsValue, permission: JsValue) {
    let info: ClickInfo = match serde_wasm_bindgen::from_value(info) {
        Ok(info) => info,
        Err(e) => {
            log::error!("Unreadable menu click: {:?}", e);
            return;
        }
    };
    let tab = serde_wasm_bindgen::from_value::<Option<TabInfo>>(tab).ok().flatten();
    let permission = permission.dyn_into::<js_sys::Promise>().ok();

    spawn_local(async move {
        let badge = match handle_click(info, tab, permission).await {
            Ok(()) => Badge::Success,
            Err(e) => {
                log::error!("Failed to send notification: {}", e);
                Badge::Failure
            }
        };
        show_badge(badge).await;
    });
}

async fn refresh_menu() {
    let gate = MENU_REBUILD.with(Rc::clone);
    if !gate.begin() {
        log::debug!("Context menu rebuild queued");
        return;
    }

    loop {
        match rebuild_context_menu().await {
            Ok(count) => log::info!("Context menu rebuilt with {} entries", count),
            Err(e) => log::error!("Failed to rebuild context menu: {}", e),
        }
        if !gate.finish() {
            break;
        }
    }
}

/// Tear down every entry, then build the tree for the current topics.
/// Callers go through `refresh_menu` so two rebuilds never interleave.
pub async fn rebuild_context_menu() -> Result<usize, String> {
    removeAllMenus()
        .await
        .map_err(|e| format!("Failed to remove menus: {:?}", e))?;

    let config = config_cache()
        .get(&ChromeStore::sync())
        .await
        .map_err(|e| format!("Failed to load config: {}", e))?;

    let items = flatten_menu(&build_menu(&config));
    for item in &items {
        let props = serde_wasm_bindgen::to_value(item)
            .map_err(|e| format!("Failed to serialize menu item: {:?}", e))?;
        createMenuItem(props)
            .await
            .map_err(|e| format!("Failed to create menu item {}: {:?}", item.id, e))?;
    }

    Ok(items.len())
}

async fn handle_click(
    info: ClickInfo,
    tab: Option<TabInfo>,
    permission: Option<js_sys::Promise>,
) -> Result<(), TriggerError> {
    let config = config_cache().get(&ChromeStore::sync()).await?;
    let target = resolve_click(&config, &info.menu_item_id)?;

    let options = match plan_payload(target.context, &info, tab.as_ref())? {
        PayloadPlan::Ready(options) => options,
        PayloadPlan::Image { src_url } => {
            require_grant(&src_url, permission_answer(permission).await)?;
            let attachment = fetch_image(&reqwest::Client::new(), &src_url).await?;
            NotificationOptions {
                attachment: Some(attachment),
                ..Default::default()
            }
        }
        PayloadPlan::Link { url, known_text } => {
            let text = match known_text {
                Some(text) => text,
                None => lookup_link_text(tab.as_ref(), &url).await,
            };
            link_payload(&url, &text)
        }
    };

    let request = build_request(&config, &target.topic, &options)?;
    send(&reqwest::Client::new(), &request).await?;
    log::info!("Sent {} to {}", target.context.as_str(), target.topic);
    Ok(())
}

/// Anchor text for `url` on the tab's page. Failures only cost the title.
async fn lookup_link_text(tab: Option<&TabInfo>, url: &str) -> String {
    let Some(tab_id) = tab.and_then(|t| t.id) else {
        return String::new();
    };

    let anchors = match findAnchors(tab_id).await {
        Ok(anchors_js) => serde_wasm_bindgen::from_value::<Vec<Anchor>>(anchors_js),
        Err(e) => {
            log::warn!("Link title lookup failed: {:?}", e);
            return String::new();
        }
    };

    match anchors {
        Ok(anchors) => pick_anchor_text(&anchors, url),
        Err(e) => {
            log::warn!("Unreadable anchors: {:?}", e);
            String::new()
        }
    }
}

async fn show_badge(badge: Badge) {
    setBadge(badge.text(), badge.color());
    sleep(BADGE_CLEAR_MS).await;
    setBadge("", badge.color());
}
