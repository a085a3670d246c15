/// Context-menu tree built from the configured topics, and click resolution
///
/// Layout:
/// - one topic: a single "Send to ntfy (topic)" leaf per context
/// - several topics: a "Send to ntfy" group per context with one leaf per topic
///
/// Leaf ids encode the topic's position (`ntfy-send-selection-2`). The menu is
/// torn down and rebuilt whenever the topic list changes, which keeps the
/// positions in step with `Config::topics`.

use crate::config::Config;
use serde::Serialize;
use std::cell::Cell;
use std::sync::LazyLock;
use regex::Regex;
use thiserror::Error;

pub const PARENT_MENU_ID: &str = "ntfy-parent";
pub const SEND_MENU_ID: &str = "ntfy-send";
pub const MENU_TITLE: &str = "Send to ntfy";

static INDEX_SUFFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-(\d+)$").unwrap());

#[derive(Debug, Error, PartialEq)]
pub enum ResolveError {
    #[error("ntfy is not configured")]
    NotConfigured,
    #[error("unknown menu entry `{0}`")]
    UnknownEntry(String),
    #[error("menu entry `{0}` carries no topic index")]
    MissingIndex(String),
    #[error("topic index {index} out of range for {len} topics")]
    IndexOutOfRange { index: usize, len: usize },
}

/// What the user right-clicked on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuContext {
    Page,
    Selection,
    Image,
    Link,
}

impl MenuContext {
    pub const ALL: [MenuContext; 4] = [
        MenuContext::Page,
        MenuContext::Selection,
        MenuContext::Image,
        MenuContext::Link,
    ];

    /// Name used both in entry ids and as the browser's context type
    pub fn as_str(&self) -> &'static str {
        match self {
            MenuContext::Page => "page",
            MenuContext::Selection => "selection",
            MenuContext::Image => "image",
            MenuContext::Link => "link",
        }
    }

    /// Recover the context from a leaf id such as `ntfy-send-image-3`
    pub fn from_entry_id(entry_id: &str) -> Option<MenuContext> {
        let rest = entry_id.strip_prefix(SEND_MENU_ID)?.strip_prefix('-')?;
        MenuContext::ALL.into_iter().find(|context| {
            rest.strip_prefix(context.as_str())
                .is_some_and(|tail| tail.is_empty() || tail.starts_with('-'))
        })
    }

    pub fn group_id(&self) -> String {
        format!("{}-{}", PARENT_MENU_ID, self.as_str())
    }

    pub fn leaf_id(&self, topic_index: Option<usize>) -> String {
        match topic_index {
            Some(index) => format!("{}-{}-{}", SEND_MENU_ID, self.as_str(), index),
            None => format!("{}-{}", SEND_MENU_ID, self.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MenuEntry {
    Group {
        id: String,
        title: String,
        context: MenuContext,
        children: Vec<MenuEntry>,
    },
    Leaf {
        id: String,
        title: String,
        context: MenuContext,
        topic_index: usize,
    },
}

impl MenuEntry {
    pub fn id(&self) -> &str {
        match self {
            MenuEntry::Group { id, .. } | MenuEntry::Leaf { id, .. } => id,
        }
    }
}

/// Flat item as handed to `chrome.contextMenus.create`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItemProps {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub title: String,
    pub contexts: Vec<&'static str>,
}

/// Build the menu tree. Nothing is built for an unconfigured extension.
pub fn build_menu(config: &Config) -> Vec<MenuEntry> {
    if !config.is_configured() {
        return Vec::new();
    }

    if let [topic] = config.topics.as_slice() {
        return MenuContext::ALL
            .into_iter()
            .map(|context| MenuEntry::Leaf {
                id: context.leaf_id(None),
                title: format!("{} ({})", MENU_TITLE, topic),
                context,
                topic_index: 0,
            })
            .collect();
    }

    MenuContext::ALL
        .into_iter()
        .map(|context| MenuEntry::Group {
            id: context.group_id(),
            title: MENU_TITLE.to_string(),
            context,
            children: config
                .topics
                .iter()
                .enumerate()
                .map(|(index, topic)| MenuEntry::Leaf {
                    id: context.leaf_id(Some(index)),
                    title: topic.clone(),
                    context,
                    topic_index: index,
                })
                .collect(),
        })
        .collect()
}

/// Flatten the tree parents-first, ready for creation in order
pub fn flatten_menu(entries: &[MenuEntry]) -> Vec<MenuItemProps> {
    fn walk(entry: &MenuEntry, parent: Option<&str>, out: &mut Vec<MenuItemProps>) {
        match entry {
            MenuEntry::Group { id, title, context, children } => {
                out.push(MenuItemProps {
                    id: id.clone(),
                    parent_id: parent.map(str::to_string),
                    title: title.clone(),
                    contexts: vec![context.as_str()],
                });
                for child in children {
                    walk(child, Some(id.as_str()), out);
                }
            }
            MenuEntry::Leaf { id, title, context, .. } => out.push(MenuItemProps {
                id: id.clone(),
                parent_id: parent.map(str::to_string),
                title: title.clone(),
                contexts: vec![context.as_str()],
            }),
        }
    }

    let mut items = Vec::new();
    for entry in entries {
        walk(entry, None, &mut items);
    }
    items
}

/// Target of a resolved menu click
#[derive(Debug, Clone, PartialEq)]
pub struct MenuTarget {
    pub context: MenuContext,
    pub topic: String,
}

/// Map a clicked entry id back to its context and topic
pub fn resolve_click(config: &Config, entry_id: &str) -> Result<MenuTarget, ResolveError> {
    if !config.is_configured() {
        return Err(ResolveError::NotConfigured);
    }

    let context = MenuContext::from_entry_id(entry_id)
        .ok_or_else(|| ResolveError::UnknownEntry(entry_id.to_string()))?;

    if let [topic] = config.topics.as_slice() {
        return Ok(MenuTarget {
            context,
            topic: topic.clone(),
        });
    }

    let index = INDEX_SUFFIX
        .captures(entry_id)
        .and_then(|caps| caps[1].parse::<usize>().ok())
        .ok_or_else(|| ResolveError::MissingIndex(entry_id.to_string()))?;

    let topic = config
        .topics
        .get(index)
        .ok_or(ResolveError::IndexOutOfRange {
            index,
            len: config.topics.len(),
        })?;

    Ok(MenuTarget {
        context,
        topic: topic.clone(),
    })
}

/// Keeps menu rebuilds from interleaving.
///
/// A rebuild requested while one is running is folded into a single
/// follow-up pass, which starts once the running pass finishes.
#[derive(Debug, Default)]
pub struct RebuildGate {
    running: Cell<bool>,
    pending: Cell<bool>,
}

impl RebuildGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` when the caller should run the rebuild now
    pub fn begin(&self) -> bool {
        if self.running.get() {
            self.pending.set(true);
            return false;
        }
        self.running.set(true);
        true
    }

    /// `true` when another pass was requested meanwhile and must run next
    pub fn finish(&self) -> bool {
        if self.pending.replace(false) {
            return true;
        }
        self.running.set(false);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf_ids(entries: &[MenuEntry]) -> Vec<String> {
        flatten_menu(entries)
            .into_iter()
            .filter(|item| item.id.starts_with(SEND_MENU_ID))
            .map(|item| item.id)
            .collect()
    }

    #[test]
    fn test_unconfigured_builds_nothing() {
        assert!(build_menu(&Config::new("", "", &["alerts"])).is_empty());
        assert!(build_menu(&Config::new("https://ntfy.sh", "", &[])).is_empty());
    }

    #[test]
    fn test_single_topic_collapses_to_leaves() {
        let menu = build_menu(&Config::new("https://ntfy.sh", "", &["alerts"]));

        assert_eq!(menu.len(), 4);
        assert!(menu.iter().all(|e| matches!(e, MenuEntry::Leaf { topic_index: 0, .. })));
        assert_eq!(
            leaf_ids(&menu),
            vec!["ntfy-send-page", "ntfy-send-selection", "ntfy-send-image", "ntfy-send-link"]
        );
        match &menu[0] {
            MenuEntry::Leaf { title, .. } => assert_eq!(title, "Send to ntfy (alerts)"),
            other => panic!("unexpected entry {:?}", other),
        }
    }

    #[test]
    fn test_multiple_topics_build_groups() {
        let menu = build_menu(&Config::new("https://ntfy.sh", "", &["alerts", "ops", "home"]));

        assert_eq!(menu.len(), 4);
        for entry in &menu {
            match entry {
                MenuEntry::Group { children, title, .. } => {
                    assert_eq!(title, MENU_TITLE);
                    assert_eq!(children.len(), 3);
                }
                other => panic!("expected group, got {:?}", other),
            }
        }
        assert_eq!(menu[1].id(), "ntfy-parent-selection");
    }

    #[test]
    fn test_flatten_puts_parents_first() {
        let menu = build_menu(&Config::new("https://ntfy.sh", "", &["alerts", "ops"]));

        let items = flatten_menu(&menu);

        assert_eq!(items.len(), 4 * 3);
        assert_eq!(items[0].id, "ntfy-parent-page");
        assert_eq!(items[0].parent_id, None);
        assert_eq!(items[1].id, "ntfy-send-page-0");
        assert_eq!(items[1].parent_id.as_deref(), Some("ntfy-parent-page"));
        assert_eq!(items[2].title, "ops");
        assert_eq!(items[2].contexts, vec!["page"]);
    }

    #[test]
    fn test_props_serialize_camel_case() {
        let props = MenuItemProps {
            id: "ntfy-send-link-1".to_string(),
            parent_id: Some("ntfy-parent-link".to_string()),
            title: "ops".to_string(),
            contexts: vec!["link"],
        };

        let json = serde_json::to_value(&props).unwrap();

        assert_eq!(json["parentId"], "ntfy-parent-link");
        assert_eq!(json["contexts"][0], "link");
    }

    #[test]
    fn test_context_from_entry_id() {
        assert_eq!(MenuContext::from_entry_id("ntfy-send-image-3"), Some(MenuContext::Image));
        assert_eq!(MenuContext::from_entry_id("ntfy-send-selection"), Some(MenuContext::Selection));
        assert_eq!(MenuContext::from_entry_id("ntfy-send-linked"), None);
        assert_eq!(MenuContext::from_entry_id("ntfy-parent-page"), None);
        assert_eq!(MenuContext::from_entry_id("other"), None);
    }

    #[test]
    fn test_single_topic_ignores_suffix() {
        let config = Config::new("https://ntfy.sh", "", &["alerts"]);

        for id in ["ntfy-send-page", "ntfy-send-page-0", "ntfy-send-page-7", "ntfy-send-link-99"] {
            assert_eq!(resolve_click(&config, id).unwrap().topic, "alerts");
        }
    }

    #[test]
    fn test_every_built_leaf_resolves_to_its_topic() {
        let config = Config::new("https://ntfy.sh", "", &["alerts", "ops", "home", "build"]);

        for entry in build_menu(&config) {
            if let MenuEntry::Group { children, context, .. } = entry {
                for child in children {
                    if let MenuEntry::Leaf { id, topic_index, .. } = child {
                        let target = resolve_click(&config, &id).unwrap();
                        assert_eq!(target.topic, config.topics[topic_index]);
                        assert_eq!(target.context, context);
                    }
                }
            }
        }
    }

    #[test]
    fn test_resolution_failures() {
        let config = Config::new("https://ntfy.sh", "", &["alerts", "ops"]);

        assert_eq!(
            resolve_click(&config, "ntfy-send-page-2"),
            Err(ResolveError::IndexOutOfRange { index: 2, len: 2 })
        );
        assert_eq!(
            resolve_click(&config, "ntfy-send-page"),
            Err(ResolveError::MissingIndex("ntfy-send-page".to_string()))
        );
        assert_eq!(
            resolve_click(&config, "something-else-1"),
            Err(ResolveError::UnknownEntry("something-else-1".to_string()))
        );
        assert_eq!(
            resolve_click(&Config::default(), "ntfy-send-page-0"),
            Err(ResolveError::NotConfigured)
        );
    }

    #[test]
    fn test_rebuild_gate_folds_concurrent_requests() {
        let gate = RebuildGate::new();

        assert!(gate.begin());
        assert!(!gate.begin());
        assert!(!gate.begin());

        assert!(gate.finish());
        assert!(!gate.finish());
        assert!(gate.begin());
    }

    #[test]
    fn test_rebuild_gate_idle_finish() {
        let gate = RebuildGate::new();

        assert!(gate.begin());
        assert!(!gate.finish());
        assert!(gate.begin());
    }
}
