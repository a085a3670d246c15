/// Extension settings: relay connection, topics and UI preferences

use crate::storage::{KeyValueStore, StorageError};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

pub const KEY_SERVER_URL: &str = "serverUrl";
pub const KEY_ACCESS_TOKEN: &str = "accessToken";
pub const KEY_TOPICS: &str = "topics";
pub const KEY_THEME: &str = "theme";
pub const KEY_PRIORITY: &str = "priority";
pub const KEY_LAST_TAGS: &str = "lastTags";
pub const KEY_LAST_TOPIC: &str = "lastTopic";
pub const KEY_SEND_ANOTHER: &str = "sendAnotherEnabled";

/// Relay connection settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub server_url: String,
    pub access_token: String,
    pub topics: Vec<String>,
}

impl Config {
    pub fn new(server_url: &str, access_token: &str, topics: &[&str]) -> Config {
        Config {
            server_url: server_url.to_string(),
            access_token: access_token.to_string(),
            topics: topics.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// A server URL and at least one topic are required before anything can be sent
    pub fn is_configured(&self) -> bool {
        !self.server_url.trim().is_empty() && !self.topics.is_empty()
    }

    pub fn has_topic(&self, topic: &str) -> bool {
        self.topics.iter().any(|t| t == topic)
    }

    /// Web UI address for a topic, or the bare server URL when the topic is unknown
    pub fn topic_page_url(&self, topic: &str) -> String {
        if !topic.is_empty() && self.has_topic(topic) {
            format!("{}/{}", self.server_url.trim_end_matches('/'), topic)
        } else {
            self.server_url.clone()
        }
    }
}

/// Split the stored comma-joined topic list, keeping first occurrences in order
pub fn parse_topics(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .fold(Vec::new(), |mut topics, topic| {
            if !topics.iter().any(|t: &String| t == topic) {
                topics.push(topic.to_string());
            }
            topics
        })
}

pub fn join_topics(topics: &[String]) -> String {
    topics.join(",")
}

/// Notification priority, 1 (min) to 5 (max). 3 is the relay default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Priority(u8);

impl Priority {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;
    pub const DEFAULT: Priority = Priority(3);

    pub fn new(value: u8) -> Option<Priority> {
        (Self::MIN..=Self::MAX).contains(&value).then_some(Priority(value))
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    pub fn is_default(&self) -> bool {
        *self == Self::DEFAULT
    }

    pub fn all() -> impl Iterator<Item = Priority> {
        (Self::MIN..=Self::MAX).map(Priority)
    }

    pub fn label(&self) -> &'static str {
        match self.0 {
            1 => "Min",
            2 => "Low",
            3 => "Default",
            4 => "High",
            _ => "Urgent",
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u8> for Priority {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Priority::new(value).ok_or_else(|| format!("priority {} out of range 1-5", value))
    }
}

impl From<Priority> for u8 {
    fn from(priority: Priority) -> u8 {
        priority.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Auto,
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Auto => "auto",
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn parse(value: &str) -> Theme {
        match value {
            "light" => Theme::Light,
            "dark" => Theme::Dark,
            _ => Theme::Auto,
        }
    }

    pub fn all() -> [Theme; 3] {
        [Theme::Auto, Theme::Light, Theme::Dark]
    }
}

/// Popup preferences remembered between sends
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Preferences {
    pub theme: Theme,
    pub priority: Priority,
    pub last_tags: Vec<String>,
    pub last_topic: Option<String>,
    pub send_another: bool,
}

pub async fn load_config<S: KeyValueStore>(store: &S) -> Result<Config, StorageError> {
    let server_url: Option<String> = store.get(KEY_SERVER_URL).await?;
    let access_token: Option<String> = store.get(KEY_ACCESS_TOKEN).await?;
    let topics: Option<String> = store.get(KEY_TOPICS).await?;

    Ok(Config {
        server_url: server_url.unwrap_or_default(),
        access_token: access_token.unwrap_or_default(),
        topics: topics.as_deref().map(parse_topics).unwrap_or_default(),
    })
}

pub async fn save_config<S: KeyValueStore>(store: &S, config: &Config) -> Result<(), StorageError> {
    store.set(KEY_SERVER_URL, &config.server_url.trim()).await?;
    store.set(KEY_ACCESS_TOKEN, &config.access_token).await?;
    store.set(KEY_TOPICS, &join_topics(&config.topics)).await
}

/// Load preferences. A remembered topic that is no longer configured is dropped,
/// and unreadable values fall back to their defaults.
pub async fn load_preferences<S: KeyValueStore>(
    store: &S,
    config: &Config,
) -> Result<Preferences, StorageError> {
    let theme: Option<String> = store.get(KEY_THEME).await?;
    let priority: Option<u8> = store.get(KEY_PRIORITY).await.unwrap_or_default();
    let last_tags: Option<Vec<String>> = store.get(KEY_LAST_TAGS).await.unwrap_or_default();
    let last_topic: Option<String> = store.get(KEY_LAST_TOPIC).await?;
    let send_another: Option<bool> = store.get(KEY_SEND_ANOTHER).await.unwrap_or_default();

    Ok(Preferences {
        theme: theme.as_deref().map(Theme::parse).unwrap_or_default(),
        priority: priority.and_then(Priority::new).unwrap_or_default(),
        last_tags: last_tags.unwrap_or_default(),
        last_topic: last_topic.filter(|t| config.has_topic(t)),
        send_another: send_another.unwrap_or(false),
    })
}

pub async fn save_preferences<S: KeyValueStore>(store: &S, prefs: &Preferences) -> Result<(), StorageError> {
    store.set(KEY_THEME, &prefs.theme.as_str()).await?;
    store.set(KEY_PRIORITY, &prefs.priority.value()).await?;
    store.set(KEY_LAST_TAGS, &prefs.last_tags).await?;
    match &prefs.last_topic {
        Some(topic) => store.set(KEY_LAST_TOPIC, topic).await?,
        None => store.remove(KEY_LAST_TOPIC).await?,
    }
    store.set(KEY_SEND_ANOTHER, &prefs.send_another).await
}

/// Write empty settings on first install so every surface sees an "unconfigured" state
pub async fn seed_defaults<S: KeyValueStore>(store: &S) -> Result<bool, StorageError> {
    let existing = load_config(store).await?;
    if !existing.server_url.is_empty() || !existing.topics.is_empty() {
        return Ok(false);
    }

    save_config(store, &Config::default()).await?;
    Ok(true)
}

/// Read-through cache of the stored [`Config`].
///
/// The cached value is never mutated: a change notification drops it and the
/// next reader loads a fresh snapshot. Every invalidation bumps a generation,
/// and a load that was overtaken by one is thrown away and repeated.
#[derive(Debug, Default)]
pub struct ConfigCache {
    current: RefCell<Option<Rc<Config>>>,
    generation: Cell<u64>,
}

impl ConfigCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get<S: KeyValueStore>(&self, store: &S) -> Result<Rc<Config>, StorageError> {
        loop {
            if let Some(config) = self.current.borrow().as_ref() {
                return Ok(Rc::clone(config));
            }

            let generation = self.generation.get();
            let config = Rc::new(load_config(store).await?);
            if self.generation.get() == generation {
                *self.current.borrow_mut() = Some(Rc::clone(&config));
                return Ok(config);
            }
            log::debug!("Settings changed while loading, reloading");
        }
    }

    pub fn invalidate(&self) {
        self.generation.set(self.generation.get().wrapping_add(1));
        self.current.borrow_mut().take();
    }

    pub fn is_cached(&self) -> bool {
        self.current.borrow().is_some()
    }
}
