/// Popup form logic kept apart from the Yew components

use crate::config::{Config, Preferences, Priority};
use crate::request::NotificationOptions;
use crate::staging::{Draft, StagedFile, StagingError};
use std::cell::RefCell;
use std::rc::Rc;

/// Popup window geometry for the file picker helper
pub const FILE_PICKER_WIDTH: i32 = 450;
pub const FILE_PICKER_HEIGHT: i32 = 340;

/// Field values of the compose form
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComposeForm {
    pub topic: String,
    pub title: String,
    pub message: String,
    pub tags: Vec<String>,
    pub priority: Priority,
}

impl ComposeForm {
    /// Start from saved preferences, then let a restored draft override them
    pub fn initial(config: &Config, prefs: &Preferences, draft: Option<Draft>) -> ComposeForm {
        let mut form = ComposeForm {
            topic: String::new(),
            title: String::new(),
            message: String::new(),
            tags: prefs.last_tags.clone(),
            priority: prefs.priority,
        };

        let mut draft_topic = None;
        if let Some(draft) = draft {
            form.title = draft.title.unwrap_or_default();
            form.message = draft.message.unwrap_or_default();
            if let Some(tags) = draft.tags {
                form.tags = tags;
            }
            if let Some(priority) = draft.priority {
                form.priority = priority;
            }
            draft_topic = draft.topic;
        }

        form.topic = initial_topic(config, draft_topic.as_deref(), prefs.last_topic.as_deref())
            .unwrap_or_default();
        form
    }

    pub fn to_draft(&self) -> Draft {
        let non_empty = |value: &str| (!value.is_empty()).then(|| value.to_string());
        Draft {
            title: non_empty(&self.title),
            message: non_empty(&self.message),
            topic: non_empty(&self.topic),
            tags: (!self.tags.is_empty()).then(|| self.tags.clone()),
            priority: Some(self.priority),
        }
    }

    /// Trimmed notification, with the staged file as attachment when there is one
    pub fn to_options(&self, staged: Option<&StagedFile>) -> Result<NotificationOptions, StagingError> {
        let trimmed = |value: &str| {
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_string())
        };

        Ok(NotificationOptions {
            message: Some(self.message.trim().to_string()),
            title: trimmed(&self.title),
            priority: self.priority,
            tags: self.tags.clone(),
            attachment: staged.map(StagedFile::to_attachment).transpose()?,
        })
    }

    /// Reset what a successful send consumed; tags and priority are kept
    pub fn clear_sent(&mut self) {
        self.title.clear();
        self.message.clear();
    }
}

/// Shared, always-current copy of the form.
///
/// Handlers that finish after an await edit this copy instead of the value
/// captured at click time, so edits made meanwhile survive.
#[derive(Debug, Clone, Default)]
pub struct LatestForm(Rc<RefCell<ComposeForm>>);

impl LatestForm {
    pub fn snapshot(&self) -> ComposeForm {
        self.0.borrow().clone()
    }

    pub fn replace(&self, form: ComposeForm) {
        *self.0.borrow_mut() = form;
    }

    /// Apply `edit` and return the resulting form
    pub fn update(&self, edit: impl FnOnce(&mut ComposeForm)) -> ComposeForm {
        let mut form = self.0.borrow_mut();
        edit(&mut form);
        form.clone()
    }
}

/// Draft topic, then the remembered topic, then the first configured one
pub fn initial_topic(config: &Config, draft_topic: Option<&str>, last_topic: Option<&str>) -> Option<String> {
    [draft_topic, last_topic]
        .into_iter()
        .flatten()
        .find(|topic| config.has_topic(topic))
        .map(str::to_string)
        .or_else(|| config.topics.first().cloned())
}

/// Append a trimmed value unless it is empty or already present
pub fn add_unique(items: &mut Vec<String>, value: &str) -> bool {
    let value = value.trim();
    if value.is_empty() || items.iter().any(|item| item == value) {
        return false;
    }
    items.push(value.to_string());
    true
}

/// Swap an item with the one before it
pub fn move_earlier(items: &mut [String], index: usize) -> bool {
    if index == 0 || index >= items.len() {
        return false;
    }
    items.swap(index - 1, index);
    true
}

fn byte_index(text: &str, utf16_offset: usize) -> usize {
    let mut units = 0;
    for (index, ch) in text.char_indices() {
        if units >= utf16_offset {
            return index;
        }
        units += ch.len_utf16();
    }
    text.len()
}

/// Replace the UTF-16 selection `[start, end)` of `text` with `insert`.
///
/// Offsets come from `selectionStart`/`selectionEnd`. Returns the new text and
/// the caret position (UTF-16) just after the inserted value.
pub fn insert_at_selection(text: &str, start: usize, end: usize, insert: &str) -> (String, usize) {
    if text.is_empty() {
        return (insert.to_string(), insert.encode_utf16().count());
    }

    let (start, end) = (start.min(end), start.max(end));
    let start_byte = byte_index(text, start);
    let end_byte = byte_index(text, end);

    let mut result = String::with_capacity(text.len() + insert.len());
    result.push_str(&text[..start_byte]);
    result.push_str(insert);
    result.push_str(&text[end_byte..]);

    let caret = text[..start_byte].encode_utf16().count() + insert.encode_utf16().count();
    (result, caret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestBody;

    fn create_test_config() -> Config {
        Config::new("https://ntfy.sh", "", &["alerts", "ops"])
    }

    #[test]
    fn test_initial_form_from_preferences() {
        let prefs = Preferences {
            priority: Priority::new(4).unwrap(),
            last_tags: vec!["warning".to_string()],
            last_topic: Some("ops".to_string()),
            ..Default::default()
        };

        let form = ComposeForm::initial(&create_test_config(), &prefs, None);

        assert_eq!(form.topic, "ops");
        assert_eq!(form.priority.value(), 4);
        assert_eq!(form.tags, vec!["warning"]);
        assert_eq!(form.title, "");
    }

    #[test]
    fn test_draft_overrides_preferences() {
        let prefs = Preferences {
            last_tags: vec!["old".to_string()],
            last_topic: Some("alerts".to_string()),
            ..Default::default()
        };
        let draft = Draft {
            title: Some("t".to_string()),
            message: Some("m".to_string()),
            topic: Some("ops".to_string()),
            tags: Some(vec!["new".to_string()]),
            priority: Priority::new(5),
        };

        let form = ComposeForm::initial(&create_test_config(), &prefs, Some(draft));

        assert_eq!(form.topic, "ops");
        assert_eq!(form.title, "t");
        assert_eq!(form.message, "m");
        assert_eq!(form.tags, vec!["new"]);
        assert_eq!(form.priority.value(), 5);
    }

    #[test]
    fn test_initial_topic_skips_unknown() {
        let config = create_test_config();

        assert_eq!(initial_topic(&config, Some("gone"), Some("ops")), Some("ops".to_string()));
        assert_eq!(initial_topic(&config, None, Some("gone")), Some("alerts".to_string()));
        assert_eq!(initial_topic(&Config::default(), Some("x"), None), None);
    }

    #[test]
    fn test_to_draft_round_trip() {
        let form = ComposeForm {
            topic: "ops".to_string(),
            title: "t".to_string(),
            ..Default::default()
        };

        let draft = form.to_draft();

        assert_eq!(draft.title.as_deref(), Some("t"));
        assert_eq!(draft.message, None);
        assert_eq!(draft.tags, None);
        assert_eq!(ComposeForm::initial(&create_test_config(), &Preferences::default(), Some(draft)), form);
    }

    #[test]
    fn test_to_options_trims_fields() {
        let form = ComposeForm {
            topic: "ops".to_string(),
            title: "   ".to_string(),
            message: "  hi there \n".to_string(),
            ..Default::default()
        };

        let options = form.to_options(None).unwrap();

        assert_eq!(options.message.as_deref(), Some("hi there"));
        assert_eq!(options.title, None);
        assert_eq!(options.attachment, None);
    }

    #[test]
    fn test_to_options_with_staged_file() {
        let staged = StagedFile::from_bytes("a.bin", "application/octet-stream", &[9, 8, 7]);
        let form = ComposeForm {
            message: "attached".to_string(),
            ..Default::default()
        };

        let options = form.to_options(Some(&staged)).unwrap();
        let request = crate::request::build_request(&create_test_config(), "ops", &options).unwrap();

        assert_eq!(request.body, RequestBody::Binary(vec![9, 8, 7]));
        assert_eq!(request.header("X-Message"), Some("attached"));
    }

    #[test]
    fn test_clear_sent_keeps_tags_and_priority() {
        let mut form = ComposeForm {
            topic: "ops".to_string(),
            title: "t".to_string(),
            message: "m".to_string(),
            tags: vec!["a".to_string()],
            priority: Priority::new(1).unwrap(),
        };

        form.clear_sent();

        assert_eq!(form.title, "");
        assert_eq!(form.message, "");
        assert_eq!(form.tags, vec!["a"]);
        assert_eq!(form.priority.value(), 1);
    }

    #[test]
    fn test_late_update_keeps_intervening_edits() {
        let latest = LatestForm::default();
        latest.replace(ComposeForm {
            message: "see ".to_string(),
            ..Default::default()
        });
        let late_handler = latest.clone();

        // Typed while the tab URL was being fetched
        latest.update(|f| f.title = "Weekend".to_string());
        let form = late_handler.update(|f| f.message.push_str("https://x.test"));

        assert_eq!(form.title, "Weekend");
        assert_eq!(form.message, "see https://x.test");
        assert_eq!(latest.snapshot(), form);
    }

    #[test]
    fn test_add_unique() {
        let mut tags = vec!["a".to_string()];

        assert!(add_unique(&mut tags, " b "));
        assert!(!add_unique(&mut tags, "a"));
        assert!(!add_unique(&mut tags, "   "));
        assert_eq!(tags, vec!["a", "b"]);
    }

    #[test]
    fn test_move_earlier() {
        let mut topics = vec!["a".to_string(), "b".to_string(), "c".to_string()];

        assert!(move_earlier(&mut topics, 2));
        assert!(!move_earlier(&mut topics, 0));
        assert!(!move_earlier(&mut topics, 3));
        assert_eq!(topics, vec!["a", "c", "b"]);
    }

    #[test]
    fn test_insert_into_empty_text() {
        assert_eq!(insert_at_selection("", 0, 0, "https://x.test"), ("https://x.test".to_string(), 14));
    }

    #[test]
    fn test_insert_replaces_selection() {
        assert_eq!(insert_at_selection("see HERE now", 4, 8, "url"), ("see url now".to_string(), 7));
        assert_eq!(insert_at_selection("abc", 10, 10, "!"), ("abc!".to_string(), 4));
    }

    #[test]
    fn test_insert_uses_utf16_offsets() {
        // '🎉' is two UTF-16 units
        let (text, caret) = insert_at_selection("🎉é end", 3, 3, "X");

        assert_eq!(text, "🎉éX end");
        assert_eq!(caret, 4);
    }
}
