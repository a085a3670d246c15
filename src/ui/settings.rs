/// Settings view: relay connection, topic list and theme

use crate::config::{self, Config, KEY_THEME, Theme};
use crate::form::{add_unique, move_earlier};
use crate::storage::{ChromeStore, KeyValueStore};
use crate::ui::apply_theme;
use crate::ui::components::{ChipList, ChoiceChips};
use patternfly_yew::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::HtmlInputElement;
use yew::prelude::*;

#[derive(Properties, PartialEq)]
pub struct SettingsProps {
    pub config: Config,
    pub theme: Theme,
    pub on_config_change: Callback<Config>,
    pub on_theme_change: Callback<Theme>,
    pub on_close: Callback<MouseEvent>,
}

fn persist_config(config: Config, notify: Callback<Config>) {
    spawn_local(async move {
        match config::save_config(&ChromeStore::sync(), &config).await {
            Ok(()) => notify.emit(config),
            Err(e) => log::error!("Failed to save settings: {}", e),
        }
    });
}

#[function_component(SettingsView)]
pub fn settings_view(props: &SettingsProps) -> Html {
    let topic_input = use_state(String::new);

    let on_server_change = {
        let config = props.config.clone();
        let notify = props.on_config_change.clone();
        Callback::from(move |e: Event| {
            if let Some(input) = e.target_dyn_into::<HtmlInputElement>() {
                let mut next = config.clone();
                next.server_url = input.value().trim().to_string();
                persist_config(next, notify.clone());
            }
        })
    };

    let on_token_change = {
        let config = props.config.clone();
        let notify = props.on_config_change.clone();
        Callback::from(move |e: Event| {
            if let Some(input) = e.target_dyn_into::<HtmlInputElement>() {
                let mut next = config.clone();
                next.access_token = input.value().trim().to_string();
                persist_config(next, notify.clone());
            }
        })
    };

    let on_topic_input = {
        let topic_input = topic_input.clone();
        Callback::from(move |e: InputEvent| {
            if let Some(input) = e.target_dyn_into::<HtmlInputElement>() {
                topic_input.set(input.value());
            }
        })
    };

    let on_topic_keydown = {
        let topic_input = topic_input.clone();
        let config = props.config.clone();
        let notify = props.on_config_change.clone();
        Callback::from(move |e: KeyboardEvent| {
            if e.key() != "Enter" {
                return;
            }
            e.prevent_default();

            let mut next = config.clone();
            if add_unique(&mut next.topics, &topic_input) {
                persist_config(next, notify.clone());
            }
            topic_input.set(String::new());
        })
    };

    let on_topic_remove = {
        let config = props.config.clone();
        let notify = props.on_config_change.clone();
        Callback::from(move |index: usize| {
            let mut next = config.clone();
            if index < next.topics.len() {
                next.topics.remove(index);
                persist_config(next, notify.clone());
            }
        })
    };

    let on_topic_move = {
        let config = props.config.clone();
        let notify = props.on_config_change.clone();
        Callback::from(move |index: usize| {
            let mut next = config.clone();
            if move_earlier(&mut next.topics, index) {
                persist_config(next, notify.clone());
            }
        })
    };

    let themes = Theme::all();
    let on_theme_select = {
        let notify = props.on_theme_change.clone();
        Callback::from(move |index: usize| {
            let Some(theme) = themes.get(index).copied() else {
                return;
            };
            apply_theme(theme);
            notify.emit(theme);
            spawn_local(async move {
                if let Err(e) = ChromeStore::sync().set(KEY_THEME, &theme.as_str()).await {
                    log::error!("Failed to save theme: {}", e);
                }
            });
        })
    };

    let theme_labels: Vec<String> = themes
        .iter()
        .map(|t| {
            let name = t.as_str();
            name[..1].to_uppercase() + &name[1..]
        })
        .collect();
    let selected_theme = themes.iter().position(|t| *t == props.theme).unwrap_or(0);

    html! {
        <div class="settings-view">
            <div class="settings-header">
                <h2 class="settings-title">{"Settings"}</h2>
                <Button onclick={props.on_close.clone()} variant={ButtonVariant::Secondary} size={ButtonSize::Small}>
                    {"Done"}
                </Button>
            </div>

            <label class="field-label" for="server-url">{"Server URL"}</label>
            <input
                id="server-url"
                class="text-input"
                type="url"
                placeholder="https://ntfy.sh"
                value={props.config.server_url.clone()}
                onchange={on_server_change}
            />

            <label class="field-label" for="access-token">{"Access token"}</label>
            <input
                id="access-token"
                class="text-input"
                type="password"
                placeholder="tk_..."
                value={props.config.access_token.clone()}
                onchange={on_token_change}
            />

            <label class="field-label" for="topic-input">{"Topics"}</label>
            <ChipList
                items={props.config.topics.clone()}
                onremove={on_topic_remove}
                onmove={Some(on_topic_move)}
            />
            <input
                id="topic-input"
                class="text-input"
                type="text"
                placeholder="Add a topic and press Enter"
                value={(*topic_input).clone()}
                oninput={on_topic_input}
                onkeydown={on_topic_keydown}
            />

            <label class="field-label">{"Theme"}</label>
            <ChoiceChips labels={theme_labels} selected={selected_theme} onselect={on_theme_select} />
        </div>
    }
}
