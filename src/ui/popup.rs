/// Popup UI: compose and send a notification

use crate::config::{self, Config, Preferences, Priority, Theme};
use crate::dispatch::send;
use crate::form::{
    ComposeForm, FILE_PICKER_HEIGHT, FILE_PICKER_WIDTH, LatestForm, add_unique, insert_at_selection,
};
use crate::request::build_request;
use crate::staging::{KEY_STORED_FILE, StagedFile, Staging};
use crate::storage::ChromeStore;
use crate::ui::apply_theme;
use crate::ui::components::{ChipList, ChoiceChips, FilePreview, Status, StatusLine};
use crate::ui::settings::SettingsView;
use patternfly_yew::prelude::*;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::{HtmlInputElement, HtmlSelectElement, HtmlTextAreaElement};
use yew::prelude::*;

/// Status messages disappear after this long
const STATUS_HIDE_MS: i32 = 3000;
/// Delay between a successful send and closing the popup
const CLOSE_DELAY_MS: i32 = 100;

// Import JS bridge functions
#[wasm_bindgen(module = "/js/popup.js")]
extern "C" {
    #[wasm_bindgen(catch)]
    async fn getActiveTabUrl() -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn openTab(url: &str) -> Result<(), JsValue>;

    #[wasm_bindgen(catch)]
    async fn openFilePicker(theme: &str, width: i32, height: i32) -> Result<(), JsValue>;

    fn onLocalStorageChanged(key: &str, callback: &js_sys::Function);

    fn closeWindow();

    async fn sleep(ms: i32);
}

fn staging() -> Staging<ChromeStore, ChromeStore> {
    Staging::new(ChromeStore::local(), ChromeStore::session())
}

#[derive(Clone, PartialEq)]
enum View {
    Loading,
    Compose,
    Settings,
}

/// Everything the popup restores when it opens
struct Restored {
    config: Config,
    prefs: Preferences,
    form: ComposeForm,
    staged: Option<StagedFile>,
}

async fn restore() -> Result<Restored, String> {
    let sync = ChromeStore::sync();
    let config = config::load_config(&sync)
        .await
        .map_err(|e| format!("Failed to load settings: {}", e))?;
    let prefs = config::load_preferences(&sync, &config)
        .await
        .map_err(|e| format!("Failed to load preferences: {}", e))?;

    let staging = staging();
    let draft = staging.load_and_clear_draft().await.unwrap_or_else(|e| {
        log::warn!("Failed to restore draft: {}", e);
        None
    });
    let staged = staging.load_staged_file().await.unwrap_or_else(|e| {
        log::warn!("Failed to load staged file: {}", e);
        None
    });

    let form = ComposeForm::initial(&config, &prefs, draft);
    Ok(Restored { config, prefs, form, staged })
}

/// Send the form. The error is the text shown in the status line.
async fn send_form(config: &Config, form: &ComposeForm, staged: Option<&StagedFile>) -> Result<(), String> {
    let options = form.to_options(staged).map_err(|e| format!("Error: {}", e))?;
    let request = build_request(config, &form.topic, &options).map_err(|e| format!("Error: {}", e))?;
    send(&reqwest::Client::new(), &request)
        .await
        .map_err(|e| e.user_message())?;

    if let Err(e) = staging().clear_after_send().await {
        log::warn!("Failed to clear staged data: {}", e);
    }
    Ok(())
}

fn remember(prefs: Preferences) {
    spawn_local(async move {
        if let Err(e) = config::save_preferences(&ChromeStore::sync(), &prefs).await {
            log::error!("Failed to save preferences: {}", e);
        }
    });
}

#[function_component(App)]
pub fn app() -> Html {
    let view = use_state(|| View::Loading);
    let config = use_state(Config::default);
    let prefs = use_state(Preferences::default);
    let form = use_state(ComposeForm::default);
    let latest = use_memo((), |_| LatestForm::default());
    let staged = use_state(|| None::<StagedFile>);
    let tag_input = use_state(String::new);
    let status = use_state(|| None::<Status>);
    let status_seq = use_mut_ref(|| 0u32);
    let sending = use_state(|| false);
    let message_ref = use_node_ref();

    // Restore state on mount and follow staged-file changes from the picker window
    {
        let view = view.clone();
        let config = config.clone();
        let prefs = prefs.clone();
        let form = form.clone();
        let latest = latest.clone();
        let staged = staged.clone();
        let status = status.clone();
        use_effect_with((), move |_| {
            let listener_staged = staged.clone();
            spawn_local(async move {
                match restore().await {
                    Ok(restored) => {
                        apply_theme(restored.prefs.theme);
                        config.set(restored.config);
                        prefs.set(restored.prefs);
                        latest.replace(restored.form.clone());
                        form.set(restored.form);
                        staged.set(restored.staged);
                    }
                    Err(e) => {
                        log::error!("{}", e);
                        status.set(Some(Status::error(e)));
                    }
                }
                view.set(View::Compose);
            });

            let listener = Closure::<dyn Fn()>::new(move || {
                let staged = listener_staged.clone();
                spawn_local(async move {
                    match staging().load_staged_file().await {
                        Ok(file) => staged.set(file),
                        Err(e) => log::warn!("Failed to reload staged file: {}", e),
                    }
                });
            });
            onLocalStorageChanged(KEY_STORED_FILE, listener.as_ref().unchecked_ref());
            // Lives as long as the popup document
            listener.forget();
            || ()
        });
    }

    let show_status = {
        let status = status.clone();
        let status_seq = status_seq.clone();
        Rc::new(move |next: Status| {
            let seq = {
                let mut current = status_seq.borrow_mut();
                *current = current.wrapping_add(1);
                *current
            };
            status.set(Some(next));

            let status = status.clone();
            let status_seq = status_seq.clone();
            spawn_local(async move {
                sleep(STATUS_HIDE_MS).await;
                if *status_seq.borrow() == seq {
                    status.set(None);
                }
            });
        })
    };

    let update_form = {
        let form = form.clone();
        let latest = latest.clone();
        let prefs = prefs.clone();
        move |edit: &dyn Fn(&mut ComposeForm), persist: bool| {
            let next = latest.update(|f| edit(f));
            if persist {
                let mut next_prefs = (*prefs).clone();
                next_prefs.priority = next.priority;
                next_prefs.last_tags = next.tags.clone();
                next_prefs.last_topic = (!next.topic.is_empty()).then(|| next.topic.clone());
                remember(next_prefs.clone());
                prefs.set(next_prefs);
            }
            form.set(next);
        }
    };
    let update_form = Rc::new(update_form);

    let on_topic_change = {
        let update_form = update_form.clone();
        Callback::from(move |e: Event| {
            if let Some(select) = e.target_dyn_into::<HtmlSelectElement>() {
                let topic = select.value();
                update_form(&|f: &mut ComposeForm| f.topic = topic.clone(), true);
            }
        })
    };

    let on_title_input = {
        let update_form = update_form.clone();
        Callback::from(move |e: InputEvent| {
            if let Some(input) = e.target_dyn_into::<HtmlInputElement>() {
                let title = input.value();
                update_form(&|f: &mut ComposeForm| f.title = title.clone(), false);
            }
        })
    };

    let on_message_input = {
        let update_form = update_form.clone();
        Callback::from(move |e: InputEvent| {
            if let Some(area) = e.target_dyn_into::<HtmlTextAreaElement>() {
                let message = area.value();
                update_form(&|f: &mut ComposeForm| f.message = message.clone(), false);
            }
        })
    };

    let on_tag_input = {
        let tag_input = tag_input.clone();
        Callback::from(move |e: InputEvent| {
            if let Some(input) = e.target_dyn_into::<HtmlInputElement>() {
                tag_input.set(input.value());
            }
        })
    };

    let on_tag_keydown = {
        let tag_input = tag_input.clone();
        let update_form = update_form.clone();
        let form = form.clone();
        Callback::from(move |e: KeyboardEvent| match e.key().as_str() {
            "Enter" => {
                e.prevent_default();
                let value = (*tag_input).clone();
                if !value.trim().is_empty() {
                    update_form(&|f: &mut ComposeForm| {
                        add_unique(&mut f.tags, &value);
                    }, true);
                }
                tag_input.set(String::new());
            }
            "Backspace" if tag_input.is_empty() && !form.tags.is_empty() => {
                update_form(&|f: &mut ComposeForm| {
                    f.tags.pop();
                }, true);
            }
            _ => {}
        })
    };

    let on_tag_remove = {
        let update_form = update_form.clone();
        Callback::from(move |index: usize| {
            update_form(&|f: &mut ComposeForm| {
                if index < f.tags.len() {
                    f.tags.remove(index);
                }
            }, true);
        })
    };

    let on_priority_select = {
        let update_form = update_form.clone();
        Callback::from(move |index: usize| {
            if let Some(priority) = Priority::new(index as u8 + Priority::MIN) {
                update_form(&|f: &mut ComposeForm| f.priority = priority, true);
            }
        })
    };

    let on_send_another = {
        let prefs = prefs.clone();
        Callback::from(move |e: Event| {
            if let Some(input) = e.target_dyn_into::<HtmlInputElement>() {
                let mut next = (*prefs).clone();
                next.send_another = input.checked();
                remember(next.clone());
                prefs.set(next);
            }
        })
    };

    let on_attach = {
        let form = form.clone();
        let prefs = prefs.clone();
        let show_status = show_status.clone();
        Callback::from(move |_: MouseEvent| {
            let draft = form.to_draft();
            let theme = prefs.theme;
            let show_status = show_status.clone();
            spawn_local(async move {
                // The popup closes as soon as the picker window takes focus
                if let Err(e) = staging().save_draft(&draft).await {
                    log::warn!("Failed to save draft: {}", e);
                }
                if let Err(e) = openFilePicker(theme.as_str(), FILE_PICKER_WIDTH, FILE_PICKER_HEIGHT).await {
                    show_status(Status::error(format!("Error: {:?}", e)));
                }
            });
        })
    };

    let on_remove_file = {
        let staged = staged.clone();
        Callback::from(move |_: MouseEvent| {
            let staged = staged.clone();
            spawn_local(async move {
                match staging().clear_staged_file().await {
                    Ok(()) => staged.set(None),
                    Err(e) => log::error!("Failed to remove staged file: {}", e),
                }
            });
        })
    };

    let on_open_topic = {
        let config = config.clone();
        let form = form.clone();
        Callback::from(move |_: MouseEvent| {
            let url = config.topic_page_url(&form.topic);
            spawn_local(async move {
                if let Err(e) = openTab(&url).await {
                    log::error!("Failed to open {}: {:?}", url, e);
                }
            });
        })
    };

    let on_insert_url = {
        let update_form = update_form.clone();
        let message_ref = message_ref.clone();
        Callback::from(move |_: MouseEvent| {
            let update_form = update_form.clone();
            let message_ref = message_ref.clone();
            spawn_local(async move {
                let url = match getActiveTabUrl().await {
                    Ok(url) => url.as_string().unwrap_or_default(),
                    Err(e) => {
                        log::warn!("Failed to read the active tab: {:?}", e);
                        return;
                    }
                };
                if url.is_empty() {
                    return;
                }

                let Some(area) = message_ref.cast::<HtmlTextAreaElement>() else {
                    return;
                };
                let text = area.value();
                let start = area.selection_start().ok().flatten().unwrap_or(text.encode_utf16().count() as u32);
                let end = area.selection_end().ok().flatten().unwrap_or(start);
                let (message, caret) = insert_at_selection(&text, start as usize, end as usize, &url);

                area.set_value(&message);
                let _ = area.set_selection_range(caret as u32, caret as u32);
                let _ = area.focus();
                update_form(&|f: &mut ComposeForm| f.message = message.clone(), false);
            });
        })
    };

    let on_send = {
        let config = config.clone();
        let form = form.clone();
        let latest = latest.clone();
        let staged = staged.clone();
        let prefs = prefs.clone();
        let sending = sending.clone();
        let show_status = show_status.clone();
        Callback::from(move |_: MouseEvent| {
            if *sending {
                return;
            }
            sending.set(true);

            let config = (*config).clone();
            let snapshot = latest.snapshot();
            let file = (*staged).clone();
            let send_another = prefs.send_another;
            let form = form.clone();
            let latest = latest.clone();
            let staged = staged.clone();
            let sending = sending.clone();
            let show_status = show_status.clone();
            spawn_local(async move {
                match send_form(&config, &snapshot, file.as_ref()).await {
                    Ok(()) => {
                        log::info!("Sent notification to {}", snapshot.topic);
                        form.set(latest.update(ComposeForm::clear_sent));
                        staged.set(None);
                        if send_another {
                            show_status(Status::success("Notification sent!"));
                        } else {
                            sleep(CLOSE_DELAY_MS).await;
                            closeWindow();
                        }
                    }
                    Err(message) => {
                        log::error!("{}", message);
                        show_status(Status::error(message));
                    }
                }
                sending.set(false);
            });
        })
    };

    let on_open_settings = {
        let view = view.clone();
        Callback::from(move |_: MouseEvent| view.set(View::Settings))
    };

    let on_close_settings = {
        let view = view.clone();
        Callback::from(move |_: MouseEvent| view.set(View::Compose))
    };

    let on_config_change = {
        let config = config.clone();
        let update_form = update_form.clone();
        Callback::from(move |next: Config| {
            let topic = crate::form::initial_topic(&next, None, None);
            update_form(&|f: &mut ComposeForm| {
                if !next.has_topic(&f.topic) {
                    f.topic = topic.clone().unwrap_or_default();
                }
            }, false);
            config.set(next);
        })
    };

    let on_theme_change = {
        let prefs = prefs.clone();
        Callback::from(move |theme: Theme| {
            let mut next = (*prefs).clone();
            next.theme = theme;
            prefs.set(next);
        })
    };

    let configured = config.is_configured();
    let settings_class = if configured { "settings-button" } else { "settings-button attention" };

    html! {
        <div class="popup">
            <div class="popup-header">
                <h1 class="popup-title">{"ntfy"}</h1>
                <button class={settings_class} title="Settings" onclick={on_open_settings}>{"⚙"}</button>
            </div>

            {match &*view {
                View::Loading => html! {
                    <div class="loading-text-center">
                        <Spinner />
                    </div>
                },
                View::Settings => html! {
                    <SettingsView
                        config={(*config).clone()}
                        theme={prefs.theme}
                        on_config_change={on_config_change}
                        on_theme_change={on_theme_change}
                        on_close={on_close_settings}
                    />
                },
                View::Compose => html! {
                    <div class="compose">
                        if !configured {
                            <p class="hint">{"Set a server URL and at least one topic in settings."}</p>
                        }

                        <div class="topic-row">
                            <select class="topic-select" disabled={!configured} onchange={on_topic_change}>
                                {for config.topics.iter().map(|topic| html! {
                                    <option value={topic.clone()} selected={*topic == form.topic}>{topic}</option>
                                })}
                            </select>
                            <Button onclick={on_open_topic} variant={ButtonVariant::Secondary} size={ButtonSize::Small} disabled={!configured}>
                                {"Open"}
                            </Button>
                        </div>

                        <input
                            class="text-input"
                            type="text"
                            placeholder="Title"
                            disabled={!configured}
                            value={form.title.clone()}
                            oninput={on_title_input}
                        />

                        <textarea
                            ref={message_ref}
                            class="message-input"
                            placeholder="Message"
                            disabled={!configured}
                            value={form.message.clone()}
                            oninput={on_message_input}
                        />
                        <Button onclick={on_insert_url} variant={ButtonVariant::Link} size={ButtonSize::Small} disabled={!configured}>
                            {"Insert page URL"}
                        </Button>

                        <ChipList items={form.tags.clone()} onremove={on_tag_remove} />
                        <input
                            class="text-input"
                            type="text"
                            placeholder="Tags (Enter to add)"
                            disabled={!configured}
                            value={(*tag_input).clone()}
                            oninput={on_tag_input}
                            onkeydown={on_tag_keydown}
                        />

                        <ChoiceChips
                            labels={Priority::all().map(|p| format!("{} {}", p.value(), p.label())).collect::<Vec<_>>()}
                            selected={(form.priority.value() - Priority::MIN) as usize}
                            onselect={on_priority_select}
                            disabled={!configured}
                        />

                        if let Some(file) = &*staged {
                            <FilePreview name={file.name.clone()} size={file.display_size()} onremove={on_remove_file} />
                        } else {
                            <Button onclick={on_attach} variant={ButtonVariant::Secondary} disabled={!configured}>
                                {"📎 Attach file"}
                            </Button>
                        }

                        <label class="send-another">
                            <input type="checkbox" checked={prefs.send_another} onchange={on_send_another} />
                            {" Send another"}
                        </label>

                        <Button
                            onclick={on_send}
                            variant={ButtonVariant::Primary}
                            block={true}
                            disabled={!configured || *sending || form.topic.is_empty()}
                        >
                            {if *sending { "Sending..." } else { "Send" }}
                        </Button>

                        <StatusLine status={(*status).clone()} />
                    </div>
                },
            }}
        </div>
    }
}
