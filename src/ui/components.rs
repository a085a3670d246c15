/// Reusable UI components

use patternfly_yew::prelude::*;
use yew::prelude::*;

/// Transient message under the form
#[derive(Clone, Debug, PartialEq)]
pub struct Status {
    pub kind: StatusKind,
    pub text: String,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StatusKind {
    Info,
    Success,
    Error,
}

impl Status {
    pub fn success(text: impl Into<String>) -> Self {
        Status { kind: StatusKind::Success, text: text.into() }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Status { kind: StatusKind::Error, text: text.into() }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Status { kind: StatusKind::Info, text: text.into() }
    }
}

#[derive(Properties, PartialEq)]
pub struct StatusLineProps {
    pub status: Option<Status>,
}

#[function_component(StatusLine)]
pub fn status_line(props: &StatusLineProps) -> Html {
    let Some(status) = &props.status else {
        return html! {};
    };

    let alert_type = match status.kind {
        StatusKind::Info => AlertType::Info,
        StatusKind::Success => AlertType::Success,
        StatusKind::Error => AlertType::Danger,
    };

    html! {
        <div class="status-line">
            <Alert r#type={alert_type} title={status.text.clone()} inline={true}>
            </Alert>
        </div>
    }
}

#[derive(Properties, PartialEq)]
pub struct ChoiceChipsProps {
    pub labels: Vec<String>,
    pub selected: usize,
    pub onselect: Callback<usize>,
    #[prop_or(false)]
    pub disabled: bool,
}

/// Single-choice row of chips (priority, theme)
#[function_component(ChoiceChips)]
pub fn choice_chips(props: &ChoiceChipsProps) -> Html {
    html! {
        <div class="choice-chips">
            {for props.labels.iter().enumerate().map(|(index, label)| {
                let onselect = props.onselect.clone();
                let class = if index == props.selected { "choice-chip selected" } else { "choice-chip" };
                html! {
                    <button
                        class={class}
                        disabled={props.disabled}
                        onclick={Callback::from(move |_: MouseEvent| onselect.emit(index))}
                    >
                        {label}
                    </button>
                }
            })}
        </div>
    }
}

#[derive(Properties, PartialEq)]
pub struct ChipListProps {
    pub items: Vec<String>,
    pub onremove: Callback<usize>,
    /// Shows a move-earlier arrow on every chip but the first
    #[prop_or_default]
    pub onmove: Option<Callback<usize>>,
}

#[function_component(ChipList)]
pub fn chip_list(props: &ChipListProps) -> Html {
    html! {
        <div class="chip-list">
            {for props.items.iter().enumerate().map(|(index, item)| {
                let onremove = props.onremove.clone();
                let move_button = props.onmove.clone().filter(|_| index > 0).map(|onmove| html! {
                    <button
                        class="chip-move"
                        title="Move earlier"
                        onclick={Callback::from(move |_: MouseEvent| onmove.emit(index))}
                    >
                        {"‹"}
                    </button>
                });
                html! {
                    <span class="chip">
                        {for move_button}
                        <span class="chip-text">{item}</span>
                        <button
                            class="chip-remove"
                            title="Remove"
                            onclick={Callback::from(move |_: MouseEvent| onremove.emit(index))}
                        >
                            {"×"}
                        </button>
                    </span>
                }
            })}
        </div>
    }
}

#[derive(Properties, PartialEq)]
pub struct FilePreviewProps {
    pub name: String,
    pub size: String,
    pub onremove: Callback<MouseEvent>,
}

#[function_component(FilePreview)]
pub fn file_preview(props: &FilePreviewProps) -> Html {
    html! {
        <div class="file-preview">
            <span class="file-icon">{"📎"}</span>
            <span class="file-name">{&props.name}</span>
            <span class="file-size">{&props.size}</span>
            <Button onclick={props.onremove.clone()} variant={ButtonVariant::Plain} size={ButtonSize::Small}>
                {"×"}
            </Button>
        </div>
    }
}
