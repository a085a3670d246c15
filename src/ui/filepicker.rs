/// File picker helper window
///
/// Runs in its own window because the popup closes once a native file dialog
/// takes focus. The chosen file is staged and the popup picks it up from the
/// local storage area.

use crate::staging::Staging;
use crate::storage::ChromeStore;
use crate::ui::components::{Status, StatusLine};
use crate::ui::{apply_theme, theme_from_query};
use js_sys::Uint8Array;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{JsFuture, spawn_local};
use web_sys::{DragEvent, File, HtmlInputElement};
use yew::prelude::*;

/// Time the confirmation stays visible before the window closes
const CLOSE_DELAY_MS: i32 = 800;

// Import JS bridge functions
#[wasm_bindgen(module = "/js/filepicker.js")]
extern "C" {
    fn closeWindow();

    async fn sleep(ms: i32);
}

async fn read_bytes(file: &File) -> Result<Vec<u8>, String> {
    let buffer = JsFuture::from(file.array_buffer())
        .await
        .map_err(|e| format!("Failed to read file: {:?}", e))?;
    Ok(Uint8Array::new(&buffer).to_vec())
}

async fn stage(file: File) -> Result<String, String> {
    let bytes = read_bytes(&file).await?;
    let staging = Staging::new(ChromeStore::local(), ChromeStore::session());
    let staged = staging
        .stage_file(&bytes, &file.name(), &file.type_())
        .await
        .map_err(|e| format!("Failed to attach file: {}", e))?;
    Ok(staged.name)
}

#[function_component(FilePicker)]
pub fn file_picker() -> Html {
    let status = use_state(|| None::<Status>);
    let busy = use_state(|| false);
    let dragging = use_state(|| false);

    use_effect_with((), |_| {
        let search = web_sys::window()
            .and_then(|w| w.location().search().ok())
            .unwrap_or_default();
        apply_theme(theme_from_query(&search));
        || ()
    });

    let accept = {
        let status = status.clone();
        let busy = busy.clone();
        move |file: File| {
            if *busy {
                return;
            }
            busy.set(true);
            status.set(Some(Status::info(format!("Attaching \"{}\"...", file.name()))));

            let status = status.clone();
            let busy = busy.clone();
            spawn_local(async move {
                match stage(file).await {
                    Ok(name) => {
                        status.set(Some(Status::success(format!("✓ \"{}\" attached!", name))));
                        sleep(CLOSE_DELAY_MS).await;
                        closeWindow();
                    }
                    Err(e) => {
                        log::error!("{}", e);
                        status.set(Some(Status::error(e)));
                        busy.set(false);
                    }
                }
            });
        }
    };

    let on_file_change = {
        let accept = accept.clone();
        Callback::from(move |e: Event| {
            let file = e
                .target_dyn_into::<HtmlInputElement>()
                .and_then(|input| input.files())
                .and_then(|files| files.get(0));
            if let Some(file) = file {
                accept(file);
            }
        })
    };

    let on_drag_over = {
        let dragging = dragging.clone();
        Callback::from(move |e: DragEvent| {
            e.prevent_default();
            dragging.set(true);
        })
    };

    let on_drag_leave = {
        let dragging = dragging.clone();
        Callback::from(move |_: DragEvent| dragging.set(false))
    };

    let on_drop = {
        let dragging = dragging.clone();
        Callback::from(move |e: DragEvent| {
            e.prevent_default();
            dragging.set(false);
            let file = e
                .data_transfer()
                .and_then(|transfer| transfer.files())
                .and_then(|files| files.get(0));
            if let Some(file) = file {
                accept(file);
            }
        })
    };

    let zone_class = match (*busy, *dragging) {
        (true, _) => "drop-zone disabled",
        (false, true) => "drop-zone dragging",
        (false, false) => "drop-zone",
    };

    html! {
        <div class="file-picker">
            <h2 class="picker-title">{"Attach a file"}</h2>
            <label
                class={zone_class}
                ondragover={on_drag_over}
                ondragleave={on_drag_leave}
                ondrop={on_drop}
            >
                <input type="file" class="file-input" disabled={*busy} onchange={on_file_change} />
                <span class="drop-hint">{"Drop a file here or click to choose"}</span>
            </label>
            <StatusLine status={(*status).clone()} />
        </div>
    }
}
