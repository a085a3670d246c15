/// ntfy sender - browser extension publishing notifications to ntfy topics
/// Built with Rust + WASM + Yew

pub mod background;
pub mod config;
pub mod dispatch;
pub mod form;
pub mod menu;
pub mod request;
pub mod staging;
pub mod storage;
pub mod trigger;
pub mod ui;

use wasm_bindgen::prelude::*;

// Set up panic hook for better error messages in the browser console
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

// Start the Yew app for the popup
#[wasm_bindgen]
pub fn start_popup() {
    yew::Renderer::<ui::popup::App>::new().render();
}

// Start the Yew app for the file picker window
#[wasm_bindgen]
pub fn start_file_picker() {
    yew::Renderer::<ui::filepicker::FilePicker>::new().render();
}
