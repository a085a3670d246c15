//! Browser-side tests, run with `wasm-pack test --headless --chrome`

#![cfg(target_arch = "wasm32")]

use ntfy_sender::config::{Config, Priority};
use ntfy_sender::form::ComposeForm;
use ntfy_sender::request::{RequestBody, build_request};
use ntfy_sender::staging::Staging;
use ntfy_sender::storage::MemoryStore;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

#[wasm_bindgen_test]
async fn staged_file_becomes_request_body() {
    let staging = Staging::new(MemoryStore::new(), MemoryStore::new());
    let config = Config::new("https://ntfy.sh", "tk_token", &["alerts"]);

    staging.stage_file(&[0xde, 0xad], "dump.bin", "").await.unwrap();
    let staged = staging.load_staged_file().await.unwrap();
    let form = ComposeForm {
        topic: "alerts".to_string(),
        message: "core dump".to_string(),
        priority: Priority::new(5).unwrap(),
        ..Default::default()
    };
    let options = form.to_options(staged.as_ref()).unwrap();
    let request = build_request(&config, &form.topic, &options).unwrap();

    assert_eq!(request.url, "https://ntfy.sh/alerts");
    assert_eq!(request.body, RequestBody::Binary(vec![0xde, 0xad]));
    assert_eq!(request.header("X-Filename"), Some("dump.bin"));
    assert_eq!(request.header("X-Priority"), Some("5"));
    assert_eq!(request.header("Authorization"), Some("Bearer tk_token"));
}

#[wasm_bindgen_test]
fn theme_query_is_read() {
    assert_eq!(
        ntfy_sender::ui::theme_from_query("?theme=dark"),
        ntfy_sender::config::Theme::Dark
    );
}
