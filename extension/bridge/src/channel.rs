//! Posting to the container over `window.parent`.

use devtools_relay_protocol::ChannelMessage;
use js_sys::Object;
use wasm_bindgen::JsValue;
use web_sys::{MessageEvent, Window};

pub(crate) fn post_to_parent(window: &Window, message: &ChannelMessage) -> Result<(), JsValue> {
    post_text_to_parent(window, &message.encode())
}

pub(crate) fn post_text_to_parent(window: &Window, text: &str) -> Result<(), JsValue> {
    let parent = window
        .parent()?
        .ok_or_else(|| JsValue::from_str("front-end is not framed"))?;
    parent.post_message(&JsValue::from_str(text), "*")
}

/// Text of `event` when it was posted by `expected`.
pub(crate) fn text_from(event: &MessageEvent, expected: &Window) -> Option<String> {
    let source = event.source()?;
    if !Object::is(&source, expected) {
        return None;
    }
    event.data().as_string()
}

pub(crate) fn warn(message: &str) {
    web_sys::console::warn_1(&JsValue::from_str(message));
}

pub(crate) fn describe(err: &JsValue) -> String {
    err.as_string()
        .or_else(|| js_sys::JSON::stringify(err).ok()?.as_string())
        .unwrap_or_else(|| format!("{err:?}"))
}
