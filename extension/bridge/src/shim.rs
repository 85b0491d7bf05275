//! Host shim installed into the front-end's window before it loads.
//!
//! Substitutes what a sandboxed page cannot provide: `localStorage` is
//! neutralised, `sessionStorage` is in-memory, `InspectorFrontendHost` talks
//! to the relay, `WebSocket` is [`ToolsWebSocket`](crate::ToolsWebSocket).
//! Uncaught errors are reported as telemetry.

use std::cell::RefCell;
use std::collections::BTreeMap;

use devtools_relay_protocol::{ChannelMessage, HostMessage, PreferenceUpdate, Preferences, TelemetryEvent};
use js_sys::{Function, Object, Reflect};
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{ErrorEvent, MessageEvent, PromiseRejectionEvent, Window};

use crate::channel::{describe, post_to_parent, text_from, warn};
use crate::resources;

thread_local! {
    static PREFERENCES_CALLBACK: RefCell<Option<Function>> = const { RefCell::new(None) };
}

/// `InspectorFrontendHost` replacement. Methods it lacks fall back to the
/// front-end's own stub.
#[wasm_bindgen]
pub struct ToolsHost {
    window: Window,
}

#[wasm_bindgen]
impl ToolsHost {
    /// Asks the relay for the stored preferences; `callback` runs when the
    /// `preferences:` answer arrives.
    #[wasm_bindgen(js_name = getPreferences)]
    pub fn get_preferences(&self, callback: Function) {
        PREFERENCES_CALLBACK.with(|slot| *slot.borrow_mut() = Some(callback));
        self.post(&ChannelMessage::GetState);
    }

    #[wasm_bindgen(js_name = setPreference)]
    pub fn set_preference(&self, name: String, value: String) {
        self.post(&ChannelMessage::SetState(PreferenceUpdate::new(name, value)));
    }

    #[wasm_bindgen(js_name = recordEnumeratedHistogram)]
    pub fn record_enumerated_histogram(&self, action: String, code: f64, _bucket_size: f64) {
        self.post(&ChannelMessage::Telemetry(TelemetryEvent::histogram(&action, code)));
    }
}

impl ToolsHost {
    fn post(&self, message: &ChannelMessage) {
        if let Err(err) = post_to_parent(&self.window, message) {
            warn(&format!("post to container failed: {}", describe(&err)));
        }
    }
}

/// In-memory `sessionStorage`.
#[wasm_bindgen]
#[derive(Default)]
pub struct SessionStorage {
    items: BTreeMap<String, String>,
}

#[wasm_bindgen]
impl SessionStorage {
    #[wasm_bindgen(getter)]
    pub fn length(&self) -> usize {
        self.items.len()
    }

    pub fn key(&self, index: usize) -> Option<String> {
        self.items.keys().nth(index).cloned()
    }

    #[wasm_bindgen(js_name = getItem)]
    pub fn get_item(&self, key: &str) -> Option<String> {
        self.items.get(key).cloned()
    }

    #[wasm_bindgen(js_name = setItem)]
    pub fn set_item(&mut self, key: String, value: String) {
        self.items.insert(key, value);
    }

    #[wasm_bindgen(js_name = removeItem)]
    pub fn remove_item(&mut self, key: &str) {
        self.items.remove(key);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

/// Installs every substitution on `window`. `tools_web_socket` is the
/// exported [`ToolsWebSocket`](crate::ToolsWebSocket) class.
#[wasm_bindgen]
pub fn install_host_shim(window: Window, tools_web_socket: JsValue) -> Result<(), JsValue> {
    define_accessor(&window, "localStorage", JsValue::UNDEFINED)?;
    define_accessor(&window, "sessionStorage", SessionStorage::default().into())?;

    let host = ToolsHost { window: window.clone() };
    Reflect::set(&window, &JsValue::from_str("InspectorFrontendHost"), &host.into())?;
    Reflect::set(&window, &JsValue::from_str("WebSocket"), &tools_web_socket)?;

    listen_for_host(&window)?;
    report_uncaught(&window)?;
    Ok(())
}

/// Replaces `name` with a getter returning `value` and a no-op setter.
fn define_accessor(window: &Window, name: &str, value: JsValue) -> Result<(), JsValue> {
    let get = Closure::<dyn Fn() -> JsValue>::new(move || value.clone()).into_js_value();
    let set = Closure::<dyn Fn(JsValue)>::new(|_| {}).into_js_value();

    let descriptor = Object::new();
    Reflect::set(&descriptor, &JsValue::from_str("get"), &get)?;
    Reflect::set(&descriptor, &JsValue::from_str("set"), &set)?;
    Reflect::set(&descriptor, &JsValue::from_str("configurable"), &JsValue::TRUE)?;
    Object::define_property(window, &JsValue::from_str(name), &descriptor);
    Ok(())
}

/// Routes `preferences:` and `setUrl:` answers from the container.
fn listen_for_host(window: &Window) -> Result<(), JsValue> {
    let parent = window.parent()?.ok_or("front-end is not framed")?;
    let on_message = Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
        let Some(text) = text_from(&event, &parent) else {
            return;
        };
        match HostMessage::decode(&text) {
            Ok(HostMessage::Preferences(prefs)) => fire_preferences_callback(&prefs),
            Ok(HostMessage::SetUrl(response)) => resources::resolve_url_request(response),
            Ok(_) => {}
            Err(err) => warn(&err.to_string()),
        }
    });
    window.add_event_listener_with_callback_and_bool("message", on_message.as_ref().unchecked_ref(), true)?;
    on_message.forget();
    Ok(())
}

fn fire_preferences_callback(prefs: &Preferences) {
    let Some(callback) = PREFERENCES_CALLBACK.with(|slot| slot.borrow().clone()) else {
        return;
    };
    let value = match prefs.serialize(&serde_wasm_bindgen::Serializer::json_compatible()) {
        Ok(value) => value,
        Err(err) => {
            warn(&format!("preferences not convertible: {err}"));
            return;
        }
    };
    if let Err(err) = callback.call1(&JsValue::NULL, &value) {
        warn(&format!("preferences callback threw: {}", describe(&err)));
    }
}

fn report_uncaught(window: &Window) -> Result<(), JsValue> {
    {
        let target = window.clone();
        let on_error = Closure::<dyn FnMut(ErrorEvent)>::new(move |event: ErrorEvent| {
            let stack = stack_of(&event.error()).unwrap_or_else(|| event.message());
            report(&target, "error", &stack);
        });
        window.add_event_listener_with_callback("error", on_error.as_ref().unchecked_ref())?;
        on_error.forget();
    }
    {
        let target = window.clone();
        let on_rejection = Closure::<dyn FnMut(PromiseRejectionEvent)>::new(move |event: PromiseRejectionEvent| {
            let stack = stack_of(&event.reason()).unwrap_or_else(|| event.type_());
            report(&target, "unhandledrejection", &stack);
        });
        window.add_event_listener_with_callback("unhandledrejection", on_rejection.as_ref().unchecked_ref())?;
        on_rejection.forget();
    }
    Ok(())
}

fn stack_of(value: &JsValue) -> Option<String> {
    if !value.is_object() {
        return None;
    }
    Reflect::get(value, &JsValue::from_str("stack")).ok()?.as_string()
}

fn report(window: &Window, kind: &str, stack: &str) {
    let event = TelemetryEvent::error_report(kind, stack);
    if let Err(err) = post_to_parent(window, &ChannelMessage::Telemetry(event)) {
        warn(&format!("failed to report {kind}: {}", describe(&err)));
    }
}
