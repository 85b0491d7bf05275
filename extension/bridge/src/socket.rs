//! `WebSocket` stand-in for the front-end.
//!
//! No real socket is opened. Protocol frames travel over the container
//! channel; `open`, `close` and `error` from the host drive the lifecycle
//! callbacks.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use devtools_relay_protocol::{ChannelMessage, HostMessage};
use js_sys::{Function, Object, Reflect};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{MessageEvent, Window};

use crate::channel::{describe, post_text_to_parent, post_to_parent, text_from, warn};

const CONNECTING: u16 = 0;
const OPEN: u16 = 1;
const CLOSED: u16 = 3;

/// What a host message means to the socket.
#[derive(Debug, PartialEq)]
enum Delivery {
    Open,
    Close,
    Error,
    Frame(String),
    /// Meant for the shim, or a malformed control message.
    Skip,
}

fn classify(text: &str) -> Delivery {
    match HostMessage::decode(text) {
        Ok(HostMessage::Open) => Delivery::Open,
        Ok(HostMessage::Close) => Delivery::Close,
        Ok(HostMessage::Error) => Delivery::Error,
        Ok(HostMessage::ProtocolFrame(frame)) => Delivery::Frame(frame),
        Ok(HostMessage::Preferences(_) | HostMessage::SetUrl(_)) | Err(_) => Delivery::Skip,
    }
}

#[derive(Default)]
struct Handlers {
    onopen: Option<Function>,
    onmessage: Option<Function>,
    onerror: Option<Function>,
    onclose: Option<Function>,
}

struct Shared {
    handlers: RefCell<Handlers>,
    ready_state: Cell<u16>,
}

impl Shared {
    fn deliver(&self, text: &str) {
        let (handler, arg) = match classify(text) {
            Delivery::Open => {
                self.ready_state.set(OPEN);
                (self.handlers.borrow().onopen.clone(), JsValue::UNDEFINED)
            }
            Delivery::Close => {
                self.ready_state.set(CLOSED);
                (self.handlers.borrow().onclose.clone(), JsValue::UNDEFINED)
            }
            Delivery::Error => (self.handlers.borrow().onerror.clone(), JsValue::UNDEFINED),
            Delivery::Frame(frame) => (self.handlers.borrow().onmessage.clone(), message_event(&frame)),
            Delivery::Skip => return,
        };
        // Cloned out first: handlers may replace themselves while running.
        if let Some(handler) = handler {
            if let Err(err) = handler.call1(&JsValue::NULL, &arg) {
                warn(&format!("socket handler threw: {}", describe(&err)));
            }
        }
    }
}

fn message_event(data: &str) -> JsValue {
    let event = Object::new();
    let _ = Reflect::set(&event, &JsValue::from_str("data"), &JsValue::from_str(data));
    event.into()
}

fn as_handler(value: JsValue) -> Option<Function> {
    value.dyn_into::<Function>().ok()
}

#[wasm_bindgen]
pub struct ToolsWebSocket {
    url: String,
    window: Window,
    shared: Rc<Shared>,
    listener: Option<Closure<dyn FnMut(MessageEvent)>>,
}

#[wasm_bindgen]
impl ToolsWebSocket {
    /// Subscribes to the container channel and announces readiness, which
    /// makes the host drop any previous target link.
    #[wasm_bindgen(constructor)]
    pub fn new(url: String) -> Result<ToolsWebSocket, JsValue> {
        let window = web_sys::window().ok_or("no window")?;
        let parent = window.parent()?.ok_or("front-end is not framed")?;
        let shared = Rc::new(Shared {
            handlers: RefCell::new(Handlers::default()),
            ready_state: Cell::new(CONNECTING),
        });

        let listener = {
            let shared = shared.clone();
            Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
                if let Some(text) = text_from(&event, &parent) {
                    shared.deliver(&text);
                }
            })
        };
        window.add_event_listener_with_callback("message", listener.as_ref().unchecked_ref())?;
        post_to_parent(&window, &ChannelMessage::Ready)?;

        Ok(ToolsWebSocket {
            url,
            window,
            shared,
            listener: Some(listener),
        })
    }

    #[wasm_bindgen(getter)]
    pub fn url(&self) -> String {
        self.url.clone()
    }

    #[wasm_bindgen(getter, js_name = readyState)]
    pub fn ready_state(&self) -> u16 {
        self.shared.ready_state.get()
    }

    pub fn send(&self, message: String) -> Result<(), JsValue> {
        post_text_to_parent(&self.window, &message)
    }

    /// Stops delivery to this instance. The host link is left to the host.
    pub fn close(&mut self) {
        if let Some(listener) = self.listener.take() {
            let _ = self
                .window
                .remove_event_listener_with_callback("message", listener.as_ref().unchecked_ref());
        }
        self.shared.ready_state.set(CLOSED);
    }

    #[wasm_bindgen(getter)]
    pub fn onopen(&self) -> JsValue {
        self.shared.handlers.borrow().onopen.clone().map(JsValue::from).unwrap_or(JsValue::NULL)
    }

    #[wasm_bindgen(setter)]
    pub fn set_onopen(&mut self, handler: JsValue) {
        self.shared.handlers.borrow_mut().onopen = as_handler(handler);
    }

    #[wasm_bindgen(getter)]
    pub fn onmessage(&self) -> JsValue {
        self.shared.handlers.borrow().onmessage.clone().map(JsValue::from).unwrap_or(JsValue::NULL)
    }

    #[wasm_bindgen(setter)]
    pub fn set_onmessage(&mut self, handler: JsValue) {
        self.shared.handlers.borrow_mut().onmessage = as_handler(handler);
    }

    #[wasm_bindgen(getter)]
    pub fn onerror(&self) -> JsValue {
        self.shared.handlers.borrow().onerror.clone().map(JsValue::from).unwrap_or(JsValue::NULL)
    }

    #[wasm_bindgen(setter)]
    pub fn set_onerror(&mut self, handler: JsValue) {
        self.shared.handlers.borrow_mut().onerror = as_handler(handler);
    }

    #[wasm_bindgen(getter)]
    pub fn onclose(&self) -> JsValue {
        self.shared.handlers.borrow().onclose.clone().map(JsValue::from).unwrap_or(JsValue::NULL)
    }

    #[wasm_bindgen(setter)]
    pub fn set_onclose(&mut self, handler: JsValue) {
        self.shared.handlers.borrow_mut().onclose = as_handler(handler);
    }
}
