//! Display bridge: the container page's frame pump.
//!
//! Front-end frames arriving from the iframe go to the host over `/surface`;
//! host frames go into the iframe untouched. Frames posted before the link is
//! open wait in a [`FrameQueue`] and are sent in order once it opens.

use std::cell::RefCell;
use std::rc::Rc;

use devtools_relay_protocol::channel::CLOSE;
use devtools_relay_protocol::FrameQueue;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{CloseEvent, Event, HtmlIFrameElement, MessageEvent, WebSocket};

use crate::channel::{describe, text_from, warn};

const SURFACE_PATH: &str = "/surface";

struct Bridge {
    socket: WebSocket,
    frame: HtmlIFrameElement,
    queue: FrameQueue,
}

impl Bridge {
    fn from_front_end(&mut self, event: &MessageEvent) {
        let Some(frame_window) = self.frame.content_window() else {
            return;
        };
        let Some(text) = text_from(event, &frame_window) else {
            return;
        };
        if let Some(text) = self.queue.push(text) {
            self.send(&text);
        }
    }

    fn link_open(&mut self) {
        let pending: Vec<String> = self.queue.open().collect();
        for text in pending {
            self.send(&text);
        }
    }

    fn link_dropped(&mut self) {
        let dropped = self.queue.reset();
        if dropped > 0 {
            warn(&format!("surface link dropped with {dropped} unsent frames"));
        }
        self.to_front_end(CLOSE);
    }

    fn send(&self, text: &str) {
        if let Err(err) = self.socket.send_with_str(text) {
            warn(&format!("surface send failed: {}", describe(&err)));
        }
    }

    fn to_front_end(&self, text: &str) {
        let Some(frame_window) = self.frame.content_window() else {
            return;
        };
        if let Err(err) = frame_window.post_message(&JsValue::from_str(text), "*") {
            warn(&format!("post to front-end failed: {}", describe(&err)));
        }
    }
}

/// `/surface` URL on the page's own origin.
fn surface_url(protocol: &str, host: &str) -> String {
    let scheme = if protocol == "https:" { "wss" } else { "ws" };
    format!("{scheme}://{host}{SURFACE_PATH}")
}

/// Links the iframe with id `frame_id` to the host's `/surface` channel.
#[wasm_bindgen]
pub fn start_display_bridge(frame_id: &str) -> Result<(), JsValue> {
    let window = web_sys::window().ok_or("no window")?;
    let document = window.document().ok_or("no document")?;
    let frame = document
        .get_element_by_id(frame_id)
        .ok_or_else(|| JsValue::from_str(&format!("no element #{frame_id}")))?
        .dyn_into::<HtmlIFrameElement>()?;

    let location = window.location();
    let socket = WebSocket::new(&surface_url(&location.protocol()?, &location.host()?))?;
    let bridge = Rc::new(RefCell::new(Bridge {
        socket: socket.clone(),
        frame,
        queue: FrameQueue::new(),
    }));

    // Front-end to host
    {
        let bridge = bridge.clone();
        let on_message = Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
            bridge.borrow_mut().from_front_end(&event);
        });
        window.add_event_listener_with_callback("message", on_message.as_ref().unchecked_ref())?;
        on_message.forget();
    }

    // Host to front-end
    {
        let bridge = bridge.clone();
        let onmessage = Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
            if let Some(text) = event.data().as_string() {
                bridge.borrow().to_front_end(&text);
            }
        });
        socket.set_onmessage(Some(onmessage.as_ref().unchecked_ref()));
        onmessage.forget();
    }

    // Link lifecycle
    {
        let opened = bridge.clone();
        let onopen = Closure::<dyn FnMut()>::new(move || opened.borrow_mut().link_open());
        socket.set_onopen(Some(onopen.as_ref().unchecked_ref()));
        onopen.forget();

        let onclose = Closure::<dyn FnMut(CloseEvent)>::new(move |_| bridge.borrow_mut().link_dropped());
        socket.set_onclose(Some(onclose.as_ref().unchecked_ref()));
        onclose.forget();

        let onerror = Closure::<dyn FnMut(Event)>::new(|_| warn("surface link error"));
        socket.set_onerror(Some(onerror.as_ref().unchecked_ref()));
        onerror.forget();
    }

    Ok(())
}
