//! Resource loading override for the front-end runtime.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use devtools_relay_protocol::resources::{is_cross_origin, strip_paused_revealer, MODULE_MANIFEST};
use devtools_relay_protocol::{ChannelMessage, PendingRequests, UrlResponse};
use js_sys::{Function, Object, Promise, Reflect};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{future_to_promise, JsFuture};
use web_sys::Window;

use crate::channel::{describe, post_to_parent, warn};

const LOADER: &str = "loadResourcePromise";
const RUNTIME: &str = "Runtime";
const ROOT: &str = "Root";

thread_local! {
    static PENDING: RefCell<PendingRequests<Function>> = RefCell::new(PendingRequests::new());
    static ATTACHED: Cell<bool> = const { Cell::new(false) };
}

#[derive(Debug, PartialEq, Eq)]
enum Route {
    /// `sources/module.json`, loaded normally then patched.
    Manifest,
    /// Cross-origin, fetched by the host.
    Proxy,
    Native,
}

fn route(url: &str) -> Route {
    if url == MODULE_MANIFEST {
        Route::Manifest
    } else if is_cross_origin(url) {
        Route::Proxy
    } else {
        Route::Native
    }
}

/// Overrides `loadResourcePromise` on the front-end runtime.
///
/// `Runtime` (or `Root.Runtime`) is wrapped at once when it already exists.
/// Otherwise the globals are trapped and the override lands the moment the
/// front-end assigns them, so loads issued while entry scripts evaluate go
/// through it too.
#[wasm_bindgen]
pub fn install_resource_loader(window: Window) -> Result<(), JsValue> {
    let runtime = Reflect::get(&window, &JsValue::from_str(RUNTIME))?;
    if runtime.is_object() {
        return attach(&window, &runtime);
    }
    let root = Reflect::get(&window, &JsValue::from_str(ROOT))?;
    if root.is_object() {
        return watch_root(&window, &root);
    }

    let on_runtime = window.clone();
    trap(&window, RUNTIME, move |runtime| {
        if let Err(err) = attach(&on_runtime, &runtime) {
            warn(&format!("resource loader not installed: {}", describe(&err)));
        }
        runtime
    })?;
    let on_root = window.clone();
    trap(&window, ROOT, move |root| {
        if let Err(err) = watch_root(&on_root, &root) {
            warn(&format!("resource loader not installed: {}", describe(&err)));
        }
        root
    })
}

fn watch_root(window: &Window, root: &JsValue) -> Result<(), JsValue> {
    if !root.is_object() {
        return Ok(());
    }
    let runtime = Reflect::get(root, &JsValue::from_str(RUNTIME))?;
    if runtime.is_object() {
        return attach(window, &runtime);
    }
    let window = window.clone();
    trap(root, RUNTIME, move |runtime| {
        if let Err(err) = attach(&window, &runtime) {
            warn(&format!("resource loader not installed: {}", describe(&err)));
        }
        runtime
    })
}

/// Wraps `runtime.loadResourcePromise`, now or whenever it is assigned.
/// Only the first runtime seen is attached.
fn attach(window: &Window, runtime: &JsValue) -> Result<(), JsValue> {
    if !runtime.is_object() || ATTACHED.with(|attached| attached.replace(true)) {
        return Ok(());
    }
    let native = Reflect::get(runtime, &JsValue::from_str(LOADER))?;
    if let Some(native) = native.dyn_ref::<Function>() {
        let load = wrap_loader(window.clone(), runtime.clone(), native.clone());
        Reflect::set(runtime, &JsValue::from_str(LOADER), &load)?;
        return Ok(());
    }
    let window = window.clone();
    let this = runtime.clone();
    trap(runtime, LOADER, move |native| match native.dyn_into::<Function>() {
        Ok(native) => wrap_loader(window.clone(), this.clone(), native),
        Err(other) => other,
    })
}

fn wrap_loader(window: Window, this: JsValue, native: Function) -> JsValue {
    Closure::<dyn FnMut(String) -> Promise>::new(move |url: String| match route(&url) {
        Route::Native => call_native(&native, &this, &url),
        Route::Manifest => {
            let loaded = call_native(&native, &this, &url);
            future_to_promise(async move {
                let content = JsFuture::from(loaded).await?.as_string().unwrap_or_default();
                Ok(JsValue::from_str(&strip_paused_revealer(&content)))
            })
        }
        Route::Proxy => proxy(&window, url),
    })
    .into_js_value()
}

/// Replaces `owner[key]` with an accessor that stores `on_set(value)`.
fn trap(owner: &JsValue, key: &str, on_set: impl Fn(JsValue) -> JsValue + 'static) -> Result<(), JsValue> {
    let owner: &Object = owner.dyn_ref().ok_or("trap target is not an object")?;
    let slot = Rc::new(RefCell::new(Reflect::get(owner, &JsValue::from_str(key))?));

    let read = Rc::clone(&slot);
    let get = Closure::<dyn Fn() -> JsValue>::new(move || read.borrow().clone()).into_js_value();
    let set = Closure::<dyn Fn(JsValue)>::new(move |value: JsValue| {
        let stored = on_set(value);
        *slot.borrow_mut() = stored;
    })
    .into_js_value();

    let descriptor = Object::new();
    Reflect::set(&descriptor, &JsValue::from_str("get"), &get)?;
    Reflect::set(&descriptor, &JsValue::from_str("set"), &set)?;
    Reflect::set(&descriptor, &JsValue::from_str("configurable"), &JsValue::TRUE)?;
    Reflect::set(&descriptor, &JsValue::from_str("enumerable"), &JsValue::TRUE)?;
    Object::define_property(owner, &JsValue::from_str(key), &descriptor);
    Ok(())
}

fn call_native(native: &Function, this: &JsValue, url: &str) -> Promise {
    match native.call1(this, &JsValue::from_str(url)) {
        Ok(value) => value.dyn_into::<Promise>().unwrap_or_else(|value| Promise::resolve(&value)),
        Err(err) => Promise::reject(&err),
    }
}

/// Asks the host for `url`; resolves when the matching `setUrl:` arrives.
fn proxy(window: &Window, url: String) -> Promise {
    Promise::new(&mut |resolve, _reject| {
        let request = PENDING.with(|pending| pending.borrow_mut().register(url.clone(), resolve));
        if let Err(err) = post_to_parent(window, &ChannelMessage::GetUrl(request)) {
            warn(&format!("getUrl for {url} not sent: {}", describe(&err)));
        }
    })
}

/// Settles the load waiting on `response.id`. Unknown ids are ignored.
pub(crate) fn resolve_url_request(response: UrlResponse) {
    let Some(resolve) = PENDING.with(|pending| pending.borrow_mut().resolve(response.id)) else {
        return;
    };
    if let Err(err) = resolve.call1(&JsValue::NULL, &JsValue::from_str(&response.content)) {
        warn(&format!("resource resolver threw: {}", describe(&err)));
    }
}
