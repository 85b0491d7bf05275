//! Browser side of devtools-relay.
//!
//! Two entry points share this module. The container page calls
//! [`start_display_bridge`] to pump frames between its `/surface` link and the
//! front-end iframe. Inside the iframe, the shim loader calls
//! [`install_host_shim`] and then [`install_resource_loader`] before any
//! front-end code runs.

use wasm_bindgen::prelude::*;

mod bridge;
mod channel;
mod resources;
mod shim;
mod socket;

pub use bridge::start_display_bridge;
pub use resources::install_resource_loader;
pub use shim::{install_host_shim, SessionStorage, ToolsHost};
pub use socket::ToolsWebSocket;

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
}
