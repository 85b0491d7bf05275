//! `devtools-relay`: attaches a DevTools front-end running in a sandboxed
//! browser page to a remote debugging target.
//!
//! The binary resolves a target from a discovery endpoint (or launches a
//! local browser to get one), then serves the container page, the wasm
//! bridge, and the front-end. The container's `/surface` channel is bridged
//! to the target's debugger WebSocket by a relay session.

pub mod cli;
pub mod commands;
pub mod config;
pub mod discovery;
pub mod error;
pub mod fetch;
pub mod host;
pub mod launch;
pub mod logging;
pub mod output;
pub mod state;
pub mod telemetry;
