//! Wire types for the devtools relay.
//!
//! The display surface and the host process share one text-only channel. This
//! crate owns the shapes that travel over it and the few pure text transforms
//! both sides rely on, so the host binary and the wasm bridge decode the same
//! way.
//!
//! # Main Types
//!
//! - [`ChannelMessage`] - front-end to host, decoded once at the channel boundary
//! - [`HostMessage`] - host to front-end
//! - [`TargetDescriptor`] - one debuggable context from the discovery endpoint
//! - [`FrameQueue`] - FIFO buffer for frames produced before a link is open
//! - [`PendingRequests`] - id bookkeeping for proxied resource loads

pub mod channel;
pub mod preferences;
pub mod queue;
pub mod resources;
pub mod target;
pub mod telemetry;

pub use channel::{ChannelMessage, ControlKind, DecodeError, HostMessage};
pub use preferences::{PreferenceUpdate, Preferences};
pub use queue::FrameQueue;
pub use resources::{PendingRequests, UrlRequest, UrlResponse};
pub use target::{TargetDescriptor, TargetPick};
pub use telemetry::TelemetryEvent;
