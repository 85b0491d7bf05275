//! Relay session runtime.
//!
//! A [`RelaySession`] bridges one display surface to one debug target socket.
//! It runs as a single tokio task fed [`SessionEvent`]s, so its state has a
//! single owner and needs no locking. Callers talk to it through a cloneable
//! [`SessionHandle`]; a [`SessionManager`] keeps at most one of them current.
//!
//! The collaborators a session needs (the surface, preference storage,
//! telemetry, the resource fetcher and the socket connector) are traits so
//! the host binary and tests can plug in their own.

pub mod error;
pub mod manager;
pub mod services;
pub mod session;
pub mod socket;
pub mod transport;

pub use error::{ProxyFetchError, SocketError, StoreError, SurfaceClosed};
pub use manager::{SessionManager, Shown};
pub use services::{DisplaySurface, PreferenceStore, ResourceFetcher, SessionServices, TelemetrySink};
pub use session::{RelaySession, SessionEvent, SessionHandle, SessionState};
pub use socket::{SocketConnector, SocketEvent, SocketEvents, Subscription, TargetSocket};
pub use transport::WsConnector;
