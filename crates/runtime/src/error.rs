//! Error types for the relay runtime.
//!
//! None of these end a session on their own: socket errors become lifecycle
//! notifications, proxy fetch errors become empty content, and store errors
//! are logged.

use thiserror::Error;

/// Outbound target socket failed to connect, errored, or refused a frame.
#[derive(Debug, Clone, Error)]
#[error("target socket error: {0}")]
pub struct SocketError(pub String);

/// Fetch-on-behalf-of failed. Recovered locally as empty content.
#[derive(Debug, Clone, Error)]
#[error("proxied fetch of {url} failed: {reason}")]
pub struct ProxyFetchError {
	pub url: String,
	pub reason: String,
}

/// The display surface is gone and can no longer receive messages.
#[derive(Debug, Clone, Copy, Error)]
#[error("display surface closed")]
pub struct SurfaceClosed;

/// Preference storage failed to read or write.
#[derive(Debug, Error)]
pub enum StoreError {
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}
