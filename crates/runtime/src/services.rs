//! Collaborators a relay session depends on.

use std::sync::Arc;

use async_trait::async_trait;
use devtools_relay_protocol::{PreferenceUpdate, Preferences, TelemetryEvent};
use tokio::task::AbortHandle;

use crate::error::{ProxyFetchError, StoreError, SurfaceClosed};

/// The container hosting the front-end, seen from the host side.
pub trait DisplaySurface: Send + Sync + 'static {
	/// Posts one text frame to the container channel.
	fn post_message(&self, text: String) -> Result<(), SurfaceClosed>;

	/// Brings the container to the user's attention.
	fn reveal(&self) {}

	/// Releases the container. Called once, when the session is disposed.
	fn dispose(&self);
}

/// Persisted front-end preferences: read whole, written per key.
pub trait PreferenceStore: Send + Sync + 'static {
	fn load(&self) -> Result<Preferences, StoreError>;

	/// Merges `update` into the stored map, preserving every other key.
	fn store(&self, update: &PreferenceUpdate) -> Result<(), StoreError>;
}

/// Receives telemetry raised by the front-end.
pub trait TelemetrySink: Send + Sync + 'static {
	fn record(&self, event: &TelemetryEvent);
}

/// Performs cross-origin loads with the host's network access.
#[async_trait]
pub trait ResourceFetcher: Send + Sync + 'static {
	async fn fetch(&self, url: &str) -> Result<String, ProxyFetchError>;
}

/// Shared services handed to every session.
#[derive(Clone)]
pub struct SessionServices {
	pub preferences: Arc<dyn PreferenceStore>,
	pub telemetry: Arc<dyn TelemetrySink>,
	pub fetcher: Arc<dyn ResourceFetcher>,
}

/// A task aborted when a session is torn down.
#[derive(Debug)]
pub(crate) struct Disposable(AbortHandle);

impl Disposable {
	pub(crate) fn task(handle: AbortHandle) -> Self {
		Self(handle)
	}

	pub(crate) fn dispose(self) {
		self.0.abort();
	}

	/// True once the task has finished on its own.
	pub(crate) fn is_spent(&self) -> bool {
		self.0.is_finished()
	}
}
