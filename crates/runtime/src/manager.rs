//! Single-current-session bookkeeping.
//!
//! At most one session is current at a time. Asking for a session while one
//! is live reveals it instead of opening a second surface; disposing the
//! current session clears the slot.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::services::{DisplaySurface, SessionServices};
use crate::session::{RelaySession, SessionHandle};
use crate::socket::SocketConnector;

/// Outcome of [`SessionManager::create_or_show`].
#[derive(Debug, Clone)]
pub enum Shown {
	/// A new session was started on the given surface.
	Created(SessionHandle),
	/// A live session already existed and was revealed. The surface passed in
	/// was disposed unused.
	Revealed(SessionHandle),
}

/// Owns the current relay session.
pub struct SessionManager {
	connector: Arc<dyn SocketConnector>,
	services: SessionServices,
	current: Mutex<Option<SessionHandle>>,
	next_id: AtomicU64,
}

impl SessionManager {
	pub fn new(connector: Arc<dyn SocketConnector>, services: SessionServices) -> Self {
		Self {
			connector,
			services,
			current: Mutex::new(None),
			next_id: AtomicU64::new(1),
		}
	}

	/// Reveals the current session if one is live, otherwise starts a new one
	/// bridging `surface` to `target_url`.
	pub fn create_or_show(&self, target_url: &str, surface: Arc<dyn DisplaySurface>) -> Shown {
		let mut current = self.current.lock();
		if let Some(handle) = current.as_ref().filter(|h| !h.is_disposed()) {
			debug!(session = handle.id(), "session already open, revealing");
			handle.reveal();
			surface.dispose();
			return Shown::Revealed(handle.clone());
		}
		let handle = self.start(target_url, surface);
		*current = Some(handle.clone());
		Shown::Created(handle)
	}

	/// Starts a session on a surface restored by the host, replacing any
	/// current one.
	pub fn revive(&self, target_url: &str, surface: Arc<dyn DisplaySurface>) -> SessionHandle {
		let mut current = self.current.lock();
		if let Some(previous) = current.take() {
			previous.dispose();
		}
		let handle = self.start(target_url, surface);
		*current = Some(handle.clone());
		handle
	}

	/// The live session, if any.
	pub fn current(&self) -> Option<SessionHandle> {
		let mut current = self.current.lock();
		if current.as_ref().is_some_and(SessionHandle::is_disposed) {
			*current = None;
		}
		current.clone()
	}

	fn start(&self, target_url: &str, surface: Arc<dyn DisplaySurface>) -> SessionHandle {
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		info!(session = id, target = %target_url, "starting relay session");
		RelaySession::spawn(id, target_url, surface, Arc::clone(&self.connector), self.services.clone())
	}
}

#[cfg(test)]
mod tests {
	use std::collections::BTreeMap;

	use async_trait::async_trait;
	use devtools_relay_protocol::{PreferenceUpdate, Preferences, TelemetryEvent};

	use super::*;
	use crate::error::{ProxyFetchError, SocketError, StoreError, SurfaceClosed};
	use crate::services::{PreferenceStore, ResourceFetcher, TelemetrySink};
	use crate::session::SessionState;
	use crate::socket::{SocketEvents, TargetSocket};

	#[derive(Default)]
	struct CountingSurface {
		disposed: Mutex<usize>,
		revealed: Mutex<usize>,
	}

	impl DisplaySurface for CountingSurface {
		fn post_message(&self, _text: String) -> Result<(), SurfaceClosed> {
			Ok(())
		}

		fn reveal(&self) {
			*self.revealed.lock() += 1;
		}

		fn dispose(&self) {
			*self.disposed.lock() += 1;
		}
	}

	struct NullSocket;

	impl TargetSocket for NullSocket {
		fn send(&mut self, _frame: String) -> Result<(), SocketError> {
			Ok(())
		}

		fn close(&mut self) {}
	}

	struct NullConnector;

	impl SocketConnector for NullConnector {
		fn connect(&self, _url: &str, _events: SocketEvents) -> Box<dyn TargetSocket> {
			Box::new(NullSocket)
		}
	}

	struct NullServices;

	impl PreferenceStore for NullServices {
		fn load(&self) -> Result<Preferences, StoreError> {
			Ok(BTreeMap::new())
		}

		fn store(&self, _update: &PreferenceUpdate) -> Result<(), StoreError> {
			Ok(())
		}
	}

	impl TelemetrySink for NullServices {
		fn record(&self, _event: &TelemetryEvent) {}
	}

	#[async_trait]
	impl ResourceFetcher for NullServices {
		async fn fetch(&self, url: &str) -> Result<String, ProxyFetchError> {
			Err(ProxyFetchError {
				url: url.to_string(),
				reason: "offline".into(),
			})
		}
	}

	fn manager() -> SessionManager {
		let services = Arc::new(NullServices);
		SessionManager::new(
			Arc::new(NullConnector),
			SessionServices {
				preferences: services.clone(),
				telemetry: services.clone(),
				fetcher: services,
			},
		)
	}

	const TARGET: &str = "ws://127.0.0.1:9222/devtools/page/1";

	fn handle(shown: &Shown) -> &SessionHandle {
		match shown {
			Shown::Created(handle) | Shown::Revealed(handle) => handle,
		}
	}

	#[tokio::test]
	async fn second_request_reveals_the_live_session() {
		let manager = manager();
		let first = Arc::new(CountingSurface::default());
		let second = Arc::new(CountingSurface::default());

		let created = manager.create_or_show(TARGET, first.clone());
		assert!(matches!(created, Shown::Created(_)));

		let shown = manager.create_or_show(TARGET, second.clone());
		assert!(matches!(shown, Shown::Revealed(_)));
		assert_eq!(handle(&shown).id(), handle(&created).id());
		assert_eq!(*second.disposed.lock(), 1);

		// Reveal is handled on the session task.
		for _ in 0..100 {
			if *first.revealed.lock() == 1 {
				break;
			}
			tokio::task::yield_now().await;
		}
		assert_eq!(*first.revealed.lock(), 1);
	}

	#[tokio::test]
	async fn disposed_session_is_no_longer_current() {
		let manager = manager();
		let surface = Arc::new(CountingSurface::default());
		let first = handle(&manager.create_or_show(TARGET, surface.clone())).clone();

		first.dispose();
		first.disposed().await;

		assert!(manager.current().is_none());
		assert_eq!(*surface.disposed.lock(), 1);

		let next = manager.create_or_show(TARGET, Arc::new(CountingSurface::default()));
		assert!(matches!(next, Shown::Created(_)));
		assert_ne!(handle(&next).id(), first.id());
	}

	#[tokio::test]
	async fn revive_replaces_the_current_session() {
		let manager = manager();
		let old = handle(&manager.create_or_show(TARGET, Arc::new(CountingSurface::default()))).clone();

		let revived = manager.revive(TARGET, Arc::new(CountingSurface::default()));
		old.disposed().await;

		assert_eq!(old.state(), SessionState::Disposed);
		assert_eq!(manager.current().map(|h| h.id()), Some(revived.id()));

		revived.dispose();
		revived.disposed().await;
		assert!(manager.current().is_none());
	}

	#[tokio::test]
	async fn revive_without_a_current_session_starts_one() {
		let manager = manager();
		let surface = Arc::new(CountingSurface::default());

		let revived = manager.revive(TARGET, surface.clone());

		assert_eq!(manager.current().map(|h| h.id()), Some(revived.id()));
		assert_eq!(*surface.disposed.lock(), 0);
	}
}
