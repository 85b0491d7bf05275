//! The relay session state machine.
//!
//! States:
//!
//! - `Idle`: no target socket.
//! - `Connecting`: socket constructed, handshake pending. Protocol frames are queued.
//! - `Connected`: queued frames flushed, new frames forwarded immediately.
//! - `Closed`: the link dropped. The socket is released and the next protocol
//!   frame constructs a fresh one.
//! - `Disposed`: terminal.
//!
//! Frames from the surface reach the target in exactly the order they
//! arrived, across the connect boundary. A frame is never skipped while the
//! link stays up: a failed send closes the link and tells the surface.

use std::sync::Arc;

use devtools_relay_protocol::{ChannelMessage, FrameQueue, HostMessage, UrlRequest, UrlResponse};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::error::SocketError;
use crate::services::{DisplaySurface, Disposable, SessionServices};
use crate::socket::{self, SocketConnector, SocketEvent, Subscription, TargetSocket};

#[cfg(test)]
mod tests;

/// Observable lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
	Idle,
	Connecting,
	Connected,
	Closed,
	Disposed,
}

/// Input to the session task.
#[derive(Debug)]
pub enum SessionEvent {
	/// Text frame from the display surface.
	Inbound(String),
	/// Lifecycle event from the target socket of `generation`.
	Socket { generation: u64, event: SocketEvent },
	Reveal,
	Dispose,
}

struct AttachedSocket {
	socket: Box<dyn TargetSocket>,
	subscription: Subscription,
}

impl AttachedSocket {
	/// Unsubscribes, then closes. Nothing the socket does afterwards reaches
	/// the session.
	fn detach(mut self) {
		self.subscription.unsubscribe();
		self.socket.close();
	}
}

/// Bridges one display surface to one debug target.
pub struct RelaySession {
	id: u64,
	target_url: Arc<str>,
	surface: Arc<dyn DisplaySurface>,
	connector: Arc<dyn SocketConnector>,
	services: SessionServices,
	events: mpsc::WeakUnboundedSender<SessionEvent>,
	socket: Option<AttachedSocket>,
	generation: u64,
	queue: FrameQueue,
	disposables: Vec<Disposable>,
	state: watch::Sender<SessionState>,
}

impl RelaySession {
	pub fn new(
		id: u64,
		target_url: &str,
		surface: Arc<dyn DisplaySurface>,
		connector: Arc<dyn SocketConnector>,
		services: SessionServices,
		events: mpsc::WeakUnboundedSender<SessionEvent>,
	) -> Self {
		let (state, _) = watch::channel(SessionState::Idle);
		Self {
			id,
			target_url: Arc::from(target_url),
			surface,
			connector,
			services,
			events,
			socket: None,
			generation: 0,
			queue: FrameQueue::new(),
			disposables: Vec::new(),
			state,
		}
	}

	/// Spawns the session task and returns a handle to it.
	pub fn spawn(
		id: u64,
		target_url: &str,
		surface: Arc<dyn DisplaySurface>,
		connector: Arc<dyn SocketConnector>,
		services: SessionServices,
	) -> SessionHandle {
		let (tx, rx) = mpsc::unbounded_channel();
		let session = Self::new(id, target_url, surface, connector, services, tx.downgrade());
		let handle = SessionHandle {
			id,
			events: tx,
			state: session.state.subscribe(),
		};
		tokio::spawn(session.run(rx));
		handle
	}

	/// Processes events until disposed or every handle is dropped.
	pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<SessionEvent>) {
		info!(session = self.id, target = %self.target_url, "relay session started");
		while let Some(event) = rx.recv().await {
			if !self.handle(event) {
				break;
			}
		}
		self.dispose();
	}

	pub fn state(&self) -> SessionState {
		*self.state.borrow()
	}

	/// Applies one event. Returns `false` once the session is disposed.
	pub fn handle(&mut self, event: SessionEvent) -> bool {
		if self.state() == SessionState::Disposed {
			return false;
		}
		match event {
			SessionEvent::Inbound(text) => self.on_inbound(&text),
			SessionEvent::Socket { generation, event } => self.on_socket_event(generation, event),
			SessionEvent::Reveal => self.surface.reveal(),
			SessionEvent::Dispose => self.dispose(),
		}
		self.state() != SessionState::Disposed
	}

	fn on_inbound(&mut self, text: &str) {
		let message = match ChannelMessage::decode(text) {
			Ok(message) => message,
			Err(err) => {
				warn!(session = self.id, error = %err, "dropping malformed control message");
				return;
			}
		};

		match message {
			ChannelMessage::Ready => {
				debug!(session = self.id, "front-end ready, resetting target link");
				self.reset_link();
			}
			ChannelMessage::Telemetry(event) => self.services.telemetry.record(&event),
			ChannelMessage::GetState => {
				let prefs = self.services.preferences.load().unwrap_or_else(|err| {
					warn!(session = self.id, error = %err, "failed to load preferences");
					Default::default()
				});
				self.post(HostMessage::Preferences(prefs));
			}
			ChannelMessage::SetState(update) => {
				if let Err(err) = self.services.preferences.store(&update) {
					warn!(session = self.id, name = %update.name, error = %err, "failed to store preference");
				}
			}
			ChannelMessage::GetUrl(request) => self.proxy_fetch(request),
			ChannelMessage::ProtocolFrame(frame) => self.forward(frame),
		}
	}

	fn forward(&mut self, frame: String) {
		if self.socket.is_none() {
			self.open_socket();
		}
		if let Some(frame) = self.queue.push(frame) {
			if let Err(err) = self.send(frame) {
				self.fail_link(&err);
			}
		}
	}

	fn open_socket(&mut self) {
		let Some(tx) = self.events.upgrade() else {
			warn!(session = self.id, "session has no event channel, not connecting");
			return;
		};
		self.generation += 1;
		let (events, subscription) = socket::subscribe(self.generation, tx);
		debug!(session = self.id, generation = self.generation, target = %self.target_url, "connecting to target");
		let socket = self.connector.connect(&self.target_url, events);
		self.socket = Some(AttachedSocket { socket, subscription });
		self.state.send_replace(SessionState::Connecting);
	}

	fn send(&mut self, frame: String) -> Result<(), SocketError> {
		match self.socket.as_mut() {
			Some(attached) => attached.socket.send(frame),
			None => Err(SocketError("no target socket".into())),
		}
	}

	fn on_socket_event(&mut self, generation: u64, event: SocketEvent) {
		if generation != self.generation || self.socket.is_none() {
			debug!(session = self.id, generation, "ignoring event from detached socket");
			return;
		}

		match event {
			SocketEvent::Open => {
				let pending: Vec<String> = self.queue.open().collect();
				debug!(session = self.id, flushed = pending.len(), "target socket open");
				for frame in pending {
					if let Err(err) = self.send(frame) {
						self.fail_link(&err);
						return;
					}
				}
				self.state.send_replace(SessionState::Connected);
				self.post(HostMessage::Open);
			}
			SocketEvent::Message(frame) => self.post(HostMessage::ProtocolFrame(frame)),
			SocketEvent::Error(reason) => {
				warn!(session = self.id, %reason, "target socket error");
				self.post(HostMessage::Error);
			}
			SocketEvent::Close => {
				info!(session = self.id, "target socket closed");
				self.release_socket();
				self.state.send_replace(SessionState::Closed);
				self.post(HostMessage::Close);
			}
		}
	}

	/// Explicit reconnect: drop the current link and wait for the next frame.
	fn reset_link(&mut self) {
		self.release_socket();
		self.state.send_replace(SessionState::Idle);
	}

	/// Closes the link after a frame could not be delivered.
	fn fail_link(&mut self, err: &SocketError) {
		warn!(session = self.id, error = %err, "frame delivery failed, closing target link");
		self.release_socket();
		self.state.send_replace(SessionState::Closed);
		self.post(HostMessage::Close);
	}

	fn release_socket(&mut self) {
		if let Some(attached) = self.socket.take() {
			attached.detach();
		}
		let dropped = self.queue.reset();
		if dropped > 0 {
			warn!(session = self.id, dropped, "discarding frames queued for a closed link");
		}
	}

	fn proxy_fetch(&mut self, request: UrlRequest) {
		let fetcher = Arc::clone(&self.services.fetcher);
		let surface = Arc::clone(&self.surface);
		let session = self.id;
		let task = tokio::spawn(async move {
			// Failures degrade to empty content so the front-end shows missing
			// content instead of failing the whole session.
			let content = match fetcher.fetch(&request.url).await {
				Ok(body) => body,
				Err(err) => {
					warn!(session, error = %err, "resource proxy fetch failed");
					String::new()
				}
			};
			let reply = HostMessage::SetUrl(UrlResponse {
				id: request.id,
				content,
			});
			if surface.post_message(reply.encode()).is_err() {
				debug!(session, id = request.id, "surface gone before resource reply");
			}
		});
		self.disposables.retain(|d| !d.is_spent());
		self.disposables.push(Disposable::task(task.abort_handle()));
	}

	fn post(&self, message: HostMessage) {
		if self.surface.post_message(message.encode()).is_err() {
			debug!(session = self.id, "display surface closed, dropping message");
		}
	}

	/// Releases the container, the socket and any in-flight proxy fetch.
	/// Safe to call more than once.
	pub fn dispose(&mut self) {
		if self.state() == SessionState::Disposed {
			return;
		}
		if let Some(attached) = self.socket.take() {
			attached.detach();
		}
		self.queue.reset();
		self.surface.dispose();
		while let Some(disposable) = self.disposables.pop() {
			disposable.dispose();
		}
		self.state.send_replace(SessionState::Disposed);
		info!(session = self.id, "relay session disposed");
	}
}

/// Cloneable handle to a running [`RelaySession`].
#[derive(Debug, Clone)]
pub struct SessionHandle {
	id: u64,
	events: mpsc::UnboundedSender<SessionEvent>,
	state: watch::Receiver<SessionState>,
}

impl SessionHandle {
	pub fn id(&self) -> u64 {
		self.id
	}

	/// Forwards a text frame received from the display surface.
	pub fn post_message(&self, text: impl Into<String>) -> bool {
		self.events.send(SessionEvent::Inbound(text.into())).is_ok()
	}

	pub fn reveal(&self) {
		let _ = self.events.send(SessionEvent::Reveal);
	}

	pub fn dispose(&self) {
		let _ = self.events.send(SessionEvent::Dispose);
	}

	pub fn state(&self) -> SessionState {
		*self.state.borrow()
	}

	pub fn is_disposed(&self) -> bool {
		self.state() == SessionState::Disposed || self.events.is_closed()
	}

	/// Waits until the session reaches `Disposed`.
	pub async fn disposed(&self) {
		let mut state = self.state.clone();
		let _ = state.wait_for(|s| *s == SessionState::Disposed).await;
	}
}
