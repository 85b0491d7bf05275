//! The `/surface` channel: one WebSocket per container.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use devtools_relay_runtime::{DisplaySurface, Shown, SurfaceClosed};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};

use super::SharedState;

/// How long a closing container gets to receive its close frame.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// How long a new container waits for the current one to go away. Covers a
/// reload whose new link arrives before the old link's close.
const TAKEOVER_GRACE: Duration = Duration::from_secs(2);

/// [`DisplaySurface`] writing text frames to a container's WebSocket.
#[derive(Debug)]
pub struct WebSocketSurface {
	tx: mpsc::UnboundedSender<Message>,
	closed: AtomicBool,
}

impl WebSocketSurface {
	pub fn new(tx: mpsc::UnboundedSender<Message>) -> Self {
		Self {
			tx,
			closed: AtomicBool::new(false),
		}
	}
}

impl DisplaySurface for WebSocketSurface {
	fn post_message(&self, text: String) -> Result<(), SurfaceClosed> {
		if self.closed.load(Ordering::SeqCst) {
			return Err(SurfaceClosed);
		}
		self.tx.send(Message::Text(text.into())).map_err(|_| SurfaceClosed)
	}

	fn reveal(&self) {
		// A browser tab cannot be raised from the server; the container just
		// stays open.
		info!("container already open, reusing it");
	}

	fn dispose(&self) {
		if !self.closed.swap(true, Ordering::SeqCst) {
			let _ = self.tx.send(Message::Close(None));
		}
	}
}

/// Why the reader loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ending {
	/// The user closed the container.
	ContainerClosed,
	/// The host server is stopping.
	Shutdown,
	/// The session was disposed from the host side.
	Disposed,
}

pub async fn handle_surface_socket(socket: WebSocket, state: SharedState) {
	let (tx, rx) = mpsc::unbounded_channel();
	let surface = Arc::new(WebSocketSurface::new(tx));
	let (mut ws_tx, mut ws_rx) = socket.split();

	let mut rx_stream = UnboundedReceiverStream::new(rx);
	let send_task = tokio::spawn(async move {
		while let Some(msg) = rx_stream.next().await {
			let closing = matches!(msg, Message::Close(_));
			if ws_tx.send(msg).await.is_err() || closing {
				break;
			}
		}
	});

	let handle = if state.take_restore() {
		let handle = state.manager.revive(&state.target_url, surface);
		info!(session = handle.id(), container = %state.container, "restored persisted session");
		handle
	} else {
		if let Some(current) = state.manager.current() {
			debug!(session = current.id(), "waiting for the current container to go away");
			let _ = tokio::time::timeout(TAKEOVER_GRACE, current.disposed()).await;
		}
		match state.manager.create_or_show(&state.target_url, surface) {
			Shown::Created(handle) => handle,
			Shown::Revealed(handle) => {
				info!(session = handle.id(), "second container refused, session already open");
				let _ = tokio::time::timeout(CLOSE_GRACE, send_task).await;
				return;
			}
		}
	};

	info!(session = handle.id(), container = %state.container, "container connected");
	if let Err(err) = state.sessions.record(&state.container, &state.target_url) {
		warn!(container = %state.container, error = %err, "failed to persist session state");
	}

	let mut shutdown = state.shutdown.clone();
	let ending = loop {
		tokio::select! {
			msg = ws_rx.next() => match msg {
				Some(Ok(Message::Text(text))) => {
					handle.post_message(text.as_str());
				}
				Some(Ok(Message::Close(_))) | None => break Ending::ContainerClosed,
				Some(Ok(_)) => {}
				Some(Err(err)) => {
					warn!(session = handle.id(), error = %err, "container websocket error");
					break Ending::ContainerClosed;
				}
			},
			_ = shutdown.wait_for(|stopping| *stopping) => break Ending::Shutdown,
			_ = handle.disposed() => break Ending::Disposed,
		}
	};
	debug!(session = handle.id(), ?ending, "container link finished");

	if ending == Ending::ContainerClosed {
		if let Err(err) = state.sessions.remove(&state.container) {
			warn!(container = %state.container, error = %err, "failed to forget session state");
		}
	}
	handle.dispose();
	handle.disposed().await;

	let _ = tokio::time::timeout(CLOSE_GRACE, send_task).await;
	info!(session = handle.id(), "container disconnected");
}
