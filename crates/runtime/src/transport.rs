//! WebSocket transport for target sockets.
//!
//! Each socket is a tokio task owning the websocket stream. Outbound frames go
//! through an unbounded channel so [`TargetSocket::send`] never blocks the
//! session task; inbound traffic and lifecycle changes are reported through
//! the socket's [`SocketEvents`] sink.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::error::SocketError;
use crate::socket::{SocketConnector, SocketEvent, SocketEvents, TargetSocket};

/// Connects target sockets over `ws://`/`wss://` with tokio-tungstenite.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

impl WsConnector {
	pub fn new() -> Self {
		Self
	}
}

impl SocketConnector for WsConnector {
	fn connect(&self, url: &str, events: SocketEvents) -> Box<dyn TargetSocket> {
		let (tx, rx) = mpsc::unbounded_channel();
		tokio::spawn(run_socket(url.to_string(), rx, events));
		Box::new(WsSocket { outbound: Some(tx) })
	}
}

struct WsSocket {
	outbound: Option<mpsc::UnboundedSender<Message>>,
}

impl TargetSocket for WsSocket {
	fn send(&mut self, frame: String) -> Result<(), SocketError> {
		let tx = self
			.outbound
			.as_ref()
			.ok_or_else(|| SocketError("socket closed".into()))?;
		tx.send(Message::Text(frame))
			.map_err(|_| SocketError("socket task ended".into()))
	}

	fn close(&mut self) {
		if let Some(tx) = self.outbound.take() {
			// Ask for a clean close. Dropping the sender ends the writer either way.
			let _ = tx.send(Message::Close(None));
		}
	}
}

impl Drop for WsSocket {
	fn drop(&mut self) {
		self.close();
	}
}

async fn run_socket(url: String, mut outbound: mpsc::UnboundedReceiver<Message>, events: SocketEvents) {
	let stream = match connect_async(url.as_str()).await {
		Ok((stream, _response)) => stream,
		Err(err) => {
			warn!(url = %url, error = %err, "failed to connect to target");
			events.emit(SocketEvent::Error(err.to_string()));
			events.emit(SocketEvent::Close);
			return;
		}
	};
	debug!(url = %url, "target socket connected");
	events.emit(SocketEvent::Open);

	let (mut sink, mut stream) = stream.split();
	loop {
		tokio::select! {
			out = outbound.recv() => match out {
				Some(Message::Close(frame)) => {
					let _ = sink.send(Message::Close(frame)).await;
					break;
				}
				Some(msg) => {
					if let Err(err) = sink.send(msg).await {
						events.emit(SocketEvent::Error(err.to_string()));
						break;
					}
				}
				None => {
					let _ = sink.close().await;
					break;
				}
			},
			inbound = stream.next() => match inbound {
				Some(Ok(Message::Text(text))) => {
					events.emit(SocketEvent::Message(text));
				}
				Some(Ok(Message::Binary(bytes))) => {
					// Debugging protocol traffic is text; tolerate UTF-8 binary frames.
					match String::from_utf8(bytes) {
						Ok(text) => {
							events.emit(SocketEvent::Message(text));
						}
						Err(_) => debug!(url = %url, "dropping non-UTF-8 binary frame"),
					}
				}
				Some(Ok(Message::Close(_))) | None => break,
				Some(Ok(_)) => {}
				Some(Err(err)) => {
					events.emit(SocketEvent::Error(err.to_string()));
					break;
				}
			},
		}
	}

	debug!(url = %url, "target socket closed");
	events.emit(SocketEvent::Close);
}
