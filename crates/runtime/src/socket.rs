//! Target socket abstraction and its event subscription.
//!
//! A socket reports four lifecycle events (open, message, error, close)
//! through a [`SocketEvents`] sink bound to one session and one socket
//! generation. The session keeps the matching [`Subscription`] and cancels it
//! *before* closing the socket, so a close triggered by intentional teardown
//! is never seen as an unexpected disconnect.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;

use crate::error::SocketError;
use crate::session::SessionEvent;

/// Lifecycle event raised by a target socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
	Open,
	Message(String),
	Error(String),
	Close,
}

/// Sink a socket emits its events into.
#[derive(Debug, Clone)]
pub struct SocketEvents {
	generation: u64,
	attached: Arc<AtomicBool>,
	tx: mpsc::UnboundedSender<SessionEvent>,
}

impl SocketEvents {
	/// Delivers `event` to the owning session unless the subscription was
	/// cancelled. Returns whether it was delivered.
	pub fn emit(&self, event: SocketEvent) -> bool {
		if !self.attached.load(Ordering::SeqCst) {
			return false;
		}
		self.tx
			.send(SessionEvent::Socket {
				generation: self.generation,
				event,
			})
			.is_ok()
	}

	pub fn is_attached(&self) -> bool {
		self.attached.load(Ordering::SeqCst)
	}
}

/// Cancellation handle for a [`SocketEvents`] sink.
#[derive(Debug)]
pub struct Subscription {
	attached: Arc<AtomicBool>,
}

impl Subscription {
	/// Stops event delivery. Events emitted afterwards are dropped.
	pub fn unsubscribe(&self) {
		self.attached.store(false, Ordering::SeqCst);
	}
}

/// Creates a sink/subscription pair for socket `generation`.
pub fn subscribe(generation: u64, tx: mpsc::UnboundedSender<SessionEvent>) -> (SocketEvents, Subscription) {
	let attached = Arc::new(AtomicBool::new(true));
	(
		SocketEvents {
			generation,
			attached: Arc::clone(&attached),
			tx,
		},
		Subscription { attached },
	)
}

/// An outbound connection to the debug target.
pub trait TargetSocket: Send {
	/// Queues `frame` for sending. Only called once the socket reported open.
	fn send(&mut self, frame: String) -> Result<(), SocketError>;

	/// Starts closing the socket. Must be idempotent.
	fn close(&mut self);
}

/// Builds target sockets.
///
/// Construction never fails synchronously; connection failures surface as an
/// [`SocketEvent::Error`] followed by [`SocketEvent::Close`].
pub trait SocketConnector: Send + Sync + 'static {
	fn connect(&self, url: &str, events: SocketEvents) -> Box<dyn TargetSocket>;
}
