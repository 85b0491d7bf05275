//! FIFO buffering for a link that opens asynchronously.

use std::collections::VecDeque;
use std::collections::vec_deque::Drain;

/// Frames produced before a link is open, delivered in arrival order once it is.
///
/// While closed, every frame is buffered. [`open`](Self::open) drains the
/// buffer, and from then on [`push`](Self::push) hands frames straight back
/// for immediate delivery. The buffer is only ever non-empty while closed.
#[derive(Debug, Default)]
pub struct FrameQueue {
	pending: VecDeque<String>,
	open: bool,
}

impl FrameQueue {
	pub fn new() -> Self {
		Self::default()
	}

	/// Buffers `frame`, or returns it when the link is already open.
	pub fn push(&mut self, frame: String) -> Option<String> {
		if self.open {
			Some(frame)
		} else {
			self.pending.push_back(frame);
			None
		}
	}

	/// Marks the link open and drains everything buffered so far, oldest first.
	pub fn open(&mut self) -> Drain<'_, String> {
		self.open = true;
		self.pending.drain(..)
	}

	/// Marks the link closed and discards anything buffered. Returns how many
	/// frames were dropped.
	pub fn reset(&mut self) -> usize {
		self.open = false;
		let dropped = self.pending.len();
		self.pending.clear();
		dropped
	}

	pub fn is_open(&self) -> bool {
		self.open
	}

	pub fn len(&self) -> usize {
		self.pending.len()
	}

	pub fn is_empty(&self) -> bool {
		self.pending.is_empty()
	}
}
