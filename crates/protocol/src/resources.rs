//! Resource loads proxied through the host.
//!
//! The front-end's execution context cannot issue cross-origin requests, so
//! it asks the host with `getUrl:` and waits for the `setUrl:` carrying the
//! same id.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::LazyLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

/// Module manifest whose paused-details revealer entry gets stripped.
pub const MODULE_MANIFEST: &str = "sources/module.json";

// One `{ ... DebuggerPausedDetailsRevealer ... },` extension entry.
static PAUSED_REVEALER: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"\{[^}]+DebuggerPausedDetailsRevealer[^}]+\},").expect("valid regex"));

/// Body of `getUrl:`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRequest {
	pub id: u64,
	pub url: String,
}

/// Body of `setUrl:`. Failed loads carry empty `content`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlResponse {
	pub id: u64,
	pub content: String,
}

/// Loads the front-end cannot perform itself.
pub fn is_cross_origin(url: &str) -> bool {
	url.starts_with("http://") || url.starts_with("https://")
}

/// Removes the extension entry that switches to the Sources panel whenever a
/// breakpoint is hit.
pub fn strip_paused_revealer(manifest: &str) -> Cow<'_, str> {
	PAUSED_REVEALER.replace_all(manifest, "")
}

/// In-flight proxied loads keyed by id.
///
/// Ids increase monotonically and are never handed out twice, so a response
/// can only ever resolve the request that produced it.
#[derive(Debug)]
pub struct PendingRequests<R> {
	next_id: u64,
	resolvers: HashMap<u64, R>,
}

impl<R> Default for PendingRequests<R> {
	fn default() -> Self {
		Self {
			next_id: 0,
			resolvers: HashMap::new(),
		}
	}
}

impl<R> PendingRequests<R> {
	pub fn new() -> Self {
		Self::default()
	}

	/// Stores `resolver` and returns the request it should be sent with.
	pub fn register(&mut self, url: impl Into<String>, resolver: R) -> UrlRequest {
		let id = self.next_id;
		self.next_id += 1;
		self.resolvers.insert(id, resolver);
		UrlRequest { id, url: url.into() }
	}

	/// Removes and returns the resolver waiting on `id`, if any.
	pub fn resolve(&mut self, id: u64) -> Option<R> {
		self.resolvers.remove(&id)
	}

	pub fn len(&self) -> usize {
		self.resolvers.len()
	}

	pub fn is_empty(&self) -> bool {
		self.resolvers.is_empty()
	}
}
