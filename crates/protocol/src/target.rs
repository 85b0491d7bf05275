//! Discovery endpoint descriptors.

use std::sync::LazyLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// The `host[:port]` segment right after `ws://`, up to the next `/` or end.
static WS_HOST: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"ws://([^/]+)/?").expect("valid regex"));

/// One debuggable context listed by `/json/list`.
///
/// Fields the relay does not use (`id`, `type`, `devtoolsFrontendUrl`, ...)
/// are kept in `extra` so descriptors round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDescriptor {
	#[serde(default)]
	pub title: String,
	#[serde(default)]
	pub url: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub web_socket_debugger_url: Option<String>,
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

impl TargetDescriptor {
	/// Points `webSocketDebuggerUrl` at the configured remote address.
	///
	/// The endpoint reports the loopback address it sees itself at, which is
	/// wrong for anything but a local target. Descriptors without a socket URL
	/// are left alone.
	pub fn rewrite_for_remote(&mut self, host: &str, port: u16) {
		if let Some(ws) = self.web_socket_debugger_url.as_mut() {
			*ws = rewrite_ws_host(ws, host, port);
		}
	}

	/// Case-insensitive comparison against the page URL.
	pub fn matches_url(&self, url: &str) -> bool {
		self.url.to_lowercase() == url.to_lowercase()
	}

	pub fn pick(&self) -> TargetPick {
		TargetPick {
			label: self.title.clone(),
			description: self.url.clone(),
			detail: self.web_socket_debugger_url.clone(),
		}
	}
}

/// Interactive-selection view of a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetPick {
	/// Shown as the entry title.
	pub label: String,
	/// Page URL, shown next to the title.
	pub description: String,
	/// Rewritten socket URL, the payload of the selection.
	pub detail: Option<String>,
}

/// Replaces the `host[:port]` after `ws://` with `{host}:{port}`.
///
/// Strings without a `ws://` authority are returned unchanged.
pub fn rewrite_ws_host(ws_url: &str, host: &str, port: u16) -> String {
	match WS_HOST.captures(ws_url).and_then(|caps| caps.get(1)) {
		Some(authority) => {
			let mut rewritten = String::with_capacity(ws_url.len() + host.len());
			rewritten.push_str(&ws_url[..authority.start()]);
			rewritten.push_str(&format!("{host}:{port}"));
			rewritten.push_str(&ws_url[authority.end()..]);
			rewritten
		}
		None => ws_url.to_string(),
	}
}

/// Finds the first descriptor whose page URL matches `url`, ignoring case.
pub fn find_by_url<'a>(targets: &'a [TargetDescriptor], url: &str) -> Option<&'a TargetDescriptor> {
	targets.iter().find(|t| t.matches_url(url))
}
