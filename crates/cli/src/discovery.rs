//! Target Resolver: lists debuggable contexts from the discovery endpoint and
//! picks the one to attach to.

use std::io::{BufRead, Write};
use std::time::Duration;

use devtools_relay_protocol::TargetDescriptor;
use devtools_relay_protocol::target::find_by_url;
use reqwest::header::HOST;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{RelayError, Result};

const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(2);

/// Paths tried in order. Older endpoints only answer the second.
const LIST_PATHS: [&str; 2] = ["/json/list", "/json"];

/// Fetches the target list from `http://{host}:{port}` and rewrites every
/// socket URL to point at `host:port`.
pub async fn fetch_targets(host: &str, port: u16) -> Result<Vec<TargetDescriptor>> {
	let client = reqwest::Client::builder()
		.timeout(DISCOVERY_TIMEOUT)
		.build()
		.map_err(|e| RelayError::Discovery(format!("failed to create HTTP client: {e}")))?;

	let mut last_error = String::from("no response");
	for path in LIST_PATHS {
		let url = format!("http://{host}:{port}{path}");
		match fetch_body(&client, &url).await {
			Ok(body) => {
				let mut targets = parse_targets(&body)?;
				for target in &mut targets {
					target.rewrite_for_remote(host, port);
				}
				info!(endpoint = %url, count = targets.len(), "discovered targets");
				return Ok(targets);
			}
			Err(err) => {
				debug!(endpoint = %url, error = %err, "discovery request failed");
				last_error = err;
			}
		}
	}

	Err(RelayError::Discovery(format!(
		"no target list at {host}:{port}: {last_error}"
	)))
}

async fn fetch_body(client: &reqwest::Client, url: &str) -> std::result::Result<String, String> {
	// Chrome refuses discovery requests whose Host header is not an IP or
	// `localhost`.
	let response = client
		.get(url)
		.header(HOST, "localhost")
		.send()
		.await
		.map_err(|e| e.to_string())?;

	if !response.status().is_success() {
		return Err(format!("unexpected status {}", response.status()));
	}

	response.text().await.map_err(|e| e.to_string())
}

/// Parses a discovery body. Anything but a JSON array is an error.
pub fn parse_targets(body: &str) -> Result<Vec<TargetDescriptor>> {
	let value: Value =
		serde_json::from_str(body).map_err(|e| RelayError::Discovery(format!("target list is not JSON: {e}")))?;
	if !value.is_array() {
		return Err(RelayError::Discovery("target list is not a JSON array".into()));
	}
	serde_json::from_value(value).map_err(|e| RelayError::Discovery(format!("malformed target descriptor: {e}")))
}

/// Polls the endpoint while a freshly launched browser boots.
pub async fn wait_for_targets(host: &str, port: u16, attempts: u32, delay: Duration) -> Result<Vec<TargetDescriptor>> {
	let mut last = None;
	for attempt in 1..=attempts.max(1) {
		match fetch_targets(host, port).await {
			Ok(targets) => return Ok(targets),
			Err(err) => {
				debug!(attempt, error = %err, "debugging endpoint not ready");
				last = Some(err);
			}
		}
		tokio::time::sleep(delay).await;
	}
	Err(last.unwrap_or_else(|| RelayError::Discovery("debugging endpoint never answered".into())))
}

/// Case-insensitive match on the page URL.
pub fn select_by_url<'a>(targets: &'a [TargetDescriptor], url: &str) -> Result<&'a TargetDescriptor> {
	find_by_url(targets, url).ok_or_else(|| RelayError::TargetNotFound { url: url.to_string() })
}

/// The rewritten socket URL of `target`.
pub fn socket_url(target: &TargetDescriptor) -> Result<String> {
	target
		.web_socket_debugger_url
		.clone()
		.ok_or_else(|| RelayError::TargetUnavailable {
			title: target.title.clone(),
		})
}

/// Lists `targets` on `output` and reads a 1-based choice from `input`.
///
/// Empty input cancels.
pub fn choose_target<'a>(
	targets: &'a [TargetDescriptor],
	mut input: impl BufRead,
	mut output: impl Write,
) -> Result<&'a TargetDescriptor> {
	if targets.is_empty() {
		return Err(RelayError::Discovery("endpoint reported no targets".into()));
	}

	for (index, target) in targets.iter().enumerate() {
		let pick = target.pick();
		writeln!(output, "{:>3}) {}", index + 1, pick.label)?;
		writeln!(output, "     {}", pick.description)?;
		if pick.detail.is_none() {
			writeln!(output, "     (no debugger websocket)")?;
		}
	}
	write!(output, "Select a target [1-{}]: ", targets.len())?;
	output.flush()?;

	let mut line = String::new();
	input.read_line(&mut line)?;
	let choice = line.trim();
	if choice.is_empty() {
		return Err(RelayError::InvalidInput("no target selected".into()));
	}

	choice
		.parse::<usize>()
		.ok()
		.and_then(|n| n.checked_sub(1))
		.and_then(|index| targets.get(index))
		.ok_or_else(|| RelayError::InvalidInput(format!("`{choice}` is not a target number")))
}
