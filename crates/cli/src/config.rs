//! Relay configuration.
//!
//! Precedence, highest first: CLI flag, project `.devtools-relay.json`,
//! global `config.json`, built-in default.

use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result};
use crate::state::StatePaths;
use crate::state::storage::load_json;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 9222;
pub const DEFAULT_LISTEN: &str = "127.0.0.1:9333";
pub const DEFAULT_FRONT_END_DIR: &str = "./front_end";
pub const DEFAULT_BRIDGE_DIR: &str = "./bridge/pkg";
pub const DEFAULT_CONTAINER: &str = "devtools";

/// On-disk config. Every key is optional so files can be layered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayConfig {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub host: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub port: Option<u16>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub listen: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub front_end_dir: Option<PathBuf>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub bridge_dir: Option<PathBuf>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub browser_path: Option<PathBuf>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub container: Option<String>,
}

impl RelayConfig {
	/// Global config overlaid with the project file.
	pub fn load(paths: &StatePaths) -> Self {
		let mut config = load_json::<RelayConfig>(&paths.config).unwrap_or_default();
		if let Some(project) = load_json::<RelayConfig>(&paths.project_config) {
			config.merge(project);
		}
		config
	}

	/// Overlays every key `other` sets.
	pub fn merge(&mut self, other: RelayConfig) {
		fn take<T>(slot: &mut Option<T>, value: Option<T>) {
			if value.is_some() {
				*slot = value;
			}
		}
		take(&mut self.host, other.host);
		take(&mut self.port, other.port);
		take(&mut self.listen, other.listen);
		take(&mut self.front_end_dir, other.front_end_dir);
		take(&mut self.bridge_dir, other.bridge_dir);
		take(&mut self.browser_path, other.browser_path);
		take(&mut self.container, other.container);
	}
}

/// Fully resolved settings for one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
	/// Discovery endpoint host, also written into rewritten socket URLs.
	pub host: String,
	pub port: u16,
	/// Where the host server listens.
	pub listen: SocketAddr,
	pub front_end_dir: PathBuf,
	pub bridge_dir: PathBuf,
	pub browser_path: Option<PathBuf>,
	pub container: String,
}

impl Settings {
	/// Applies `flags` (treated as the highest-priority layer) over `config`.
	pub fn resolve(config: &RelayConfig, flags: RelayConfig) -> Result<Self> {
		let mut merged = config.clone();
		merged.merge(flags);

		let listen_raw = merged.listen.as_deref().unwrap_or(DEFAULT_LISTEN);
		let listen = listen_raw
			.parse::<SocketAddr>()
			.map_err(|err| RelayError::InvalidInput(format!("listen address `{listen_raw}`: {err}")))?;

		let container = merged.container.unwrap_or_else(|| DEFAULT_CONTAINER.to_string());
		if container.is_empty() {
			return Err(RelayError::InvalidInput("container id must not be empty".into()));
		}

		Ok(Self {
			host: merged.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
			port: merged.port.unwrap_or(DEFAULT_PORT),
			listen,
			front_end_dir: merged.front_end_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_FRONT_END_DIR)),
			bridge_dir: merged.bridge_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_BRIDGE_DIR)),
			browser_path: merged.browser_path,
			container,
		})
	}
}
