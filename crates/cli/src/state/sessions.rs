//! Persisted container sessions.
//!
//! A container that was showing a target when the host process stopped can be
//! brought back with `resume`. Entries are keyed by container id and removed
//! when the user closes the container.

use std::collections::BTreeMap;
use std::path::PathBuf;

use devtools_relay_runtime::StoreError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::storage::{read_json, save_json};

/// What is needed to revive a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
	pub target_url: String,
}

pub type PersistedSessions = BTreeMap<String, PersistedSession>;

/// `sessions.json` in the state directory.
#[derive(Debug)]
pub struct SessionStateStore {
	path: PathBuf,
	lock: Mutex<()>,
}

impl SessionStateStore {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			lock: Mutex::new(()),
		}
	}

	pub fn load(&self) -> Result<PersistedSessions, StoreError> {
		let _guard = self.lock.lock();
		Ok(read_json(&self.path)?.unwrap_or_default())
	}

	pub fn get(&self, container: &str) -> Result<Option<PersistedSession>, StoreError> {
		Ok(self.load()?.remove(container))
	}

	pub fn record(&self, container: &str, target_url: &str) -> Result<(), StoreError> {
		self.update(|sessions| {
			sessions.insert(
				container.to_string(),
				PersistedSession {
					target_url: target_url.to_string(),
				},
			);
		})
	}

	/// Forgets `container`. Returns whether it was persisted.
	pub fn remove(&self, container: &str) -> Result<bool, StoreError> {
		let mut removed = false;
		self.update(|sessions| removed = sessions.remove(container).is_some())?;
		Ok(removed)
	}

	fn update(&self, f: impl FnOnce(&mut PersistedSessions)) -> Result<(), StoreError> {
		let _guard = self.lock.lock();
		let mut sessions: PersistedSessions = read_json(&self.path)?.unwrap_or_default();
		f(&mut sessions);
		save_json(&self.path, &sessions)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	const TARGET: &str = "ws://10.0.0.5:9230/devtools/page/ABC";

	#[test]
	fn record_then_get() {
		let tmp = TempDir::new().unwrap();
		let store = SessionStateStore::new(tmp.path().join("sessions.json"));

		store.record("devtools", TARGET).unwrap();

		assert_eq!(
			store.get("devtools").unwrap(),
			Some(PersistedSession {
				target_url: TARGET.into()
			})
		);
		assert_eq!(store.get("other").unwrap(), None);
	}

	#[test]
	fn remove_keeps_other_containers() {
		let tmp = TempDir::new().unwrap();
		let store = SessionStateStore::new(tmp.path().join("sessions.json"));
		store.record("a", TARGET).unwrap();
		store.record("b", "ws://localhost:9222/devtools/page/2").unwrap();

		assert!(store.remove("a").unwrap());
		assert!(!store.remove("a").unwrap());

		let sessions = store.load().unwrap();
		assert_eq!(sessions.keys().collect::<Vec<_>>(), ["b"]);
	}

	#[test]
	fn file_format_is_camel_case() {
		let tmp = TempDir::new().unwrap();
		let path = tmp.path().join("sessions.json");
		SessionStateStore::new(&path).record("devtools", TARGET).unwrap();

		let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
		assert_eq!(raw["devtools"]["targetUrl"], TARGET);
	}
}
