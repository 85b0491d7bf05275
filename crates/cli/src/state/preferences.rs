//! Front-end preferences persisted as one JSON object.

use std::path::{Path, PathBuf};

use devtools_relay_protocol::{PreferenceUpdate, Preferences};
use devtools_relay_runtime::{PreferenceStore, StoreError};
use parking_lot::Mutex;
use tracing::debug;

use super::storage::{read_json, save_json};

/// [`PreferenceStore`] backed by `preferences.json`.
///
/// Writes are read-modify-write under a lock, so concurrent `setState:`
/// messages never drop each other's keys.
#[derive(Debug)]
pub struct JsonPreferenceStore {
	path: PathBuf,
	lock: Mutex<()>,
}

impl JsonPreferenceStore {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			lock: Mutex::new(()),
		}
	}

	pub fn path(&self) -> &Path {
		&self.path
	}
}

impl PreferenceStore for JsonPreferenceStore {
	fn load(&self) -> Result<Preferences, StoreError> {
		let _guard = self.lock.lock();
		Ok(read_json(&self.path)?.unwrap_or_default())
	}

	fn store(&self, update: &PreferenceUpdate) -> Result<(), StoreError> {
		let _guard = self.lock.lock();
		let mut prefs: Preferences = read_json(&self.path)?.unwrap_or_default();
		update.apply(&mut prefs);
		save_json(&self.path, &prefs)?;
		debug!(name = %update.name, "preference stored");
		Ok(())
	}
}
