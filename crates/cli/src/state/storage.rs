//! File storage for relay state (config, preferences, persisted sessions).

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use devtools_relay_runtime::StoreError;

/// Name of the per-project config file, looked up in the working directory.
pub const PROJECT_CONFIG: &str = ".devtools-relay.json";

const APP_DIR: &str = "devtools-relay";

/// File paths for relay state storage.
///
/// Everything lives in one state directory: `$XDG_CONFIG_HOME/devtools-relay`
/// by default, or whatever `--state-dir` says.
#[derive(Debug, Clone)]
pub struct StatePaths {
	pub dir: PathBuf,
	pub config: PathBuf,
	pub preferences: PathBuf,
	pub sessions: PathBuf,
	pub project_config: PathBuf,
}

impl StatePaths {
	pub fn new(state_dir: Option<&Path>, project_root: &Path) -> Self {
		let dir = state_dir.map(Path::to_path_buf).unwrap_or_else(default_state_dir);

		Self {
			config: dir.join("config.json"),
			preferences: dir.join("preferences.json"),
			sessions: dir.join("sessions.json"),
			project_config: project_root.join(PROJECT_CONFIG),
			dir,
		}
	}
}

fn default_state_dir() -> PathBuf {
	std::env::var_os("XDG_CONFIG_HOME")
		.map(PathBuf::from)
		.or_else(dirs::config_dir)
		.unwrap_or_else(|| PathBuf::from("."))
		.join(APP_DIR)
}

/// Reads `path` leniently: missing or unparsable files yield `None`.
pub fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Option<T> {
	fs::read_to_string(path)
		.ok()
		.and_then(|content| serde_json::from_str(&content).ok())
}

/// Reads `path` strictly: a missing file is `None`, anything else that goes
/// wrong is an error.
pub fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
	match fs::read_to_string(path) {
		Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
		Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
		Err(err) => Err(err.into()),
	}
}

/// Writes `data` through a sibling temp file so readers never see a torn file.
pub fn save_json<T: serde::Serialize>(path: &Path, data: &T) -> Result<(), StoreError> {
	if let Some(parent) = path.parent() {
		fs::create_dir_all(parent)?;
	}
	let tmp = path.with_extension("json.tmp");
	fs::write(&tmp, serde_json::to_string_pretty(data)?)?;
	fs::rename(&tmp, path)?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use std::collections::BTreeMap;

	use super::*;
	use tempfile::TempDir;

	#[test]
	fn explicit_state_dir_wins() {
		let tmp = TempDir::new().unwrap();
		let paths = StatePaths::new(Some(tmp.path()), Path::new("/work"));
		assert_eq!(paths.config, tmp.path().join("config.json"));
		assert_eq!(paths.sessions, tmp.path().join("sessions.json"));
		assert_eq!(paths.project_config, Path::new("/work").join(PROJECT_CONFIG));
	}

	#[test]
	fn default_state_dir_is_app_scoped() {
		let paths = StatePaths::new(None, Path::new("."));
		assert!(paths.dir.ends_with(APP_DIR));
		assert!(paths.preferences.ends_with("devtools-relay/preferences.json"));
	}

	#[test]
	fn load_json_missing_file() {
		let tmp = TempDir::new().unwrap();
		let result: Option<BTreeMap<String, String>> = load_json(&tmp.path().join("nope.json"));
		assert!(result.is_none());
	}

	#[test]
	fn read_json_distinguishes_missing_from_corrupt() {
		let tmp = TempDir::new().unwrap();
		let path = tmp.path().join("state.json");

		let missing: Option<BTreeMap<String, String>> = read_json(&path).unwrap();
		assert!(missing.is_none());

		fs::write(&path, "{not json").unwrap();
		let corrupt = read_json::<BTreeMap<String, String>>(&path);
		assert!(matches!(corrupt, Err(StoreError::Json(_))));
	}

	#[test]
	fn save_creates_parents_and_round_trips() {
		let tmp = TempDir::new().unwrap();
		let path = tmp.path().join("nested/dir/state.json");

		let mut data = BTreeMap::new();
		data.insert("uiTheme".to_string(), "dark".to_string());
		save_json(&path, &data).unwrap();

		let loaded: BTreeMap<String, String> = read_json(&path).unwrap().unwrap();
		assert_eq!(loaded, data);
		assert!(!path.with_extension("json.tmp").exists());
	}
}
