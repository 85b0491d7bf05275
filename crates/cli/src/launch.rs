//! Launching a local Chromium-family browser with remote debugging enabled.

use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info};
use url::Url;

use crate::discovery;
use crate::error::{RelayError, Result};

/// Placeholder in `--file` replaced with the project root.
pub const WORKSPACE_FOLDER: &str = "${workspaceFolder}";

/// Which page the launched browser opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchTarget {
	File(String),
	Url(String),
}

/// Turns the launch target into the URL handed to the browser.
///
/// Files may contain `${workspaceFolder}`; relative paths are resolved against
/// `workspace`.
pub fn launch_url(target: &LaunchTarget, workspace: &Path) -> Result<String> {
	match target {
		LaunchTarget::Url(url) => {
			Url::parse(url).map_err(|e| RelayError::InvalidInput(format!("launch url `{url}`: {e}")))?;
			Ok(url.clone())
		}
		LaunchTarget::File(file) => {
			let substituted = file.replace(WORKSPACE_FOLDER, &workspace.to_string_lossy());
			let path = PathBuf::from(&substituted);
			let path = if path.is_absolute() { path } else { workspace.join(path) };
			Url::from_file_path(&path)
				.map(String::from)
				.map_err(|()| RelayError::InvalidInput(format!("launch file `{}` is not a valid path", path.display())))
		}
	}
}

/// Locates a browser binary: `explicit` first, then well-known locations.
pub fn find_browser(explicit: Option<&Path>) -> Option<PathBuf> {
	if let Some(path) = explicit {
		return path.exists().then(|| path.to_path_buf()).or_else(|| which::which(path).ok());
	}

	let candidates: &[&str] = if cfg!(target_os = "macos") {
		&[
			"/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
			"/Applications/Chromium.app/Contents/MacOS/Chromium",
			"/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
			"/Applications/Google Chrome Canary.app/Contents/MacOS/Google Chrome Canary",
		]
	} else if cfg!(target_os = "windows") {
		&[
			r"C:\Program Files\Google\Chrome\Application\chrome.exe",
			r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
			r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
			r"C:\Program Files\Chromium\Application\chrome.exe",
		]
	} else {
		&[
			"google-chrome-stable",
			"google-chrome",
			"chromium-browser",
			"chromium",
			"microsoft-edge",
			"/usr/bin/google-chrome-stable",
			"/usr/bin/chromium",
			"/snap/bin/chromium",
		]
	};

	candidates.iter().find_map(|candidate| {
		if candidate.starts_with('/') || candidate.contains('\\') {
			let path = Path::new(candidate);
			path.exists().then(|| path.to_path_buf())
		} else {
			which::which(candidate).ok()
		}
	})
}

/// Whether nothing is listening on `port` locally.
pub fn is_port_free(port: u16) -> bool {
	TcpListener::bind(("127.0.0.1", port)).is_ok()
}

/// What to do about the debugging port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortStatus {
	/// Nothing there; launch a browser.
	Free,
	/// A debugging endpoint already answers; reuse it.
	Debuggable,
}

/// Checks the debugging port before launching.
///
/// An occupied port is only acceptable when a discovery endpoint answers on
/// it.
pub async fn check_port(host: &str, port: u16) -> Result<PortStatus> {
	if is_port_free(port) {
		return Ok(PortStatus::Free);
	}
	match discovery::fetch_targets(host, port).await {
		Ok(_) => {
			info!(port, "debugging endpoint already running, reusing it");
			Ok(PortStatus::Debuggable)
		}
		Err(err) => {
			debug!(port, error = %err, "occupied port is not a debugging endpoint");
			Err(RelayError::PortInUse { port })
		}
	}
}

pub fn browser_args(port: u16, url: &str) -> Vec<String> {
	vec![
		format!("--remote-debugging-port={port}"),
		"--no-first-run".to_string(),
		"--no-default-browser-check".to_string(),
		"--disable-extensions".to_string(),
		url.to_string(),
	]
}

/// Spawns the browser detached. Returns its pid; the child is not awaited.
pub fn spawn_browser(browser: &Path, port: u16, url: &str) -> Result<u32> {
	let mut cmd = Command::new(browser);
	cmd.args(browser_args(port, url))
		.stdin(Stdio::null())
		.stdout(Stdio::null())
		.stderr(Stdio::null());

	// Own process group so the browser outlives the relay.
	#[cfg(unix)]
	std::os::unix::process::CommandExt::process_group(&mut cmd, 0);

	let child = cmd
		.spawn()
		.map_err(|e| RelayError::Launch(format!("failed to start {}: {e}", browser.display())))?;
	let pid = child.id();
	info!(pid, browser = %browser.display(), port, url, "browser launched");
	Ok(pid)
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[test]
	fn workspace_folder_is_substituted() {
		let tmp = TempDir::new().unwrap();
		let url = launch_url(
			&LaunchTarget::File("${workspaceFolder}/index.html".into()),
			tmp.path(),
		)
		.unwrap();

		assert!(url.starts_with("file://"));
		assert!(url.ends_with("/index.html"));
		assert!(!url.contains("workspaceFolder"));
	}

	#[test]
	fn relative_file_resolves_against_workspace() {
		let tmp = TempDir::new().unwrap();
		let url = launch_url(&LaunchTarget::File("site/app.html".into()), tmp.path()).unwrap();
		let expected = Url::from_file_path(tmp.path().join("site/app.html")).unwrap();
		assert_eq!(url, expected.as_str());
	}

	#[test]
	fn urls_are_validated() {
		let workspace = Path::new("/");
		assert_eq!(
			launch_url(&LaunchTarget::Url("http://localhost:8080/".into()), workspace).unwrap(),
			"http://localhost:8080/"
		);
		assert!(matches!(
			launch_url(&LaunchTarget::Url("not a url".into()), workspace),
			Err(RelayError::InvalidInput(_))
		));
	}

	#[test]
	fn browser_args_end_with_the_url() {
		let args = browser_args(9222, "about:blank");
		assert_eq!(args[0], "--remote-debugging-port=9222");
		assert!(args.contains(&"--disable-extensions".to_string()));
		assert_eq!(args.last().map(String::as_str), Some("about:blank"));
	}

	#[test]
	fn bound_port_is_not_free() {
		let listener = TcpListener::bind("127.0.0.1:0").unwrap();
		let port = listener.local_addr().unwrap().port();
		assert!(!is_port_free(port));
	}

	#[test]
	fn explicit_browser_path_must_exist() {
		let tmp = TempDir::new().unwrap();
		let fake = tmp.path().join("chrome");
		std::fs::write(&fake, "").unwrap();

		assert_eq!(find_browser(Some(fake.as_path())), Some(fake.clone()));
		assert_eq!(find_browser(Some(tmp.path().join("missing-browser-binary").as_path())), None);
	}

	#[tokio::test]
	async fn occupied_non_debugging_port_is_rejected() {
		let listener = TcpListener::bind("127.0.0.1:0").unwrap();
		let port = listener.local_addr().unwrap().port();
		// Accepts connections but never speaks HTTP.
		let result = check_port("127.0.0.1", port).await;
		assert!(matches!(result, Err(RelayError::PortInUse { port: p }) if p == port));
	}
}
