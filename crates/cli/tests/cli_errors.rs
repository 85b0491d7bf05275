//! Error envelopes from the `devtools-relay` binary.

use std::path::Path;
use std::process::Command;

use serde_json::Value;
use tempfile::TempDir;

fn run(cwd: &Path, args: &[&str]) -> (bool, Value, String) {
	let output = Command::new(env!("CARGO_BIN_EXE_devtools-relay"))
		.current_dir(cwd)
		.args(args)
		.output()
		.expect("failed to execute devtools-relay");

	let stdout = String::from_utf8_lossy(&output.stdout).to_string();
	let stderr = String::from_utf8_lossy(&output.stderr).to_string();
	let parsed = serde_json::from_str(&stdout).unwrap_or(Value::Null);
	(output.status.success(), parsed, stderr)
}

fn closed_port() -> String {
	let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
	listener.local_addr().unwrap().port().to_string()
}

#[test]
fn resume_without_persisted_session() {
	let tmp = TempDir::new().unwrap();
	let state = tmp.path().join("state");
	let (ok, json, stderr) = run(
		tmp.path(),
		&["-f", "json", "--state-dir", state.to_str().unwrap(), "resume", "--container", "panel"],
	);

	assert!(!ok);
	assert_eq!(json["ok"], false);
	assert_eq!(json["command"], "resume");
	assert_eq!(json["error"]["code"], "SESSION_ERROR");
	assert_eq!(json["error"]["details"]["container"], "panel");
	assert!(stderr.contains("Error [SESSION_ERROR]"));
}

#[test]
fn targets_on_dead_endpoint_is_discovery_failed() {
	let tmp = TempDir::new().unwrap();
	let state = tmp.path().join("state");
	let port = closed_port();
	let (ok, json, _) = run(
		tmp.path(),
		&["-f", "json", "--state-dir", state.to_str().unwrap(), "targets", "--host", "127.0.0.1", "--port", &port],
	);

	assert!(!ok);
	assert_eq!(json["command"], "targets");
	assert_eq!(json["error"]["code"], "DISCOVERY_FAILED");
}

#[test]
fn project_config_feeds_settings() {
	let tmp = TempDir::new().unwrap();
	let state = tmp.path().join("state");
	std::fs::write(tmp.path().join(".devtools-relay.json"), r#"{"listen":"not-an-address"}"#).unwrap();

	let (ok, json, _) = run(
		tmp.path(),
		&["-f", "json", "--state-dir", state.to_str().unwrap(), "resume"],
	);

	assert!(!ok);
	assert_eq!(json["error"]["code"], "INVALID_INPUT");
}

#[test]
fn text_format_keeps_stdout_clean_on_error() {
	let tmp = TempDir::new().unwrap();
	let state = tmp.path().join("state");
	let output = Command::new(env!("CARGO_BIN_EXE_devtools-relay"))
		.current_dir(tmp.path())
		.args(["--state-dir", state.to_str().unwrap(), "resume"])
		.output()
		.unwrap();

	assert!(!output.status.success());
	assert!(output.stdout.is_empty());
	assert!(String::from_utf8_lossy(&output.stderr).contains("no persisted session"));
}
