use devtools_relay_runtime::StoreError;
use thiserror::Error;

use crate::output::{CommandError, ErrorCode};

pub type Result<T> = std::result::Result<T, RelayError>;

#[derive(Debug, Error)]
pub enum RelayError {
	/// The discovery endpoint was unreachable or answered with something that
	/// is not a JSON array of descriptors.
	#[error("target discovery failed: {0}")]
	Discovery(String),

	#[error("no target matches url: {url}")]
	TargetNotFound { url: String },

	/// The chosen descriptor has no `webSocketDebuggerUrl`, usually because
	/// another client is already attached to it.
	#[error("target has no debugger websocket: {title}")]
	TargetUnavailable { title: String },

	#[error("browser launch failed: {0}")]
	Launch(String),

	#[error("port {port} is taken by a process that is not a debugging endpoint")]
	PortInUse { port: u16 },

	#[error("no persisted session for container `{container}`")]
	NoPersistedSession { container: String },

	#[error("invalid input: {0}")]
	InvalidInput(String),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),

	#[error(transparent)]
	Store(#[from] StoreError),

	#[error(transparent)]
	Anyhow(#[from] anyhow::Error),
}

impl RelayError {
	/// Convert this error to a CommandError for structured output
	pub fn to_command_error(&self) -> CommandError {
		let (code, message, details) = match self {
			RelayError::Discovery(msg) => (ErrorCode::DiscoveryFailed, msg.clone(), None),
			RelayError::TargetNotFound { url } => (
				ErrorCode::TargetNotFound,
				format!("No debuggable target has url {url}. Run `devtools-relay targets` to list them."),
				Some(serde_json::json!({ "url": url })),
			),
			RelayError::TargetUnavailable { title } => (
				ErrorCode::TargetUnavailable,
				format!("Target \"{title}\" has no debugger websocket. Close other debuggers attached to it and retry."),
				Some(serde_json::json!({ "title": title })),
			),
			RelayError::Launch(msg) => (ErrorCode::LaunchFailed, msg.clone(), None),
			RelayError::PortInUse { port } => (
				ErrorCode::PortInUse,
				self.to_string(),
				Some(serde_json::json!({ "port": port })),
			),
			RelayError::NoPersistedSession { container } => (
				ErrorCode::SessionError,
				self.to_string(),
				Some(serde_json::json!({ "container": container })),
			),
			RelayError::InvalidInput(msg) => (ErrorCode::InvalidInput, msg.clone(), None),
			RelayError::Io(err) => (ErrorCode::IoError, err.to_string(), None),
			RelayError::Json(err) => (ErrorCode::InternalError, format!("JSON error: {err}"), None),
			RelayError::Store(err) => (ErrorCode::IoError, format!("state storage: {err}"), None),
			RelayError::Anyhow(err) => (ErrorCode::InternalError, format!("{err:#}"), None),
		};

		CommandError {
			code,
			message,
			details,
		}
	}
}
