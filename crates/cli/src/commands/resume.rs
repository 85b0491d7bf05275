//! `resume`: serve the target a container was showing when the host stopped.

use tracing::info;

use crate::config::Settings;
use crate::error::{RelayError, Result};
use crate::output::OutputFormat;
use crate::state::{SessionStateStore, StatePaths};

pub async fn execute(paths: &StatePaths, settings: &Settings, format: OutputFormat) -> Result<()> {
	let persisted = SessionStateStore::new(&paths.sessions)
		.get(&settings.container)?
		.ok_or_else(|| RelayError::NoPersistedSession {
			container: settings.container.clone(),
		})?;
	info!(container = %settings.container, target = %persisted.target_url, "resuming persisted session");

	super::serve_target(paths, settings, persisted.target_url, None, true, "resume", format).await
}
