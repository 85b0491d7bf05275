//! `attach`: pick a target and serve the front-end for it.

use std::io;

use devtools_relay_protocol::TargetDescriptor;
use tracing::info;

use crate::config::Settings;
use crate::discovery;
use crate::error::Result;
use crate::output::OutputFormat;
use crate::state::StatePaths;

pub async fn execute(paths: &StatePaths, settings: &Settings, url: Option<&str>, format: OutputFormat) -> Result<()> {
	let targets = discovery::fetch_targets(&settings.host, settings.port).await?;
	let target = match url {
		Some(url) => discovery::select_by_url(&targets, url)?,
		None => prompt(&targets)?,
	};
	let socket_url = discovery::socket_url(target)?;
	info!(title = %target.title, url = %target.url, socket = %socket_url, "attaching to target");

	super::serve_target(paths, settings, socket_url, None, false, "attach", format).await
}

/// Interactive choice on stderr/stdin so stdout stays machine-readable.
fn prompt(targets: &[TargetDescriptor]) -> Result<&TargetDescriptor> {
	let stdin = io::stdin();
	discovery::choose_target(targets, stdin.lock(), io::stderr())
}
