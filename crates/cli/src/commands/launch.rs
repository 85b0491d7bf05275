//! `launch`: start a debuggable browser, optionally attaching to it.

use std::path::Path;
use std::time::Duration;

use tracing::{debug, info};

use crate::config::Settings;
use crate::discovery;
use crate::error::{RelayError, Result};
use crate::launch::{self, LaunchTarget, PortStatus};
use crate::output::{LaunchData, OutputFormat, ResultBuilder, print_result};
use crate::state::StatePaths;

/// Endpoint polls while the browser boots.
const ENDPOINT_ATTEMPTS: u32 = 20;
/// Target-list polls while the launched page appears.
const PAGE_ATTEMPTS: u32 = 10;
const POLL_DELAY: Duration = Duration::from_millis(250);

pub struct LaunchOptions {
	pub target: LaunchTarget,
	pub attach: bool,
}

pub async fn execute(
	paths: &StatePaths,
	settings: &Settings,
	project_root: &Path,
	options: LaunchOptions,
	format: OutputFormat,
) -> Result<()> {
	let url = launch::launch_url(&options.target, project_root)?;

	let pid = match launch::check_port(&settings.host, settings.port).await? {
		PortStatus::Debuggable => None,
		PortStatus::Free => {
			let browser = launch::find_browser(settings.browser_path.as_deref()).ok_or_else(|| {
				RelayError::Launch("no Chromium-family browser found; pass --browser-path".into())
			})?;
			Some(launch::spawn_browser(&browser, settings.port, &url)?)
		}
	};

	if !options.attach {
		let data = LaunchData {
			url,
			port: settings.port,
			pid,
			reused: pid.is_none(),
		};
		print_result(&ResultBuilder::new("launch").data(data).build(), format);
		return Ok(());
	}

	let socket_url = wait_for_page(settings, &url).await?;
	info!(url = %url, socket = %socket_url, "launched page is debuggable");
	super::serve_target(paths, settings, socket_url, pid, false, "launch", format).await
}

/// Polls until a target for `url` shows up with a debugger socket.
async fn wait_for_page(settings: &Settings, url: &str) -> Result<String> {
	let mut last = None;
	for attempt in 1..=PAGE_ATTEMPTS {
		let targets =
			discovery::wait_for_targets(&settings.host, settings.port, ENDPOINT_ATTEMPTS, POLL_DELAY).await?;
		match discovery::select_by_url(&targets, url).and_then(discovery::socket_url) {
			Ok(socket_url) => return Ok(socket_url),
			Err(err) => {
				debug!(attempt, error = %err, "launched page not listed yet");
				last = Some(err);
			}
		}
		tokio::time::sleep(POLL_DELAY).await;
	}
	Err(last.unwrap_or_else(|| RelayError::TargetNotFound { url: url.to_string() }))
}
