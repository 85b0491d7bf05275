//! `targets`: list what the discovery endpoint reports.

use devtools_relay_protocol::TargetDescriptor;

use crate::config::Settings;
use crate::discovery;
use crate::error::Result;
use crate::output::{OutputFormat, ResultBuilder, TargetsData, print_result};

pub async fn execute(settings: &Settings, format: OutputFormat) -> Result<()> {
	let targets = discovery::fetch_targets(&settings.host, settings.port).await?;

	let data = TargetsData {
		endpoint: super::endpoint_label(settings),
		targets: targets.iter().map(TargetDescriptor::pick).collect(),
	};
	print_result(&ResultBuilder::new("targets").data(data).build(), format);
	Ok(())
}
