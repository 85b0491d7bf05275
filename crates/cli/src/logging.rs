use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Target for front-end telemetry events.
pub const TELEMETRY_TARGET: &str = "devtools_relay::telemetry";

pub fn init_logging(verbosity: u8) {
	// 0 = warnings, plus session lifecycle from the relay itself
	// 1 (-v) = info everywhere
	// 2+ (-vv) = debug, including per-frame socket traffic
	let filter = match verbosity {
		0 => "warn,devtools_relay=info,devtools_relay_runtime=info",
		1 => "info",
		_ => "debug",
	};

	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

	let stderr = std::io::stderr.with_max_level(tracing::Level::TRACE);

	let _ = tracing_subscriber::fmt()
		.with_env_filter(env_filter)
		.with_writer(stderr)
		.with_target(true)
		.with_level(true)
		.compact()
		.try_init();
}
