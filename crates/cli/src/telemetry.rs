use devtools_relay_protocol::TelemetryEvent;
use devtools_relay_runtime::TelemetrySink;
use tracing::info;

use crate::logging::TELEMETRY_TARGET;

/// Emits front-end telemetry as `info` events on `devtools_relay::telemetry`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
	fn record(&self, event: &TelemetryEvent) {
		let properties = serde_json::Value::Object(event.properties.clone());
		info!(
			target: TELEMETRY_TARGET,
			name = %event.name,
			properties = %properties,
			metrics = ?event.metrics,
			"front-end telemetry"
		);
	}
}
