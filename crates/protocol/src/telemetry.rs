//! Telemetry events raised inside the front-end.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Histogram action whose code is a duration rather than an enum value.
pub const INSPECT_ELEMENT_ACTION: &str = "DevTools.InspectElement";

/// Upper bound, in characters, on stacks attached to error reports.
pub const STACK_LIMIT: usize = 30;

/// Telemetry event as carried by `telemetry:`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
	pub name: String,
	#[serde(default)]
	pub properties: Map<String, Value>,
	#[serde(default)]
	pub metrics: BTreeMap<String, f64>,
}

impl TelemetryEvent {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			properties: Map::new(),
			metrics: BTreeMap::new(),
		}
	}

	/// Builds the event for a front-end `recordEnumeratedHistogram` call.
	///
	/// `DevTools.InspectElement` reports a duration, so its code lands in
	/// `metrics`; every other action code is a property.
	pub fn histogram(action: &str, code: f64) -> Self {
		let mut event = Self::new(format!("devtools/{action}"));
		if action == INSPECT_ELEMENT_ACTION {
			event.metrics.insert(format!("{action}.duration"), code);
		} else {
			event.properties.insert(format!("{action}.actionCode"), Value::from(code));
		}
		event
	}

	/// Builds the report for an uncaught error or unhandled rejection.
	pub fn error_report(kind: &str, stack: &str) -> Self {
		let mut event = Self::new(format!("devtools/{kind}"));
		let truncated: String = stack.chars().take(STACK_LIMIT).collect();
		event.properties.insert("stack".into(), Value::String(truncated));
		event
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn histogram_uses_properties_for_action_codes() {
		let event = TelemetryEvent::histogram("DevTools.PanelShown", 3.0);
		assert_eq!(event.name, "devtools/DevTools.PanelShown");
		assert_eq!(event.properties["DevTools.PanelShown.actionCode"], Value::from(3.0));
		assert!(event.metrics.is_empty());
	}

	#[test]
	fn inspect_element_is_a_duration_metric() {
		let event = TelemetryEvent::histogram(INSPECT_ELEMENT_ACTION, 120.0);
		assert_eq!(event.metrics["DevTools.InspectElement.duration"], 120.0);
		assert!(event.properties.is_empty());
	}

	#[test]
	fn error_report_truncates_stack() {
		let stack = "TypeError: x is undefined\n    at Foo (inspector.js:1:1)";
		let event = TelemetryEvent::error_report("error", stack);
		assert_eq!(event.name, "devtools/error");
		let reported = event.properties["stack"].as_str().unwrap();
		assert_eq!(reported.chars().count(), STACK_LIMIT);
		assert!(stack.starts_with(reported));
	}

	#[test]
	fn missing_properties_and_metrics_default_to_empty() {
		let event: TelemetryEvent = serde_json::from_str(r#"{"name":"x"}"#).unwrap();
		assert_eq!(event, TelemetryEvent::new("x"));
	}
}
