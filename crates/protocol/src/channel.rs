//! Sub-protocol codec for the surface channel.
//!
//! A single text channel carries both opaque debugging-protocol frames and a
//! handful of control messages. Control messages are recognised by a fixed
//! literal prefix; anything else is protocol traffic and is relayed
//! byte-for-byte, never parsed.
//!
//! Front-end to host ([`ChannelMessage`]):
//!
//! | Text | Variant |
//! |---|---|
//! | `ready` | [`ChannelMessage::Ready`] |
//! | `telemetry:{json}` | [`ChannelMessage::Telemetry`] |
//! | `getState:` | [`ChannelMessage::GetState`] |
//! | `setState:{"name","value"}` | [`ChannelMessage::SetState`] |
//! | `getUrl:{"id","url"}` | [`ChannelMessage::GetUrl`] |
//! | anything else | [`ChannelMessage::ProtocolFrame`] |
//!
//! Host to front-end ([`HostMessage`]): `open`, `close`, `error`,
//! `preferences:{json}`, `setUrl:{"id","content"}`, or a protocol frame.

use serde::Serialize;
use thiserror::Error;

use crate::preferences::{PreferenceUpdate, Preferences};
use crate::resources::{UrlRequest, UrlResponse};
use crate::telemetry::TelemetryEvent;

pub const READY: &str = "ready";
pub const TELEMETRY_PREFIX: &str = "telemetry:";
pub const GET_STATE_PREFIX: &str = "getState:";
pub const SET_STATE_PREFIX: &str = "setState:";
pub const GET_URL_PREFIX: &str = "getUrl:";

pub const OPEN: &str = "open";
pub const CLOSE: &str = "close";
pub const ERROR: &str = "error";
pub const PREFERENCES_PREFIX: &str = "preferences:";
pub const SET_URL_PREFIX: &str = "setUrl:";

/// Which reserved message failed to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
	Telemetry,
	SetState,
	GetUrl,
	Preferences,
	SetUrl,
}

impl std::fmt::Display for ControlKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let prefix = match self {
			ControlKind::Telemetry => TELEMETRY_PREFIX,
			ControlKind::SetState => SET_STATE_PREFIX,
			ControlKind::GetUrl => GET_URL_PREFIX,
			ControlKind::Preferences => PREFERENCES_PREFIX,
			ControlKind::SetUrl => SET_URL_PREFIX,
		};
		f.write_str(prefix.trim_end_matches(':'))
	}
}

/// A reserved-prefix message whose payload is not the expected JSON.
///
/// Such messages are dropped by the receiver. They carry a reserved prefix, so
/// they are never mistaken for protocol traffic.
#[derive(Debug, Error)]
#[error("malformed `{kind}` control message: {source}")]
pub struct DecodeError {
	pub kind: ControlKind,
	#[source]
	pub source: serde_json::Error,
}

/// Message sent by the front-end (through the display bridge) to the host.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelMessage {
	/// The front-end (re)loaded and wants a fresh target link.
	Ready,
	/// Telemetry event to hand to the telemetry collaborator verbatim.
	Telemetry(TelemetryEvent),
	/// Request for the full preference map, answered with [`HostMessage::Preferences`].
	GetState,
	/// Single-key preference write.
	SetState(PreferenceUpdate),
	/// Cross-origin load to perform on the front-end's behalf.
	GetUrl(UrlRequest),
	/// Debugging-protocol text, relayed unchanged.
	ProtocolFrame(String),
}

impl ChannelMessage {
	/// Decodes one channel text frame.
	///
	/// Prefixes are checked in a fixed priority order. Text that matches none
	/// of them becomes [`ChannelMessage::ProtocolFrame`] without inspection.
	pub fn decode(text: &str) -> Result<Self, DecodeError> {
		if text == READY {
			return Ok(Self::Ready);
		}
		if let Some(payload) = text.strip_prefix(TELEMETRY_PREFIX) {
			return parse(ControlKind::Telemetry, payload).map(Self::Telemetry);
		}
		if text.starts_with(GET_STATE_PREFIX) {
			return Ok(Self::GetState);
		}
		if let Some(payload) = text.strip_prefix(SET_STATE_PREFIX) {
			return parse(ControlKind::SetState, payload).map(Self::SetState);
		}
		if let Some(payload) = text.strip_prefix(GET_URL_PREFIX) {
			return parse(ControlKind::GetUrl, payload).map(Self::GetUrl);
		}
		Ok(Self::ProtocolFrame(text.to_string()))
	}

	/// Encodes this message into its channel text form.
	pub fn encode(&self) -> String {
		match self {
			Self::Ready => READY.to_string(),
			Self::Telemetry(event) => format!("{TELEMETRY_PREFIX}{}", to_json(event)),
			Self::GetState => GET_STATE_PREFIX.to_string(),
			Self::SetState(update) => format!("{SET_STATE_PREFIX}{}", to_json(update)),
			Self::GetUrl(request) => format!("{GET_URL_PREFIX}{}", to_json(request)),
			Self::ProtocolFrame(frame) => frame.clone(),
		}
	}
}

/// Message sent by the host to the front-end.
#[derive(Debug, Clone, PartialEq)]
pub enum HostMessage {
	/// The target socket finished its handshake.
	Open,
	/// The target link dropped.
	Close,
	/// The target socket reported an error. The link may still be alive.
	Error,
	/// Answer to [`ChannelMessage::GetState`].
	Preferences(Preferences),
	/// Answer to [`ChannelMessage::GetUrl`].
	SetUrl(UrlResponse),
	/// Debugging-protocol text from the target, unchanged.
	ProtocolFrame(String),
}

impl HostMessage {
	pub fn decode(text: &str) -> Result<Self, DecodeError> {
		match text {
			OPEN => return Ok(Self::Open),
			CLOSE => return Ok(Self::Close),
			ERROR => return Ok(Self::Error),
			_ => {}
		}
		if let Some(payload) = text.strip_prefix(PREFERENCES_PREFIX) {
			return parse(ControlKind::Preferences, payload).map(Self::Preferences);
		}
		if let Some(payload) = text.strip_prefix(SET_URL_PREFIX) {
			return parse(ControlKind::SetUrl, payload).map(Self::SetUrl);
		}
		Ok(Self::ProtocolFrame(text.to_string()))
	}

	pub fn encode(&self) -> String {
		match self {
			Self::Open => OPEN.to_string(),
			Self::Close => CLOSE.to_string(),
			Self::Error => ERROR.to_string(),
			Self::Preferences(prefs) => format!("{PREFERENCES_PREFIX}{}", to_json(prefs)),
			Self::SetUrl(response) => format!("{SET_URL_PREFIX}{}", to_json(response)),
			Self::ProtocolFrame(frame) => frame.clone(),
		}
	}
}

fn parse<T: serde::de::DeserializeOwned>(kind: ControlKind, payload: &str) -> Result<T, DecodeError> {
	serde_json::from_str(payload).map_err(|source| DecodeError { kind, source })
}

// Payload types are string/number maps, which always serialize.
fn to_json<T: Serialize>(value: &T) -> String {
	serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}
