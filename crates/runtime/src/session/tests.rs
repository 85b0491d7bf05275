use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use devtools_relay_protocol::{PreferenceUpdate, Preferences, TelemetryEvent};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::*;
use crate::error::{ProxyFetchError, StoreError, SurfaceClosed};
use crate::services::{PreferenceStore, ResourceFetcher, TelemetrySink};
use crate::socket::SocketEvents;

#[derive(Default)]
struct RecordingSurface {
	posted: Mutex<Vec<String>>,
	disposed: Mutex<usize>,
	revealed: Mutex<usize>,
}

impl RecordingSurface {
	fn posted(&self) -> Vec<String> {
		self.posted.lock().clone()
	}
}

impl DisplaySurface for RecordingSurface {
	fn post_message(&self, text: String) -> Result<(), SurfaceClosed> {
		self.posted.lock().push(text);
		Ok(())
	}

	fn reveal(&self) {
		*self.revealed.lock() += 1;
	}

	fn dispose(&self) {
		*self.disposed.lock() += 1;
	}
}

#[derive(Default)]
struct SocketLog {
	sent: Vec<String>,
	closed: bool,
	fail_sends: bool,
}

struct FakeSocket {
	log: Arc<Mutex<SocketLog>>,
}

impl TargetSocket for FakeSocket {
	fn send(&mut self, frame: String) -> Result<(), SocketError> {
		let mut log = self.log.lock();
		if log.fail_sends {
			return Err(SocketError("broken pipe".into()));
		}
		log.sent.push(frame);
		Ok(())
	}

	fn close(&mut self) {
		self.log.lock().closed = true;
	}
}

#[derive(Default)]
struct FakeConnector {
	sockets: Mutex<Vec<(String, SocketEvents, Arc<Mutex<SocketLog>>)>>,
}

impl FakeConnector {
	fn count(&self) -> usize {
		self.sockets.lock().len()
	}

	fn log(&self, index: usize) -> Arc<Mutex<SocketLog>> {
		Arc::clone(&self.sockets.lock()[index].2)
	}

	fn events(&self, index: usize) -> SocketEvents {
		self.sockets.lock()[index].1.clone()
	}

	fn sent(&self, index: usize) -> Vec<String> {
		self.log(index).lock().sent.clone()
	}
}

impl SocketConnector for FakeConnector {
	fn connect(&self, url: &str, events: SocketEvents) -> Box<dyn TargetSocket> {
		let log = Arc::new(Mutex::new(SocketLog::default()));
		self.sockets.lock().push((url.to_string(), events, Arc::clone(&log)));
		Box::new(FakeSocket { log })
	}
}

#[derive(Default)]
struct MemoryPreferences {
	prefs: Mutex<Preferences>,
}

impl PreferenceStore for MemoryPreferences {
	fn load(&self) -> Result<Preferences, StoreError> {
		Ok(self.prefs.lock().clone())
	}

	fn store(&self, update: &PreferenceUpdate) -> Result<(), StoreError> {
		update.apply(&mut self.prefs.lock());
		Ok(())
	}
}

#[derive(Default)]
struct RecordingTelemetry {
	events: Mutex<Vec<TelemetryEvent>>,
}

impl TelemetrySink for RecordingTelemetry {
	fn record(&self, event: &TelemetryEvent) {
		self.events.lock().push(event.clone());
	}
}

#[derive(Default)]
struct StubFetcher {
	bodies: HashMap<String, String>,
}

#[async_trait]
impl ResourceFetcher for StubFetcher {
	async fn fetch(&self, url: &str) -> Result<String, ProxyFetchError> {
		self.bodies.get(url).cloned().ok_or_else(|| ProxyFetchError {
			url: url.to_string(),
			reason: "connection refused".into(),
		})
	}
}

struct Harness {
	session: RelaySession,
	surface: Arc<RecordingSurface>,
	connector: Arc<FakeConnector>,
	preferences: Arc<MemoryPreferences>,
	telemetry: Arc<RecordingTelemetry>,
	rx: mpsc::UnboundedReceiver<SessionEvent>,
	_tx: mpsc::UnboundedSender<SessionEvent>,
}

const TARGET: &str = "ws://10.0.0.5:9230/devtools/page/ABC";

fn harness() -> Harness {
	harness_with_fetcher(StubFetcher::default())
}

fn harness_with_fetcher(fetcher: StubFetcher) -> Harness {
	let surface = Arc::new(RecordingSurface::default());
	let connector = Arc::new(FakeConnector::default());
	let preferences = Arc::new(MemoryPreferences::default());
	let telemetry = Arc::new(RecordingTelemetry::default());
	let services = SessionServices {
		preferences: preferences.clone(),
		telemetry: telemetry.clone(),
		fetcher: Arc::new(fetcher),
	};
	let (tx, rx) = mpsc::unbounded_channel();
	let session = RelaySession::new(1, TARGET, surface.clone(), connector.clone(), services, tx.downgrade());
	Harness {
		session,
		surface,
		connector,
		preferences,
		telemetry,
		rx,
		_tx: tx,
	}
}

impl Harness {
	fn inbound(&mut self, text: &str) {
		self.session.handle(SessionEvent::Inbound(text.to_string()));
	}

	/// Emits through the socket's own sink and feeds whatever got through.
	fn socket_event(&mut self, index: usize, event: SocketEvent) {
		self.connector.events(index).emit(event);
		while let Ok(event) = self.rx.try_recv() {
			self.session.handle(event);
		}
	}
}

#[test]
fn first_frame_opens_socket_to_target() {
	let mut h = harness();
	assert_eq!(h.session.state(), SessionState::Idle);

	h.inbound(r#"{"id":1,"method":"Page.enable"}"#);

	assert_eq!(h.connector.count(), 1);
	assert_eq!(h.connector.sockets.lock()[0].0, TARGET);
	assert_eq!(h.session.state(), SessionState::Connecting);
	assert!(h.connector.sent(0).is_empty());
}

#[test]
fn frames_queued_while_connecting_flush_in_order() {
	let mut h = harness();
	let frames: Vec<String> = (1..=5).map(|i| format!(r#"{{"id":{i},"method":"M{i}"}}"#)).collect();
	for frame in &frames {
		h.inbound(frame);
	}
	assert_eq!(h.connector.count(), 1);

	h.socket_event(0, SocketEvent::Open);
	h.inbound(r#"{"id":6,"method":"M6"}"#);

	let mut expected = frames.clone();
	expected.push(r#"{"id":6,"method":"M6"}"#.to_string());
	assert_eq!(h.connector.sent(0), expected);
	assert_eq!(h.session.state(), SessionState::Connected);
	assert_eq!(h.surface.posted(), ["open"]);
}

#[test]
fn target_messages_reach_surface_verbatim() {
	let mut h = harness();
	h.inbound("{}");
	h.socket_event(0, SocketEvent::Open);

	let payload = r#"{"method":"Debugger.paused","params":{"reason":"other"}}"#;
	h.socket_event(0, SocketEvent::Message(payload.to_string()));

	assert_eq!(h.surface.posted(), ["open", payload]);
}

#[test]
fn socket_error_is_reported_without_closing() {
	let mut h = harness();
	h.inbound("{}");
	h.socket_event(0, SocketEvent::Open);
	h.socket_event(0, SocketEvent::Error("reset".into()));

	assert_eq!(h.surface.posted(), ["open", "error"]);
	assert_eq!(h.session.state(), SessionState::Connected);
	assert!(!h.connector.log(0).lock().closed);
}

#[test]
fn close_releases_socket_and_next_frame_builds_a_new_one() {
	let mut h = harness();
	h.inbound("{}");
	h.socket_event(0, SocketEvent::Open);
	h.socket_event(0, SocketEvent::Close);

	assert_eq!(h.session.state(), SessionState::Closed);
	assert_eq!(h.surface.posted(), ["open", "close"]);

	h.inbound(r#"{"id":2}"#);
	assert_eq!(h.connector.count(), 2);
	assert_eq!(h.session.state(), SessionState::Connecting);
}

#[test]
fn ready_detaches_socket_and_returns_to_idle() {
	let mut h = harness();
	h.inbound(r#"{"id":1}"#);
	h.socket_event(0, SocketEvent::Open);
	let old_events = h.connector.events(0);

	h.inbound("ready");

	assert_eq!(h.session.state(), SessionState::Idle);
	assert!(h.connector.log(0).lock().closed);
	assert!(!old_events.is_attached());

	// The old socket's close never reaches the surface.
	assert!(!old_events.emit(SocketEvent::Close));
	assert_eq!(h.surface.posted(), ["open"]);

	h.inbound(r#"{"id":2}"#);
	assert_eq!(h.connector.count(), 2);
	h.socket_event(1, SocketEvent::Open);
	assert_eq!(h.connector.sent(1), [r#"{"id":2}"#]);
	assert_eq!(h.connector.sent(0), [r#"{"id":1}"#]);
}

#[test]
fn late_events_from_a_replaced_socket_are_ignored() {
	let mut h = harness();
	h.inbound("{}");
	let stale_generation = h.session.generation;
	h.inbound("ready");
	h.inbound("{}");

	h.session.handle(SessionEvent::Socket {
		generation: stale_generation,
		event: SocketEvent::Open,
	});

	assert_eq!(h.session.state(), SessionState::Connecting);
	assert!(h.surface.posted().is_empty());
}

#[test]
fn control_messages_never_reach_the_socket() {
	let mut h = harness();
	h.inbound("{}");
	h.socket_event(0, SocketEvent::Open);

	h.inbound(r#"telemetry:{"name":"x"}"#);
	h.inbound(r#"setState:{"name":"uiTheme","value":"dark"}"#);
	h.inbound("getState:");
	h.inbound("setState:garbage");

	assert_eq!(h.connector.sent(0), ["{}"]);
	assert_eq!(h.telemetry.events.lock()[0].name, "x");
}

#[test]
fn protocol_frames_are_never_intercepted() {
	let mut h = harness();
	h.inbound(r#"{"id":1,"method":"Page.enable"}"#);
	h.socket_event(0, SocketEvent::Open);

	assert_eq!(h.connector.sent(0), [r#"{"id":1,"method":"Page.enable"}"#]);
	assert!(h.telemetry.events.lock().is_empty());
}

#[test]
fn set_state_merges_and_get_state_answers_with_all_keys() {
	let mut h = harness();
	h.preferences.prefs.lock().insert("uiTheme".into(), "dark".into());

	h.inbound(r#"setState:{"name":"screencastEnabled","value":"true"}"#);
	h.inbound("getState:");

	assert_eq!(
		h.surface.posted(),
		[r#"preferences:{"screencastEnabled":"true","uiTheme":"dark"}"#]
	);
	assert_eq!(h.connector.count(), 0);
}

#[tokio::test]
async fn dispose_is_idempotent() {
	let mut h = harness();
	h.inbound("{}");
	h.socket_event(0, SocketEvent::Open);

	let pending = tokio::spawn(std::future::pending::<()>());
	h.session.disposables.push(Disposable::task(pending.abort_handle()));

	assert!(!h.session.handle(SessionEvent::Dispose));
	h.session.dispose();

	assert_eq!(h.session.state(), SessionState::Disposed);
	assert_eq!(*h.surface.disposed.lock(), 1);
	assert!(pending.await.unwrap_err().is_cancelled());
	assert!(h.connector.log(0).lock().closed);
	assert_eq!(h.surface.posted(), ["open"]);
}

#[test]
fn events_after_dispose_are_ignored() {
	let mut h = harness();
	h.session.dispose();

	assert!(!h.session.handle(SessionEvent::Inbound("{}".into())));
	assert!(!h.session.handle(SessionEvent::Reveal));
	assert_eq!(h.connector.count(), 0);
	assert_eq!(*h.surface.revealed.lock(), 0);
}

#[test]
fn failed_delivery_closes_the_link() {
	let mut h = harness();
	h.inbound(r#"{"id":1}"#);
	h.inbound(r#"{"id":2}"#);
	h.connector.log(0).lock().fail_sends = true;

	h.socket_event(0, SocketEvent::Open);

	assert_eq!(h.session.state(), SessionState::Closed);
	assert_eq!(h.surface.posted(), ["close"]);
	assert!(h.connector.log(0).lock().closed);
}

#[test]
fn reveal_reaches_surface() {
	let mut h = harness();
	h.session.handle(SessionEvent::Reveal);
	assert_eq!(*h.surface.revealed.lock(), 1);
}

#[tokio::test]
async fn get_url_replies_with_fetched_body() {
	let mut bodies = HashMap::new();
	bodies.insert("https://a.test/app.js.map".to_string(), "{\"version\":3}".to_string());
	let mut h = harness_with_fetcher(StubFetcher { bodies });

	h.inbound(r#"getUrl:{"id":0,"url":"https://a.test/app.js.map"}"#);
	h.inbound(r#"getUrl:{"id":1,"url":"https://b.test/missing.js"}"#);

	for _ in 0..100 {
		if h.surface.posted().len() == 2 {
			break;
		}
		tokio::task::yield_now().await;
	}

	let mut posted = h.surface.posted();
	posted.sort();
	assert_eq!(
		posted,
		[
			r#"setUrl:{"id":0,"content":"{\"version\":3}"}"#,
			r#"setUrl:{"id":1,"content":""}"#,
		]
	);
	assert_eq!(h.connector.count(), 0);
}

#[tokio::test]
async fn spawned_session_runs_until_disposed() {
	let surface = Arc::new(RecordingSurface::default());
	let connector = Arc::new(FakeConnector::default());
	let services = SessionServices {
		preferences: Arc::new(MemoryPreferences::default()),
		telemetry: Arc::new(RecordingTelemetry::default()),
		fetcher: Arc::new(StubFetcher::default()),
	};
	let handle = RelaySession::spawn(7, TARGET, surface.clone(), connector.clone(), services);

	assert!(handle.post_message("{}"));
	wait_for(&handle, SessionState::Connecting).await;
	connector.events(0).emit(SocketEvent::Open);
	wait_for(&handle, SessionState::Connected).await;
	assert_eq!(connector.sent(0), ["{}"]);

	handle.dispose();
	handle.disposed().await;
	assert!(handle.is_disposed());
	assert_eq!(*surface.disposed.lock(), 1);
}

async fn wait_for(handle: &SessionHandle, target: SessionState) {
	let mut state = handle.state.clone();
	let _ = state.wait_for(|s| *s == target).await;
}
