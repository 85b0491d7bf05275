//! Host server: serves the container page, the bridge, the front-end, and the
//! `/surface` channel the relay session talks through.

pub mod assets;
pub mod surface;

use std::future::Future;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use axum::Router;
use axum::extract::{Path as UrlPath, State, WebSocketUpgrade};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use devtools_relay_runtime::SessionManager;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{RelayError, Result};
use crate::state::SessionStateStore;

pub use surface::WebSocketSurface;

/// What a host server instance serves.
#[derive(Debug, Clone)]
pub struct HostOptions {
	pub front_end_dir: PathBuf,
	pub bridge_dir: PathBuf,
	pub container: String,
	/// Debugger socket URL every session of this server attaches to.
	pub target_url: String,
	/// Address the listener is bound to. Only pages served from it may open `/surface`.
	pub listen: SocketAddr,
	/// Started by `resume`: the first container restores the persisted session.
	pub restored: bool,
}

pub struct HostState {
	pub manager: SessionManager,
	pub sessions: SessionStateStore,
	pub target_url: String,
	pub container: String,
	front_end_dir: PathBuf,
	bridge_dir: PathBuf,
	origins: Vec<String>,
	restore_pending: AtomicBool,
	shutdown_tx: watch::Sender<bool>,
	shutdown: watch::Receiver<bool>,
}

pub type SharedState = Arc<HostState>;

impl HostState {
	pub fn new(options: HostOptions, manager: SessionManager, sessions: SessionStateStore) -> SharedState {
		let (shutdown_tx, shutdown) = watch::channel(false);
		Arc::new(Self {
			manager,
			sessions,
			target_url: options.target_url,
			container: options.container,
			front_end_dir: options.front_end_dir,
			bridge_dir: options.bridge_dir,
			origins: allowed_origins(options.listen),
			restore_pending: AtomicBool::new(options.restored),
			shutdown_tx,
			shutdown,
		})
	}

	/// Tells every container link to stop. Persisted session state is kept.
	pub fn begin_shutdown(&self) {
		self.shutdown_tx.send_replace(true);
	}

	/// True for the first container of a restored server, false afterwards.
	pub(crate) fn take_restore(&self) -> bool {
		self.restore_pending.swap(false, Ordering::SeqCst)
	}

	fn origin_allowed(&self, headers: &HeaderMap) -> bool {
		headers
			.get(header::ORIGIN)
			.and_then(|origin| origin.to_str().ok())
			.is_some_and(|origin| self.origins.iter().any(|allowed| allowed == origin))
	}
}

/// Origins the container page can have when served from `listen`.
///
/// Loopback and wildcard binds also accept the usual loopback spellings.
pub fn allowed_origins(listen: SocketAddr) -> Vec<String> {
	let port = listen.port();
	let mut origins = vec![format!("http://{listen}")];
	if listen.ip().is_loopback() || listen.ip().is_unspecified() {
		for host in ["localhost", "127.0.0.1", "[::1]"] {
			let origin = format!("http://{host}:{port}");
			if !origins.contains(&origin) {
				origins.push(origin);
			}
		}
	}
	origins
}

pub fn router(state: SharedState) -> Router {
	Router::new()
		.route("/", get(container_page))
		.route(assets::SHIM_LOADER_PATH, get(shim_loader))
		.route("/bridge/{*file}", get(bridge_file))
		.route("/front_end/{*file}", get(front_end_file))
		.route("/surface", get(surface_upgrade))
		.with_state(state)
}

async fn surface_upgrade(ws: WebSocketUpgrade, headers: HeaderMap, State(state): State<SharedState>) -> Response {
	if !state.origin_allowed(&headers) {
		let origin = headers.get(header::ORIGIN).and_then(|o| o.to_str().ok()).unwrap_or("<none>");
		warn!(origin, "refusing container link from a foreign origin");
		return StatusCode::FORBIDDEN.into_response();
	}
	ws.on_upgrade(|socket| surface::handle_surface_socket(socket, state))
}

pub async fn bind(addr: SocketAddr) -> Result<TcpListener> {
	TcpListener::bind(addr).await.map_err(|err| match err.kind() {
		ErrorKind::AddrInUse => RelayError::InvalidInput(format!("listen address {addr} is already in use")),
		_ => RelayError::Io(err),
	})
}

/// Serves until `shutdown` resolves, then stops every container link.
pub async fn serve(listener: TcpListener, state: SharedState, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
	let addr = listener.local_addr()?;
	info!(%addr, container = %state.container, target = %state.target_url, "host server listening");

	let app = router(Arc::clone(&state));
	let stopping = Arc::clone(&state);
	axum::serve(listener, app.into_make_service())
		.with_graceful_shutdown(async move {
			shutdown.await;
			info!("shutting down host server");
			stopping.begin_shutdown();
		})
		.await
		.context("host server error")?;

	if let Some(handle) = state.manager.current() {
		handle.disposed().await;
	}
	Ok(())
}

/// Resolves on Ctrl-C.
pub async fn ctrl_c() {
	if let Err(err) = tokio::signal::ctrl_c().await {
		warn!(error = %err, "failed to listen for ctrl-c");
		std::future::pending::<()>().await;
	}
}

async fn container_page(State(state): State<SharedState>) -> Html<String> {
	Html(assets::container_html(&state.container))
}

async fn shim_loader() -> Response {
	(
		[(header::CONTENT_TYPE, "text/javascript; charset=utf-8")],
		assets::shim_loader_js(),
	)
		.into_response()
}

async fn bridge_file(State(state): State<SharedState>, UrlPath(file): UrlPath<String>) -> Response {
	serve_file(&state.bridge_dir, &file).await
}

async fn front_end_file(State(state): State<SharedState>, UrlPath(file): UrlPath<String>) -> Response {
	if file == "inspector.html" {
		return match read_asset(&state.front_end_dir, &file).await {
			Ok((_, bytes)) => Html(assets::patch_inspector_html(&String::from_utf8_lossy(&bytes))).into_response(),
			Err(status) => status.into_response(),
		};
	}
	serve_file(&state.front_end_dir, &file).await
}

async fn serve_file(root: &Path, file: &str) -> Response {
	match read_asset(root, file).await {
		Ok((path, bytes)) => ([(header::CONTENT_TYPE, assets::content_type(&path))], bytes).into_response(),
		Err(status) => status.into_response(),
	}
}

async fn read_asset(root: &Path, file: &str) -> std::result::Result<(PathBuf, Vec<u8>), StatusCode> {
	let path = assets::resolve_asset(root, file).ok_or(StatusCode::BAD_REQUEST)?;
	match tokio::fs::read(&path).await {
		Ok(bytes) => Ok((path, bytes)),
		Err(err) if err.kind() == ErrorKind::NotFound => {
			debug!(path = %path.display(), "asset not found");
			Err(StatusCode::NOT_FOUND)
		}
		Err(err) => {
			warn!(path = %path.display(), error = %err, "failed to read asset");
			Err(StatusCode::INTERNAL_SERVER_ERROR)
		}
	}
}
