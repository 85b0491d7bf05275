//! Container page, shim loader, and the `inspector.html` patch.
//!
//! The front-end is served as-is from its directory except for
//! `inspector.html`: its entry scripts must not run before the host shim has
//! replaced `WebSocket`, storage, and `InspectorFrontendHost`. The patch moves
//! the entry `<script src>` tags into a JSON manifest and loads the shim in
//! their place; the shim then loads the entries in order.

use std::borrow::Cow;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex_lite::{Captures, Regex};
use serde::Serialize;

/// wasm-bindgen JS glue of the bridge crate, relative to the bridge directory.
pub const BRIDGE_MODULE: &str = "devtools_relay_bridge.js";

/// Element id of the entry manifest injected into `inspector.html`.
pub const ENTRY_MANIFEST_ID: &str = "devtools-relay-entries";

pub const SHIM_LOADER_PATH: &str = "/bridge/shim.js";

const REFERRER_META: &str = r#"<meta name="referrer" content="no-referrer">"#;
const CSP_SCRIPT_SRC: &str = "script-src 'self'";
const WASM_EVAL: &str = "'wasm-unsafe-eval'";

static ENTRY_SCRIPT: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r#"<script([^>]*)\ssrc="([^"]+)"([^>]*)>\s*</script>\n?"#).expect("valid regex")
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryScript {
	pub src: String,
	pub module: bool,
}

/// Rewrites `inspector.html` so the shim runs before any front-end code.
pub fn patch_inspector_html(html: &str) -> String {
	let mut entries = Vec::new();
	let stripped = ENTRY_SCRIPT.replace_all(html, |caps: &Captures<'_>| {
		let attrs = format!("{}{}", &caps[1], &caps[3]);
		entries.push(EntryScript {
			src: caps[2].to_string(),
			module: attrs.contains(r#"type="module""#),
		});
		String::new()
	});

	let html = allow_wasm(&stripped);
	let injection = shim_injection(&entries);

	if html.contains(REFERRER_META) {
		html.replacen(REFERRER_META, &injection, 1)
	} else if let Some(index) = html.find("</head>") {
		let mut out = String::with_capacity(html.len() + injection.len());
		out.push_str(&html[..index]);
		out.push_str(&injection);
		out.push_str(&html[index..]);
		out
	} else {
		format!("{injection}{html}")
	}
}

/// Adds `'wasm-unsafe-eval'` to the `script-src 'self'` directive.
pub fn allow_wasm(html: &str) -> Cow<'_, str> {
	if !html.contains(CSP_SCRIPT_SRC) || html.contains(WASM_EVAL) {
		return Cow::Borrowed(html);
	}
	Cow::Owned(html.replacen(CSP_SCRIPT_SRC, &format!("{CSP_SCRIPT_SRC} {WASM_EVAL}"), 1))
}

fn shim_injection(entries: &[EntryScript]) -> String {
	// `</` inside the manifest would end the script element early.
	let manifest = serde_json::to_string(entries)
		.unwrap_or_else(|_| "[]".to_string())
		.replace("</", r"<\/");
	format!(
		"<script type=\"application/json\" id=\"{ENTRY_MANIFEST_ID}\">{manifest}</script>\
		 <script type=\"module\" src=\"{SHIM_LOADER_PATH}\"></script>"
	)
}

/// Module script installed in the front-end frame ahead of its entries.
pub fn shim_loader_js() -> String {
	format!(
		r#"import init, {{ install_host_shim, install_resource_loader, ToolsWebSocket }} from "/bridge/{BRIDGE_MODULE}";

await init();
install_host_shim(window, ToolsWebSocket);
install_resource_loader(window);

const manifest = document.getElementById("{ENTRY_MANIFEST_ID}");
const entries = manifest ? JSON.parse(manifest.textContent) : [];
for (const entry of entries) {{
	await new Promise((resolve, reject) => {{
		const script = document.createElement("script");
		if (entry.module) script.type = "module";
		script.src = entry.src;
		script.onload = resolve;
		script.onerror = () => reject(new Error(`failed to load ${{entry.src}}`));
		document.head.appendChild(script);
	}});
}}
"#
	)
}

/// Page hosting the front-end iframe and the display bridge.
pub fn container_html(container: &str) -> String {
	let title = escape_html(container);
	format!(
		r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
html, body {{ margin: 0; padding: 0; width: 100%; height: 100%; overflow: hidden; }}
#host {{ border: 0; width: 100%; height: 100%; display: block; }}
</style>
</head>
<body data-container="{title}">
<iframe id="host" src="/front_end/inspector.html"></iframe>
<script type="module">
import init, {{ start_display_bridge }} from "/bridge/{BRIDGE_MODULE}";
await init();
start_display_bridge("host");
</script>
</body>
</html>
"#
	)
}

fn escape_html(text: &str) -> String {
	text.replace('&', "&amp;")
		.replace('<', "&lt;")
		.replace('>', "&gt;")
		.replace('"', "&quot;")
}

/// Joins `relative` onto `root`, refusing anything that could leave it.
pub fn resolve_asset(root: &Path, relative: &str) -> Option<PathBuf> {
	let relative = Path::new(relative);
	if relative.as_os_str().is_empty() {
		return None;
	}
	relative
		.components()
		.all(|c| matches!(c, Component::Normal(_)))
		.then(|| root.join(relative))
}

pub fn content_type(path: &Path) -> &'static str {
	match path.extension().and_then(|e| e.to_str()).unwrap_or_default() {
		"html" => "text/html; charset=utf-8",
		"js" | "mjs" => "text/javascript; charset=utf-8",
		"css" => "text/css; charset=utf-8",
		"json" | "map" => "application/json",
		"wasm" => "application/wasm",
		"svg" => "image/svg+xml",
		"png" => "image/png",
		"avif" => "image/avif",
		"woff2" => "font/woff2",
		"txt" => "text/plain; charset=utf-8",
		_ => "application/octet-stream",
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const INSPECTOR: &str = r#"<!doctype html>
<html>
<head>
<meta http-equiv="Content-Security-Policy" content="object-src 'none'; script-src 'self' https://chrome-devtools-frontend.appspot.com">
<meta name="referrer" content="no-referrer">
<script src="Runtime.js"></script>
<script type="module" src="./entrypoints/inspector/inspector.js"></script>
</head>
<body class="undocked" id="-blink-dev-tools"></body>
</html>
"#;

	#[test]
	fn csp_gains_wasm_unsafe_eval() {
		let patched = patch_inspector_html(INSPECTOR);
		assert!(patched.contains("script-src 'self' 'wasm-unsafe-eval' https://chrome-devtools-frontend.appspot.com"));
		assert!(patched.contains("object-src 'none'"));
	}

	#[test]
	fn csp_patch_is_idempotent() {
		let once = allow_wasm("script-src 'self'").into_owned();
		assert_eq!(once, "script-src 'self' 'wasm-unsafe-eval'");
		assert_eq!(allow_wasm(&once), once);
		assert!(matches!(allow_wasm("<p>no csp</p>"), Cow::Borrowed(_)));
	}

	#[test]
	fn entries_move_into_manifest_in_order() {
		let patched = patch_inspector_html(INSPECTOR);

		assert!(!patched.contains(r#"<script src="Runtime.js"></script>"#));
		assert!(patched.contains(
			r#"<script type="application/json" id="devtools-relay-entries">[{"src":"Runtime.js","module":false},{"src":"./entrypoints/inspector/inspector.js","module":true}]</script>"#
		));
	}

	#[test]
	fn shim_replaces_referrer_meta() {
		let patched = patch_inspector_html(INSPECTOR);
		assert!(!patched.contains(REFERRER_META));
		assert!(patched.contains(r#"<script type="module" src="/bridge/shim.js"></script>"#));

		let shim_at = patched.find("/bridge/shim.js").unwrap();
		assert!(shim_at < patched.find("</head>").unwrap());
	}

	#[test]
	fn shim_goes_before_head_end_without_referrer_meta() {
		let html = "<html><head><script src=\"a.js\"></script></head><body></body></html>";
		let patched = patch_inspector_html(html);
		assert!(patched.starts_with("<html><head><script type=\"application/json\""));
		assert!(patched.ends_with("</script></head><body></body></html>"));
	}

	#[test]
	fn manifest_cannot_close_its_script() {
		let html = r#"<head><script src="x</script>.js"></script></head>"#;
		let patched = patch_inspector_html(html);
		assert!(!patched.contains(r#"x</script>.js"#));
	}

	#[test]
	fn path_traversal_is_rejected() {
		let root = Path::new("/srv/front_end");
		assert_eq!(resolve_asset(root, "inspector.html"), Some(root.join("inspector.html")));
		assert_eq!(
			resolve_asset(root, "entrypoints/inspector/inspector.js"),
			Some(root.join("entrypoints/inspector/inspector.js"))
		);
		assert_eq!(resolve_asset(root, "../secrets.json"), None);
		assert_eq!(resolve_asset(root, "a/../../b"), None);
		assert_eq!(resolve_asset(root, "/etc/passwd"), None);
		assert_eq!(resolve_asset(root, ""), None);
	}

	#[test]
	fn container_page_embeds_iframe_and_bridge() {
		let html = container_html("devtools <main>");
		assert!(html.contains(r#"<iframe id="host" src="/front_end/inspector.html">"#));
		assert!(html.contains("start_display_bridge(\"host\")"));
		assert!(html.contains("devtools &lt;main&gt;"));
	}

	#[test]
	fn shim_loader_imports_the_bridge() {
		let js = shim_loader_js();
		assert!(js.contains("/bridge/devtools_relay_bridge.js"));
		assert!(js.contains("install_host_shim(window, ToolsWebSocket)"));
		let shim = js.find("install_host_shim(window").unwrap();
		let loader = js.find("install_resource_loader(window)").unwrap();
		let entries = js.find("for (const entry of entries)").unwrap();
		assert!(shim < loader, "resource loader needs the shim's channel");
		assert!(loader < entries, "resource loader must be armed before any entry script runs");
	}

	#[test]
	fn content_types() {
		assert_eq!(content_type(Path::new("a/b.wasm")), "application/wasm");
		assert_eq!(content_type(Path::new("x.js")), "text/javascript; charset=utf-8");
		assert_eq!(content_type(Path::new("noext")), "application/octet-stream");
	}
}
