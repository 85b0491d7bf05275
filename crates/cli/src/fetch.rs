//! Cross-origin loads performed on the front-end's behalf.

use std::time::Duration;

use async_trait::async_trait;
use devtools_relay_runtime::{ProxyFetchError, ResourceFetcher};
use tracing::debug;

use crate::error::Result;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// [`ResourceFetcher`] backed by reqwest.
///
/// Source maps and scripts are routinely served from dev servers with
/// self-signed certificates, so certificate errors are not fatal here.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
	client: reqwest::Client,
}

impl HttpFetcher {
	pub fn new() -> Result<Self> {
		let client = reqwest::Client::builder()
			.timeout(FETCH_TIMEOUT)
			.danger_accept_invalid_certs(true)
			.build()
			.map_err(anyhow::Error::from)?;
		Ok(Self { client })
	}
}

#[async_trait]
impl ResourceFetcher for HttpFetcher {
	async fn fetch(&self, url: &str) -> std::result::Result<String, ProxyFetchError> {
		let fail = |reason: String| ProxyFetchError {
			url: url.to_string(),
			reason,
		};

		let response = self.client.get(url).send().await.map_err(|e| fail(e.to_string()))?;
		let status = response.status();
		if !status.is_success() {
			return Err(fail(format!("unexpected status {status}")));
		}
		let body = response.text().await.map_err(|e| fail(e.to_string()))?;
		debug!(url, bytes = body.len(), "proxied resource fetched");
		Ok(body)
	}
}
