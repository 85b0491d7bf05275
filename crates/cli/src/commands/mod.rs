mod attach;
mod launch;
mod resume;
mod targets;

use std::sync::Arc;

use devtools_relay_runtime::{SessionManager, SessionServices, WsConnector};
use tracing::{info, warn};

use crate::cli::{Cli, Commands};
use crate::config::{RelayConfig, Settings};
use crate::error::{RelayError, Result};
use crate::fetch::HttpFetcher;
use crate::host::{self, HostOptions, HostState};
use crate::launch::LaunchTarget;
use crate::output::{OutputFormat, ResultBuilder, ServeData, print_result};
use crate::state::{JsonPreferenceStore, SessionStateStore, StatePaths};
use crate::telemetry::TracingTelemetry;

pub async fn dispatch(cli: Cli) -> Result<()> {
    let project_root = std::env::current_dir()?;
    let paths = StatePaths::new(cli.state_dir.as_deref(), &project_root);
    let config = RelayConfig::load(&paths);
    let format = cli.format;

    match cli.command {
        Commands::Targets { endpoint } => {
            let settings = Settings::resolve(&config, endpoint.flags())?;
            targets::execute(&settings, format).await
        }
        Commands::Attach {
            url,
            endpoint,
            serve,
        } => {
            let settings = Settings::resolve(&config, layered([endpoint.flags(), serve.flags()]))?;
            attach::execute(&paths, &settings, url.as_deref(), format).await
        }
        Commands::Launch {
            file,
            url,
            browser_path,
            attach,
            endpoint,
            serve,
        } => {
            let browser = RelayConfig {
                browser_path,
                ..Default::default()
            };
            let settings = Settings::resolve(&config, layered([endpoint.flags(), serve.flags(), browser]))?;
            let target = match (file, url) {
                (Some(file), _) => LaunchTarget::File(file),
                (None, Some(url)) => LaunchTarget::Url(url),
                (None, None) => {
                    return Err(RelayError::InvalidInput("launch needs --file or --url".into()));
                }
            };
            let options = launch::LaunchOptions { target, attach };
            launch::execute(&paths, &settings, &project_root, options, format).await
        }
        Commands::Resume { serve } => {
            let settings = Settings::resolve(&config, serve.flags())?;
            resume::execute(&paths, &settings, format).await
        }
    }
}

fn layered<const N: usize>(layers: [RelayConfig; N]) -> RelayConfig {
    let mut merged = RelayConfig::default();
    for layer in layers {
        merged.merge(layer);
    }
    merged
}

/// Runs the host server for `target_url` until Ctrl-C. A `restored` server
/// revives the persisted session for its first container.
async fn serve_target(
    paths: &StatePaths,
    settings: &Settings,
    target_url: String,
    browser_pid: Option<u32>,
    restored: bool,
    command: &str,
    format: OutputFormat,
) -> Result<()> {
    if !settings.front_end_dir.join("inspector.html").is_file() {
        warn!(dir = %settings.front_end_dir.display(), "front-end directory has no inspector.html");
    }
    if !settings.bridge_dir.join(host::assets::BRIDGE_MODULE).is_file() {
        warn!(dir = %settings.bridge_dir.display(), "bridge directory has no {}", host::assets::BRIDGE_MODULE);
    }

    let services = SessionServices {
        preferences: Arc::new(JsonPreferenceStore::new(&paths.preferences)),
        telemetry: Arc::new(TracingTelemetry),
        fetcher: Arc::new(HttpFetcher::new()?),
    };
    let manager = SessionManager::new(Arc::new(WsConnector::new()), services);

    let sessions = SessionStateStore::new(&paths.sessions);
    sessions.record(&settings.container, &target_url)?;

    let listener = host::bind(settings.listen).await?;
    let addr = listener.local_addr()?;
    let data = ServeData {
        container_url: format!("http://{addr}/"),
        container: settings.container.clone(),
        target_url: target_url.clone(),
        browser_pid,
    };
    info!(container_url = %data.container_url, "open the container url in a browser");
    print_result(&ResultBuilder::new(command).data(data).build(), format);

    let state = HostState::new(
        HostOptions {
            front_end_dir: settings.front_end_dir.clone(),
            bridge_dir: settings.bridge_dir.clone(),
            container: settings.container.clone(),
            target_url,
            listen: addr,
            restored,
        },
        manager,
        sessions,
    );
    host::serve(listener, state, host::ctrl_c()).await
}

fn endpoint_label(settings: &Settings) -> String {
    format!("{}:{}", settings.host, settings.port)
}
