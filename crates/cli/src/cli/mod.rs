use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::RelayConfig;
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "devtools-relay")]
#[command(about = "Relay a remote DevTools target into a sandboxed front-end")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Output format
	#[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
	pub format: OutputFormat,

	/// Directory holding config.json, preferences.json and sessions.json
	#[arg(long, global = true, value_name = "DIR")]
	pub state_dir: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// List the debuggable targets of a discovery endpoint
	Targets {
		#[command(flatten)]
		endpoint: EndpointArgs,
	},

	/// Attach to a target and serve the front-end for it
	Attach {
		/// Target page URL; prompts for a choice when omitted
		#[arg(long)]
		url: Option<String>,

		#[command(flatten)]
		endpoint: EndpointArgs,

		#[command(flatten)]
		serve: ServeArgs,
	},

	/// Launch a local browser with remote debugging enabled
	Launch {
		/// File to open; `${workspaceFolder}` expands to the working directory
		#[arg(long, conflicts_with = "url", required_unless_present = "url")]
		file: Option<String>,

		/// URL to open
		#[arg(long)]
		url: Option<String>,

		/// Browser executable
		#[arg(long, value_name = "PATH")]
		browser_path: Option<PathBuf>,

		/// Attach to the launched page once it is debuggable
		#[arg(long)]
		attach: bool,

		#[command(flatten)]
		endpoint: EndpointArgs,

		#[command(flatten)]
		serve: ServeArgs,
	},

	/// Serve the session persisted for a container again
	Resume {
		#[command(flatten)]
		serve: ServeArgs,
	},
}

impl Commands {
	pub fn name(&self) -> &'static str {
		match self {
			Commands::Targets { .. } => "targets",
			Commands::Attach { .. } => "attach",
			Commands::Launch { .. } => "launch",
			Commands::Resume { .. } => "resume",
		}
	}
}

/// Where the discovery endpoint lives.
#[derive(Args, Debug, Clone, Default)]
pub struct EndpointArgs {
	/// Discovery endpoint host
	#[arg(long)]
	pub host: Option<String>,

	/// Discovery endpoint port
	#[arg(long)]
	pub port: Option<u16>,
}

/// How the host server is run.
#[derive(Args, Debug, Clone, Default)]
pub struct ServeArgs {
	/// Address the host server listens on
	#[arg(long, value_name = "ADDR")]
	pub listen: Option<String>,

	/// Directory with the DevTools front-end (inspector.html and friends)
	#[arg(long, value_name = "DIR")]
	pub front_end_dir: Option<PathBuf>,

	/// wasm-bindgen output directory of the bridge
	#[arg(long, value_name = "DIR")]
	pub bridge_dir: Option<PathBuf>,

	/// Container id the session state is persisted under
	#[arg(long, value_name = "ID")]
	pub container: Option<String>,
}

impl EndpointArgs {
	pub fn flags(&self) -> RelayConfig {
		RelayConfig {
			host: self.host.clone(),
			port: self.port,
			..Default::default()
		}
	}
}

impl ServeArgs {
	pub fn flags(&self) -> RelayConfig {
		RelayConfig {
			listen: self.listen.clone(),
			front_end_dir: self.front_end_dir.clone(),
			bridge_dir: self.bridge_dir.clone(),
			container: self.container.clone(),
			..Default::default()
		}
	}
}
