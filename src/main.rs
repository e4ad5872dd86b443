use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use sppctl::cli::{self, Command};
use sppctl::config::Config;
use sppctl::service::CachedSppClient;

#[derive(Parser, Debug)]
#[command(name = "sppctl")]
#[command(about = "Admin client for an SPP tuition service")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/sppctl/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Service base URL override
  #[arg(long)]
  url: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();

  // Load configuration
  let mut config = Config::load(args.config.as_deref())?;

  // Override service URL if specified on command line
  if let Some(url) = args.url {
    config.service.url = url;
  }

  // Connect, then run the requested command
  let client = CachedSppClient::connect(&config).await?;
  cli::run(args.command, &client).await
}
