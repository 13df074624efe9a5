//! `taxon`: command-line front end for the administrative taxonomy.
//!
//! # Usage
//!
//! ```text
//! taxon --url http://localhost:8080 list districts --parent 1
//! taxon create school --name "GPS Rampur" --block 10 --cluster 99
//! taxon --config ~/.config/taxon/config.toml resolve school 500
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use commands::Command;
use serde::Deserialize;
use taxon_core::{policy::LifecyclePolicy, store::TaxonomyStore};
use taxon_http::{ClientConfig, HttpBackend};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

const DEFAULT_URL: &str = "http://localhost:8080";

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "taxon", about = "Manage the state/district/block/cluster/school taxonomy")]
struct Args {
  /// Path to a TOML config file (url, token, [policy]).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the taxonomy API (default: http://localhost:8080).
  #[arg(long, env = "TAXON_URL")]
  url: Option<String>,

  /// Bearer token sent with every request.
  #[arg(long, env = "TAXON_TOKEN")]
  token: Option<String>,

  /// Print records as JSON instead of a table.
  #[arg(long, global = true)]
  json: bool,

  #[command(subcommand)]
  command: Command,
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default, Debug)]
struct ConfigFile {
  #[serde(default)]
  url:    String,
  #[serde(default)]
  token:  String,
  #[serde(default)]
  policy: LifecyclePolicy,
}

impl ConfigFile {
  fn load(path: &std::path::Path) -> Result<Self> {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")
  }
}

/// CLI flags override the config file, which overrides defaults.
fn client_config(args: &Args, file: &ConfigFile) -> ClientConfig {
  let base_url = args
    .url
    .clone()
    .or_else(|| (!file.url.is_empty()).then(|| file.url.clone()))
    .unwrap_or_else(|| DEFAULT_URL.to_string());
  let mut config = ClientConfig::new(base_url);
  config.token = args
    .token
    .clone()
    .or_else(|| (!file.token.is_empty()).then(|| file.token.clone()));
  config
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();

  let file_cfg = match &args.config {
    Some(path) => ConfigFile::load(path)?,
    None => ConfigFile::default(),
  };

  let backend = HttpBackend::new(client_config(&args, &file_cfg)).context("building HTTP client")?;
  tracing::debug!(url = backend.base_url(), "connecting");
  let store = TaxonomyStore::new(backend);

  let mut stdout = std::io::stdout().lock();
  commands::run(args.command, &store, file_cfg.policy, args.json, &mut stdout).await
}
