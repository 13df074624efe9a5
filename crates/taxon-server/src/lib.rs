//! Development server for the taxonomy API.
//!
//! Seeds a [`MemoryBackend`] from an optional JSON fixture and serves
//! [`taxon_api::api_router`] over it.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use axum::Router;
use serde::Deserialize;
use taxon_core::memory::{Fixture, MemoryBackend};
use tower_http::trace::TraceLayer;
use tracing::info;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `TAXON_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:         String,
  #[serde(default = "default_port")]
  pub port:         u16,
  /// JSON [`Fixture`] to seed the backend with. Without one the server starts
  /// with no states and no records.
  #[serde(default)]
  pub fixture_path: Option<PathBuf>,
}

fn default_host() -> String { "127.0.0.1".to_string() }

fn default_port() -> u16 { 8080 }

impl Default for ServerConfig {
  fn default() -> Self {
    Self { host: default_host(), port: default_port(), fixture_path: None }
  }
}

impl ServerConfig {
  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

// ─── Backend ──────────────────────────────────────────────────────────────────

/// Read and parse the fixture at `path`.
pub async fn load_fixture(path: &Path) -> anyhow::Result<Fixture> {
  let path = expand_tilde(path);
  let raw = tokio::fs::read_to_string(&path)
    .await
    .with_context(|| format!("failed to read fixture at {path:?}"))?;
  Fixture::from_json(&raw).with_context(|| format!("invalid fixture at {path:?}"))
}

/// Build the backend `config` describes.
pub async fn backend(config: &ServerConfig) -> anyhow::Result<Arc<MemoryBackend>> {
  let backend = match &config.fixture_path {
    Some(path) => MemoryBackend::from_fixture(load_fixture(path).await?),
    None => MemoryBackend::new(Vec::new()),
  };
  info!(empty = backend.is_empty(), "backend ready");
  Ok(Arc::new(backend))
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// The full application: the taxonomy API over `backend`, with request
/// tracing. The backend doubles as the state provider.
pub fn app(backend: Arc<MemoryBackend>) -> Router {
  taxon_api::api_router(backend.clone(), backend).layer(TraceLayer::new_for_http())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
