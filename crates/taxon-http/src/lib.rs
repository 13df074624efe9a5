//! Async HTTP client for the taxonomy REST API.
//!
//! [`HttpBackend`] implements [`TaxonomyBackend`] and [`StateProvider`] over
//! the `/config` endpoints, translating HTTP statuses into
//! [`BackendError`]s: 404 on a record becomes `NotFound`, 400/422 become
//! `Validation` (with the server's field errors when it sends them), and
//! everything else is `Transport`.

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use taxon_core::{
  BackendError, FieldErrors,
  backend::{StateProvider, TaxonomyBackend},
  entity::{Entity, EntityBody, Id, Level, ListFilter, State},
};
use tracing::debug;

/// Connection settings for the taxonomy API.
#[derive(Debug, Clone)]
pub struct ClientConfig {
  pub base_url: String,
  /// Sent as a bearer token when set.
  pub token:    Option<String>,
  pub timeout:  Duration,
}

impl ClientConfig {
  pub fn new(base_url: impl Into<String>) -> Self {
    Self {
      base_url: base_url.into(),
      token:    None,
      timeout:  Duration::from_secs(30),
    }
  }
}

/// Error body sent by the API on failure.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
  #[serde(default)]
  error:        String,
  #[serde(default)]
  field_errors: Option<FieldErrors>,
}

/// Cheap to clone: the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Debug, Clone)]
pub struct HttpBackend {
  client: Client,
  config: ClientConfig,
}

impl HttpBackend {
  pub fn new(config: ClientConfig) -> reqwest::Result<Self> {
    let client = Client::builder().timeout(config.timeout).build()?;
    Ok(Self { client, config })
  }

  pub fn base_url(&self) -> &str { &self.config.base_url }

  fn url(&self, path: &str) -> String {
    format!("{}/config{}", self.config.base_url.trim_end_matches('/'), path)
  }

  fn request(&self, method: Method, path: &str) -> RequestBuilder {
    let req = self.client.request(method, self.url(path));
    match &self.config.token {
      Some(token) => req.bearer_auth(token),
      None => req,
    }
  }

  /// Send `req`, turning every non-success status into a [`BackendError`].
  /// `target` names the record the request is about, if any.
  async fn send(
    &self,
    req: RequestBuilder,
    what: &str,
    target: Option<(Level, Id)>,
  ) -> Result<Response, BackendError> {
    debug!(request = what, "sending");
    let resp = req
      .send()
      .await
      .map_err(|e| BackendError::Transport(format!("{what} failed: {e}")))?;
    let status = resp.status();
    if status.is_success() {
      return Ok(resp);
    }

    let body: ErrorBody = resp.json().await.unwrap_or_default();
    match (status, target) {
      (StatusCode::NOT_FOUND, Some((level, id))) => Err(BackendError::NotFound { level, id }),
      (StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY, _) => {
        Err(BackendError::Validation(body.field_errors.unwrap_or_else(|| {
          FieldErrors::single("request", body.error)
        })))
      }
      _ => Err(BackendError::Transport(format!("{what} → {status}: {}", body.error))),
    }
  }

  async fn entity(&self, level: Level, resp: Response, what: &str) -> Result<Entity, BackendError> {
    let value: serde_json::Value = resp
      .json()
      .await
      .map_err(|e| BackendError::Transport(format!("{what}: reading body: {e}")))?;
    Entity::decode(level, value)
      .map_err(|e| BackendError::Transport(format!("{what}: decoding {level}: {e}")))
  }
}

impl TaxonomyBackend for HttpBackend {
  async fn list(&self, level: Level, filter: ListFilter) -> Result<Vec<Entity>, BackendError> {
    let path = format!("/{}", level.collection());
    let what = format!("GET {path}");
    let mut req = self.request(Method::GET, &path);
    if let Some((field, id)) = filter.query_pair() {
      req = req.query(&[(field, id)]);
    }
    let resp = self.send(req, &what, None).await?;
    let values: Vec<serde_json::Value> = resp
      .json()
      .await
      .map_err(|e| BackendError::Transport(format!("{what}: reading body: {e}")))?;
    values
      .into_iter()
      .map(|v| Entity::decode(level, v))
      .collect::<Result<_, _>>()
      .map_err(|e| BackendError::Transport(format!("{what}: decoding {level}: {e}")))
  }

  async fn create(&self, level: Level, body: EntityBody) -> Result<Entity, BackendError> {
    let path = format!("/{}", level.collection());
    let what = format!("POST {path}");
    let req = self.request(Method::POST, &path).json(&body);
    let resp = self.send(req, &what, None).await?;
    self.entity(level, resp, &what).await
  }

  async fn update(&self, level: Level, id: Id, body: EntityBody) -> Result<Entity, BackendError> {
    let path = format!("/{}/{id}", level.collection());
    let what = format!("PUT {path}");
    let req = self.request(Method::PUT, &path).json(&body);
    let resp = self.send(req, &what, Some((level, id))).await?;
    self.entity(level, resp, &what).await
  }

  async fn toggle(&self, level: Level, id: Id) -> Result<Entity, BackendError> {
    let path = format!("/{}/{id}/toggle", level.collection());
    let what = format!("PATCH {path}");
    let req = self.request(Method::PATCH, &path);
    let resp = self.send(req, &what, Some((level, id))).await?;
    self.entity(level, resp, &what).await
  }

  async fn delete(&self, level: Level, id: Id) -> Result<(), BackendError> {
    let path = format!("/{}/{id}", level.collection());
    let what = format!("DELETE {path}");
    let req = self.request(Method::DELETE, &path);
    self.send(req, &what, Some((level, id))).await?;
    Ok(())
  }
}

impl StateProvider for HttpBackend {
  async fn states(&self) -> Result<Vec<State>, BackendError> {
    let what = "GET /config/states";
    let resp = self.send(self.request(Method::GET, "/states"), what, None).await?;
    resp
      .json()
      .await
      .map_err(|e| BackendError::Transport(format!("{what}: reading body: {e}")))
  }
}
