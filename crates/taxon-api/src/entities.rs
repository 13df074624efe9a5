//! Handlers for the per-level `/config/{L}s` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/config/{L}s` | Optional `?state_id`, `?district_id`, `?block_id`, `?cluster_id` |
//! | `POST`   | `/config/{L}s` | Body: [`EntityBody`] with the parent link; returns 201 |
//! | `PUT`    | `/config/{L}s/{id}` | Body: [`EntityBody`]; parent link optional |
//! | `PATCH`  | `/config/{L}s/{id}/toggle` | Flips `is_active` |
//! | `DELETE` | `/config/{L}s/{id}` | 204; irreversible |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use taxon_core::{
  backend::{StateProvider, TaxonomyBackend},
  entity::{CascadeLevel, Entity, EntityBody, Id, Level, ListFilter},
};
use tracing::debug;

use crate::{ApiState, error::ApiError};

fn level_of(collection: &str) -> Result<Level, ApiError> {
  Level::from_collection(collection)
    .ok_or_else(|| ApiError::NotFound(format!("unknown collection {collection:?}")))
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub state_id:    Option<Id>,
  pub district_id: Option<Id>,
  pub block_id:    Option<Id>,
  pub cluster_id:  Option<Id>,
}

impl ListParams {
  /// The most specific ancestor given wins.
  pub fn filter(&self) -> ListFilter {
    [
      (CascadeLevel::Cluster, self.cluster_id),
      (CascadeLevel::Block, self.block_id),
      (CascadeLevel::District, self.district_id),
      (CascadeLevel::State, self.state_id),
    ]
    .into_iter()
    .find_map(|(by, id)| id.map(|id| ListFilter::Under(by, id)))
    .unwrap_or_default()
  }
}

/// `GET /config/{L}s[?{parent}_id=<id>]`
pub async fn list<B, P>(
  State(state): State<ApiState<B, P>>,
  Path(collection): Path<String>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Entity>>, ApiError>
where
  B: TaxonomyBackend,
  P: StateProvider,
{
  let level = level_of(&collection)?;
  let entities = state.backend.list(level, params.filter()).await?;
  Ok(Json(entities))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /config/{L}s`: returns 201 with the stored record.
pub async fn create<B, P>(
  State(state): State<ApiState<B, P>>,
  Path(collection): Path<String>,
  Json(body): Json<EntityBody>,
) -> Result<impl IntoResponse, ApiError>
where
  B: TaxonomyBackend,
  P: StateProvider,
{
  let level = level_of(&collection)?;
  if let Some(link) = &body.parent
    && !link.fits(level)
  {
    return Err(ApiError::BadRequest(format!(
      "a {level} must reference its parent through `{}`",
      level.parent_field()
    )));
  }
  let entity = state.backend.create(level, body).await?;
  debug!(%level, id = entity.id(), "created");
  Ok((StatusCode::CREATED, Json(entity)))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// `PUT /config/{L}s/{id}`
pub async fn update<B, P>(
  State(state): State<ApiState<B, P>>,
  Path((collection, id)): Path<(String, Id)>,
  Json(body): Json<EntityBody>,
) -> Result<Json<Entity>, ApiError>
where
  B: TaxonomyBackend,
  P: StateProvider,
{
  let level = level_of(&collection)?;
  if let Some(link) = &body.parent
    && !link.fits(level)
  {
    return Err(ApiError::BadRequest(format!(
      "a {level} must reference its parent through `{}`",
      level.parent_field()
    )));
  }
  Ok(Json(state.backend.update(level, id, body).await?))
}

// ─── Toggle ───────────────────────────────────────────────────────────────────

/// `PATCH /config/{L}s/{id}/toggle`
pub async fn toggle<B, P>(
  State(state): State<ApiState<B, P>>,
  Path((collection, id)): Path<(String, Id)>,
) -> Result<Json<Entity>, ApiError>
where
  B: TaxonomyBackend,
  P: StateProvider,
{
  let level = level_of(&collection)?;
  Ok(Json(state.backend.toggle(level, id).await?))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /config/{L}s/{id}`: 204 on success.
pub async fn delete<B, P>(
  State(state): State<ApiState<B, P>>,
  Path((collection, id)): Path<(String, Id)>,
) -> Result<StatusCode, ApiError>
where
  B: TaxonomyBackend,
  P: StateProvider,
{
  let level = level_of(&collection)?;
  state.backend.delete(level, id).await?;
  debug!(%level, id, "deleted");
  Ok(StatusCode::NO_CONTENT)
}
