//! Handler for `GET /config/states`, the read-only State master list.

use axum::{Json, extract::State};
use taxon_core::{
  backend::{StateProvider, TaxonomyBackend},
  entity,
};

use crate::{ApiState, error::ApiError};

/// `GET /config/states`
pub async fn list<B, P>(
  State(state): State<ApiState<B, P>>,
) -> Result<Json<Vec<entity::State>>, ApiError>
where
  B: TaxonomyBackend,
  P: StateProvider,
{
  Ok(Json(state.states.states().await?))
}
