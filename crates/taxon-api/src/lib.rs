//! JSON REST API for the administrative taxonomy.
//!
//! Exposes an axum [`Router`] backed by any
//! [`TaxonomyBackend`] and [`StateProvider`].
//! Auth, TLS, and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .merge(taxon_api::api_router(backend.clone(), states.clone()))
//! ```

pub mod entities;
pub mod error;
pub mod states;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, patch, put},
};
use taxon_core::backend::{StateProvider, TaxonomyBackend};

pub use error::ApiError;

/// Shared handler state.
pub struct ApiState<B, P> {
  pub backend: Arc<B>,
  pub states:  Arc<P>,
}

impl<B, P> Clone for ApiState<B, P> {
  fn clone(&self) -> Self {
    Self { backend: self.backend.clone(), states: self.states.clone() }
  }
}

/// Build the `/config` router for `backend`, with `states` as the State
/// master list.
pub fn api_router<B, P>(backend: Arc<B>, states: Arc<P>) -> Router<()>
where
  B: TaxonomyBackend + 'static,
  P: StateProvider + 'static,
{
  Router::new()
    .route("/config/states", get(states::list::<B, P>))
    .route(
      "/config/{collection}",
      get(entities::list::<B, P>).post(entities::create::<B, P>),
    )
    .route(
      "/config/{collection}/{id}",
      put(entities::update::<B, P>).delete(entities::delete::<B, P>),
    )
    .route("/config/{collection}/{id}/toggle", patch(entities::toggle::<B, P>))
    .with_state(ApiState { backend, states })
}
