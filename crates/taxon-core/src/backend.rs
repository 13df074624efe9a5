//! The [`TaxonomyBackend`] and [`StateProvider`] traits.
//!
//! A backend is the remote store the taxonomy is persisted in: the HTTP
//! client in `taxon-http` in production, [`crate::memory::MemoryBackend`] in
//! tests and in the development server. Everything above this seam depends on
//! the traits, never on a concrete backend.

use std::{future::Future, sync::Arc};

use crate::{
  entity::{Entity, EntityBody, Id, Level, ListFilter, State},
  error::BackendError,
};

/// Filtered list/create/update/toggle/delete per level.
///
/// All methods return `Send` futures so a backend can be shared across a
/// multi-threaded runtime.
pub trait TaxonomyBackend: Send + Sync {
  /// `GET /config/{L}s[?{field}={id}]`
  fn list(
    &self,
    level: Level,
    filter: ListFilter,
  ) -> impl Future<Output = Result<Vec<Entity>, BackendError>> + Send + '_;

  /// `POST /config/{L}s`; the body must carry the parent link.
  fn create(
    &self,
    level: Level,
    body: EntityBody,
  ) -> impl Future<Output = Result<Entity, BackendError>> + Send + '_;

  /// `PUT /config/{L}s/{id}`
  fn update(
    &self,
    level: Level,
    id: Id,
    body: EntityBody,
  ) -> impl Future<Output = Result<Entity, BackendError>> + Send + '_;

  /// `PATCH /config/{L}s/{id}/toggle`; returns the record with `is_active`
  /// flipped.
  fn toggle(
    &self,
    level: Level,
    id: Id,
  ) -> impl Future<Output = Result<Entity, BackendError>> + Send + '_;

  /// `DELETE /config/{L}s/{id}`. Irreversible.
  fn delete(
    &self,
    level: Level,
    id: Id,
  ) -> impl Future<Output = Result<(), BackendError>> + Send + '_;
}

impl<B: TaxonomyBackend> TaxonomyBackend for Arc<B> {
  fn list(
    &self,
    level: Level,
    filter: ListFilter,
  ) -> impl Future<Output = Result<Vec<Entity>, BackendError>> + Send + '_ {
    (**self).list(level, filter)
  }

  fn create(
    &self,
    level: Level,
    body: EntityBody,
  ) -> impl Future<Output = Result<Entity, BackendError>> + Send + '_ {
    (**self).create(level, body)
  }

  fn update(
    &self,
    level: Level,
    id: Id,
    body: EntityBody,
  ) -> impl Future<Output = Result<Entity, BackendError>> + Send + '_ {
    (**self).update(level, id, body)
  }

  fn toggle(
    &self,
    level: Level,
    id: Id,
  ) -> impl Future<Output = Result<Entity, BackendError>> + Send + '_ {
    (**self).toggle(level, id)
  }

  fn delete(
    &self,
    level: Level,
    id: Id,
  ) -> impl Future<Output = Result<(), BackendError>> + Send + '_ {
    (**self).delete(level, id)
  }
}

/// The external State master list. Read-only; assumed always fresh.
pub trait StateProvider: Send + Sync {
  fn states(&self) -> impl Future<Output = Result<Vec<State>, BackendError>> + Send + '_;
}

/// A fixed State list.
#[derive(Debug, Clone, Default)]
pub struct StaticStates(Vec<State>);

impl StaticStates {
  pub fn new(states: Vec<State>) -> Self { Self(states) }

  pub fn as_slice(&self) -> &[State] { &self.0 }
}

impl StateProvider for StaticStates {
  async fn states(&self) -> Result<Vec<State>, BackendError> { Ok(self.0.clone()) }
}

impl<P: StateProvider> StateProvider for Arc<P> {
  fn states(&self) -> impl Future<Output = Result<Vec<State>, BackendError>> + Send + '_ {
    (**self).states()
  }
}
