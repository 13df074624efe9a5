//! Error types for `taxon-core`.
//!
//! [`BackendError`] is what a remote (or in-memory) backend reports.
//! [`Error`] is what the taxonomy operations surface to their callers; the UI
//! layer decides how to present each variant. Nothing here is retried.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entity::{CascadeLevel, Id, Level};

// ─── Field errors ────────────────────────────────────────────────────────────

/// Field-level validation detail, keyed by the offending field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
  pub fn new() -> Self { Self::default() }

  /// A single-entry set.
  pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
    let mut errors = Self::new();
    errors.insert(field, message);
    errors
  }

  pub fn insert(&mut self, field: impl Into<String>, message: impl Into<String>) {
    self.0.insert(field.into(), message.into());
  }

  pub fn get(&self, field: &str) -> Option<&str> {
    self.0.get(field).map(String::as_str)
  }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
  }
}

impl fmt::Display for FieldErrors {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut first = true;
    for (field, message) in &self.0 {
      if !first {
        f.write_str("; ")?;
      }
      write!(f, "{field}: {message}")?;
      first = false;
    }
    Ok(())
  }
}

// ─── Backend ─────────────────────────────────────────────────────────────────

/// A failure reported by a [`TaxonomyBackend`](crate::backend::TaxonomyBackend)
/// or [`StateProvider`](crate::backend::StateProvider).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
  #[error("{level} {id} not found")]
  NotFound { level: Level, id: Id },

  #[error("validation failed: {0}")]
  Validation(FieldErrors),

  #[error("transport error: {0}")]
  Transport(String),
}

// ─── Core ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum Error {
  /// A list read failed. The affected selector stays empty; the caller may
  /// offer a retry.
  #[error("failed to fetch {level} list: {source}")]
  FetchFailed {
    level:  Level,
    #[source]
    source: BackendError,
  },

  /// The external State list could not be read.
  #[error("failed to fetch states: {0}")]
  StatesUnavailable(#[source] BackendError),

  /// A descendant level was selected before its ancestor.
  #[error("cannot select {attempted} before a {missing} is selected")]
  InvalidTransition {
    attempted: CascadeLevel,
    missing:   CascadeLevel,
  },

  /// A create/update was attempted without the ancestor the level requires.
  #[error("{level} requires `{missing}` in the ancestor chain")]
  IncompleteChain { level: Level, missing: &'static str },

  /// The target vanished server-side between read and write.
  #[error("{level} {id} no longer exists")]
  NotFound { level: Level, id: Id },

  #[error("validation failed: {0}")]
  ValidationFailed(FieldErrors),

  /// A delete was invoked with a confirmation issued for another target.
  #[error("delete confirmation was issued for {confirmed_level} {confirmed_id}, not {level} {id}")]
  ConfirmationMismatch {
    level:           Level,
    id:              Id,
    confirmed_level: Level,
    confirmed_id:    Id,
  },

  #[error("backend error: {0}")]
  Backend(#[source] BackendError),
}

impl From<BackendError> for Error {
  fn from(e: BackendError) -> Self {
    match e {
      BackendError::NotFound { level, id } => Error::NotFound { level, id },
      BackendError::Validation(fields) => Error::ValidationFailed(fields),
      other => Error::Backend(other),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
