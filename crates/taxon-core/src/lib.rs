//! Client-side core of the administrative taxonomy manager
//! (State → District → Block → Cluster → School).
//!
//! This crate is deliberately free of HTTP dependencies. It owns the tree
//! consistency rules: cascading selectors, ancestor backfill for edit forms,
//! and validated mutations. Persistence sits behind
//! [`backend::TaxonomyBackend`].

pub mod backend;
pub mod breadcrumb;
pub mod cascade;
pub mod entity;
pub mod error;
pub mod form;
pub mod lifecycle;
pub mod memory;
pub mod policy;
pub mod store;

pub use error::{BackendError, Error, FieldErrors, Result};

#[cfg(test)]
mod tests;
