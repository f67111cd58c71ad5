//! Business logic and repository trait definitions for assessment draft safety.
//!
//! This crate defines the "ports" (repository traits) that the infrastructure
//! layer implements, plus the draft-safety components built on them. It
//! depends only on `pillars-types` -- never on `pillars-infra` or any
//! database/IO crate.

pub mod draft;
pub mod repository;
pub mod service;

#[cfg(test)]
pub(crate) mod testing;
