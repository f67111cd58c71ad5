//! Shared domain types for the assessment draft-safety platform.
//!
//! This crate contains the types passed between the core logic, the storage
//! layer and the CLI/REST surfaces: assessment drafts, display states,
//! recovery payloads, configuration and the error enums.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod assessment;
pub mod config;
pub mod error;
