//! HTTP request handlers.

pub mod assessment;
pub mod health;
