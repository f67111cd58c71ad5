//! REST API layer: router, handlers, envelope responses and error mapping.

pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
