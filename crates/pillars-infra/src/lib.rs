//! Infrastructure layer for assessment draft safety.
//!
//! Contains implementations of the ports defined in `pillars-core`: SQLite
//! draft storage and the event-log recovery procedure, plus the config
//! loader and device-info capture.

pub mod config;
pub mod device;
pub mod sqlite;
