//! Assessment draft safety.
//!
//! - `store`: persistence rules for the single active draft per key
//! - `form`: shared in-memory form state with a watchable dirty flag
//! - `autosave`: timer-driven flushing of dirty forms
//! - `conflict`: pure classification of a loaded draft for display
//! - `recovery`: best-effort reconstruction of lost answers
//! - `unsaved`: guard against leaving with unsaved changes

pub mod autosave;
pub mod conflict;
pub mod form;
pub mod recovery;
pub mod store;
pub mod unsaved;
