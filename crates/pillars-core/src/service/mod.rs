//! Business logic services (use cases).
//!
//! Services orchestrate repository calls and draft-safety rules. They depend
//! on traits (ports) -- never on concrete infrastructure implementations.

pub mod assessment;
