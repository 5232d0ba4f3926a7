//! Domain layer types and invariants.

pub mod buffers;
pub mod console;
pub mod error;
