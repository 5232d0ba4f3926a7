//! Infrastructure adapters and runtime bootstrap.

pub mod error;
mod lock;
pub mod realm;
pub mod store;
pub mod surface;
pub mod telemetry;
