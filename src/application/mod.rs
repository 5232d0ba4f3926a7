//! Application layer: document assembly, the console bridge and the
//! playground session that ties them together.

pub mod assembler;
pub mod bridge;
pub mod editing;
pub mod error;
pub mod format;
pub mod playground;
pub mod ports;
pub mod scheduler;
