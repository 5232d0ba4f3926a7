//! Core of a live HTML/CSS/JS playground: assembles the three source buffers
//! into one preview document, relays console output from the running preview
//! back to the host, and debounces re-renders while the user types.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
