//! Environmental data logger core
//! =============================================================================================
//!
//! BME280 compensation, shared state, input decoding, LCD view, buffered CSV
//! logging and the cooperative super-loop that ties them together. Everything
//! above `hardware` is board-independent and runs on the host under `cargo test`.

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod compensation;
pub mod config;
pub mod csv_log;
pub mod hardware;
pub mod input;
pub mod scheduler;
pub mod state;
pub mod view;
