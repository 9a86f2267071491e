//! CLI demonstration of the Chord DHT routing core.
//!
//! This is a thin illustration of wiring `corelib::Network` up to a real
//! process, not part of the routing core itself: argument parsing,
//! logging setup, and printing are the enclosing program's job, which
//! `corelib` deliberately stays out of.

pub mod commands;
pub mod config;

pub use commands::Command;
pub use config::CliConfig;
