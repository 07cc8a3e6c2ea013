//! statcache CLI library.
//!
//! Argument parsing and command implementations live here so they can be
//! tested without spawning the binary.

pub mod cli;
pub mod commands;
pub mod error;
pub mod telemetry;
