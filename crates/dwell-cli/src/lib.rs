//! Dwell CLI library.
//!
//! This crate provides the command-line interface over `dwell-core`.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands};
pub use config::Config;
