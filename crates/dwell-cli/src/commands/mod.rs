//! CLI subcommand implementations.

pub mod analyze;
pub mod summary;
pub mod util;
