//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::analyze::AnalyzeArgs;
use crate::commands::summary::SummaryArgs;

/// Sleep and outing inference from ambient home sensors.
///
/// Reads sensor observations exported from a home gateway and reports when
/// the resident slept and when they left the house.
#[derive(Debug, Parser)]
#[command(name = "dwell", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Detect sleep periods and outings for one resident.
    Analyze(AnalyzeArgs),

    /// Summarize several residents, one observation file each.
    Summary(SummaryArgs),
}
