//! Summary command: per-resident feature table over many observation files.

use std::fmt::Write as _;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use dwell_core::{AnalysisWindow, UserInput, UserSummary, analyze_batch, expand_readings};

use super::util::{load_observations, resolve_window, user_name};
use crate::Config;

#[derive(Debug, Args)]
pub struct SummaryArgs {
    /// Observation files, one per resident. The file stem names the resident.
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Window start (date or datetime) applied to every resident.
    #[arg(long)]
    pub start: Option<String>,

    /// Window end (date or datetime) applied to every resident.
    #[arg(long)]
    pub end: Option<String>,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonSummary {
    pub user: String,
    pub total_outings: usize,
    pub avg_outing_minutes: f64,
    pub avg_sleep_minutes: f64,
    pub avg_intermediate_awakenings: f64,
    pub avg_pir: f64,
    pub avg_radar: f64,
}

impl From<&UserSummary> for JsonSummary {
    fn from(s: &UserSummary) -> Self {
        Self {
            user: s.user.clone(),
            total_outings: s.total_outings,
            avg_outing_minutes: s.avg_outing_minutes,
            avg_sleep_minutes: s.avg_sleep_minutes,
            avg_intermediate_awakenings: s.avg_intermediate_awakenings,
            avg_pir: s.avg_pir,
            avg_radar: s.avg_radar,
        }
    }
}

/// Formats summaries as JSON.
pub fn format_summaries_json(summaries: &[UserSummary]) -> Result<String> {
    let rows: Vec<JsonSummary> = summaries.iter().map(JsonSummary::from).collect();
    Ok(serde_json::to_string_pretty(&rows)?)
}

/// Truncates to `max_chars`, adding an ellipsis when shortened.
fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let kept: String = s.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{kept}…")
}

/// Formats summaries as a table.
pub fn format_summaries(summaries: &[UserSummary]) -> String {
    let mut output = String::new();

    if summaries.is_empty() {
        writeln!(output, "No residents analyzed.").unwrap();
        return output;
    }

    writeln!(
        output,
        "{:<16} {:>7} {:>10} {:>10} {:>8} {:>9} {:>9}",
        "RESIDENT", "OUTINGS", "OUT/DAY", "SLEEP", "WAKINGS", "PIR/DAY", "RADAR/DAY"
    )
    .unwrap();
    for s in summaries {
        writeln!(
            output,
            "{:<16} {:>7} {:>10.1} {:>10.1} {:>8.2} {:>9.1} {:>9.1}",
            truncate(&s.user, 16),
            s.total_outings,
            s.avg_outing_minutes,
            s.avg_sleep_minutes,
            s.avg_intermediate_awakenings,
            s.avg_pir,
            s.avg_radar
        )
        .unwrap();
    }

    output
}

pub fn run<W: Write>(writer: &mut W, args: &SummaryArgs, config: &Config) -> Result<()> {
    let inputs = args
        .inputs
        .iter()
        .map(|path| {
            Ok(UserInput {
                user: user_name(path),
                observations: load_observations(path)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let window = resolve_window(args.start.as_deref(), args.end.as_deref(), || {
        let all: Vec<_> = inputs
            .iter()
            .flat_map(|input| expand_readings(&input.observations))
            .collect();
        AnalysisWindow::spanning(&all)
    })?;

    let reports =
        analyze_batch(&inputs, window, &config.analysis()).context("invalid configuration")?;
    let summaries: Vec<UserSummary> = reports.into_iter().map(|r| r.summary).collect();
    tracing::info!(residents = summaries.len(), "summary complete");

    if args.json {
        writeln!(writer, "{}", format_summaries_json(&summaries)?)?;
    } else {
        write!(writer, "{}", format_summaries(&summaries))?;
    }

    Ok(())
}
