//! Analyze command: sleep periods and outings for one resident.

use std::fmt::Write as _;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::Args;
use serde::Serialize;

use dwell_core::{AnalysisReport, AnalysisWindow, Period, analyze, expand_readings};

use super::util::{format_minutes, load_observations, resolve_window};
use crate::Config;

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    /// JSON file with the resident's sensor observations.
    pub input: PathBuf,

    /// Window start (date or datetime). Defaults to the first observed date.
    #[arg(long)]
    pub start: Option<String>,

    /// Window end (date or datetime). Defaults to the last observed date.
    #[arg(long)]
    pub end: Option<String>,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

/// JSON report structure.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonReport {
    pub sleep_events: Vec<JsonSleepEvent>,
    pub outing_events: Vec<JsonOutingEvent>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonSleepEvent {
    pub sleep_start_time: String,
    pub sleep_end_time: String,
    pub sleep_duration_minutes: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonOutingEvent {
    pub outing_start_time: String,
    pub outing_end_time: String,
    pub outing_duration_minutes: i64,
}

fn timestamp(at: NaiveDateTime) -> String {
    at.format("%Y-%m-%dT%H:%M:%S").to_string()
}

fn clock(at: NaiveDateTime) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}

/// Formats a report as JSON.
pub fn format_report_json(report: &AnalysisReport) -> Result<String> {
    let json = JsonReport {
        sleep_events: report
            .sleep
            .periods
            .iter()
            .map(|p| JsonSleepEvent {
                sleep_start_time: timestamp(p.start),
                sleep_end_time: timestamp(p.end),
                sleep_duration_minutes: p.duration_minutes(),
            })
            .collect(),
        outing_events: report
            .outings
            .periods
            .iter()
            .map(|p| JsonOutingEvent {
                outing_start_time: timestamp(p.start),
                outing_end_time: timestamp(p.end),
                outing_duration_minutes: p.duration_minutes(),
            })
            .collect(),
    };

    Ok(serde_json::to_string_pretty(&json)?)
}

fn write_periods(output: &mut String, periods: &[Period]) {
    for p in periods {
        writeln!(
            output,
            "  {} → {}  ({})",
            clock(p.start),
            clock(p.end),
            format_minutes(p.duration_minutes())
        )
        .unwrap();
    }
}

/// Formats a report for the terminal.
pub fn format_report(report: &AnalysisReport) -> String {
    let mut output = String::new();

    match report.window {
        Some(window) => writeln!(
            output,
            "ANALYSIS: {} to {}",
            clock(window.start),
            clock(window.end)
        )
        .unwrap(),
        None => {
            writeln!(output, "ANALYSIS: no usable readings").unwrap();
            return output;
        }
    }

    writeln!(output).unwrap();
    writeln!(output, "SLEEP ({})", report.sleep.room_type).unwrap();
    writeln!(output, "─────").unwrap();
    if report.sleep.periods.is_empty() {
        writeln!(output, "  (no sleep detected)").unwrap();
    } else {
        write_periods(&mut output, &report.sleep.periods);
        writeln!(output).unwrap();
        for day in &report.sleep.daily {
            let noun = if day.periods == 1 { "period" } else { "periods" };
            writeln!(
                output,
                "  {}  {:>7}  {} {noun}",
                day.date,
                format_minutes(day.total_minutes),
                day.periods
            )
            .unwrap();
        }
    }

    writeln!(output).unwrap();
    writeln!(output, "OUTINGS").unwrap();
    writeln!(output, "───────").unwrap();
    if report.outings.periods.is_empty() {
        writeln!(output, "  (no outings detected)").unwrap();
    } else {
        write_periods(&mut output, &report.outings.periods);
    }

    output
}

pub fn run<W: Write>(writer: &mut W, args: &AnalyzeArgs, config: &Config) -> Result<()> {
    let observations = load_observations(&args.input)?;
    let window = resolve_window(args.start.as_deref(), args.end.as_deref(), || {
        AnalysisWindow::spanning(&expand_readings(&observations))
    })?;

    let report =
        analyze(&observations, window, &config.analysis()).context("invalid configuration")?;

    if args.json {
        writeln!(writer, "{}", format_report_json(&report)?)?;
    } else {
        write!(writer, "{}", format_report(&report))?;
    }

    Ok(())
}
