//! Result output formatting and writing.

use crate::OutputFormat;
use anyhow::{Context, Result};
use lib_chanfilt::BatchReport;
use lib_types::{ChannelMaskMap, ChannelSignals, SampleStats};
use std::io::Write;
use std::path::Path;

/// Everything a job run produces.
pub struct RunResults {
    pub name: String,
    pub stages: Vec<&'static str>,
    pub signals: ChannelSignals,
    pub report: BatchReport,
}

/// Write run results to the output directory.
pub fn write_results(results: &RunResults, output_dir: &Path, format: OutputFormat) -> Result<()> {
    write_masks(&results.report.masks, output_dir, format)?;
    write_signals(&results.signals, output_dir, format)?;

    let summary_path = output_dir.join("summary.txt");
    let mut f = std::fs::File::create(&summary_path)
        .with_context(|| format!("Failed to create {:?}", summary_path))?;
    write_summary(&mut f, results)?;
    tracing::info!("Wrote summary to {:?}", summary_path);

    Ok(())
}

fn write_masks(masks: &ChannelMaskMap, output_dir: &Path, format: OutputFormat) -> Result<()> {
    let path = match format {
        OutputFormat::Text => output_dir.join("masks.txt"),
        OutputFormat::Json => output_dir.join("masks.json"),
        OutputFormat::Csv => output_dir.join("masks.csv"),
    };
    let mut f = std::fs::File::create(&path)?;

    match format {
        OutputFormat::Text => {
            for (label, ch, ranges) in masks.iter() {
                let ranges: Vec<String> = ranges.iter().map(ToString::to_string).collect();
                writeln!(f, "{:<8} {:>6}  {}", label, ch, ranges.join(" "))?;
            }
        }
        OutputFormat::Json => {
            writeln!(f, "{}", serde_json::to_string_pretty(masks)?)?;
        }
        OutputFormat::Csv => {
            writeln!(f, "label,channel,start,end")?;
            for (label, ch, ranges) in masks.iter() {
                for range in ranges {
                    writeln!(f, "{},{},{},{}", label, ch, range.start, range.end)?;
                }
            }
        }
    }

    tracing::info!("Wrote {} masked ranges to {:?}", masks.range_count(), path);
    Ok(())
}

fn write_signals(signals: &ChannelSignals, output_dir: &Path, format: OutputFormat) -> Result<()> {
    let path = match format {
        OutputFormat::Json => output_dir.join("signals.json"),
        OutputFormat::Text | OutputFormat::Csv => output_dir.join("signals.csv"),
    };
    let mut f = std::fs::File::create(&path)?;

    match format {
        OutputFormat::Json => {
            writeln!(f, "{}", serde_json::to_string(signals)?)?;
        }
        OutputFormat::Text | OutputFormat::Csv => {
            writeln!(f, "channel,sample,value")?;
            for (ch, signal) in signals {
                for (i, v) in signal.iter().enumerate() {
                    writeln!(f, "{},{},{}", ch, i, v)?;
                }
            }
        }
    }

    tracing::info!("Wrote {} channels to {:?}", signals.len(), path);
    Ok(())
}

fn write_summary(f: &mut impl Write, results: &RunResults) -> Result<()> {
    let report = &results.report;

    writeln!(f, "Channel Filter Summary: {}", results.name)?;
    writeln!(f, "======================")?;
    writeln!(f)?;
    writeln!(f, "Stages:   {}", results.stages.join(" -> "))?;
    writeln!(f, "Channels: {}", results.signals.len())?;
    writeln!(f, "Applied:  {}", report.processed)?;
    writeln!(f)?;

    writeln!(f, "Masks:")?;
    for label in report.masks.labels() {
        let channels = report.masks.channels(label);
        writeln!(f, "  {:<8} {} channels", label, channels.len())?;
    }

    if !report.failures.is_empty() {
        writeln!(f)?;
        writeln!(f, "Failures:")?;
        for (ch, e) in &report.failures {
            writeln!(f, "  channel {}: {}", ch, e)?;
        }
    }

    writeln!(f)?;
    writeln!(f, "Per-channel RMS:")?;
    for (ch, signal) in &results.signals {
        writeln!(f, "  {:>6}  {:.4}", ch, signal.robust_rms())?;
    }

    Ok(())
}

/// Print results to stdout.
pub fn print_results(results: &RunResults) {
    let report = &results.report;

    println!("\n=== {} ===\n", results.name);
    println!("Stages:   {}", results.stages.join(" -> "));
    println!("Channels: {}", results.signals.len());

    for label in report.masks.labels() {
        println!("  {:<8} {:?}", label, report.masks.channels(label));
    }

    if report.is_clean() {
        println!("\n  Status: OK");
    } else {
        println!("\n  Status: {} channels failed", report.failures.len());
    }

    println!();
}
