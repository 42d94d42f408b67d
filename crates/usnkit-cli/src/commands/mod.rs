//! Subcommand implementations and shared output helpers.

pub mod info;
pub mod journal;
pub mod monitor;
pub mod scan;

use crate::{FilterArgs, OutputFormat};
use chrono::Local;
use usnkit_core::{AttributeFormat, Config, Filter, Reason, ReasonFormat, Record, Stats};

/// Build the path filter described by `--include` and `--exclude`.
///
/// A path passes when it matches any include pattern (or none are given)
/// and no exclude pattern.
pub fn path_filter(args: &FilterArgs) -> anyhow::Result<Option<Filter>> {
    let mut filter: Option<Filter> = None;

    let mut include: Option<Filter> = None;
    for pattern in &args.include {
        let f = Filter::path_pattern(pattern)?;
        include = Some(match include {
            Some(prev) => prev.or(f),
            None => f,
        });
    }
    if let Some(include) = include {
        filter = Some(include);
    }

    for pattern in &args.exclude {
        let f = Filter::path_pattern(pattern)?.not();
        filter = Some(match filter {
            Some(prev) => prev.and(f),
            None => f,
        });
    }

    Ok(filter)
}

/// Combine two optional filters with `and`.
pub fn both(a: Option<Filter>, b: Option<Filter>) -> Option<Filter> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.and(b)),
        (a, b) => a.or(b),
    }
}

/// The `--reasons` mask, falling back to the configured one.
pub fn reason_mask(config: &Config, reasons: Option<&str>) -> anyhow::Result<Reason> {
    Ok(match reasons {
        Some(reasons) => reasons.parse()?,
        None => config.reason_mask()?,
    })
}

/// One line describing a journal record.
pub fn journal_line(record: &Record) -> String {
    format!(
        "{:>14} {} {:<24} {}",
        record.usn,
        record
            .timestamp
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S%.3f"),
        record.reason.join("|", ReasonFormat::Short),
        record.path_or_name()
    )
}

/// One line describing a file table entry.
pub fn entry_line(record: &Record) -> String {
    let kind = if record.is_dir() { "d" } else { "-" };
    format!(
        "{} {:<8} {}",
        kind,
        record.attributes.join("", AttributeFormat::Code),
        record.path_or_name()
    )
}

/// Print a record in the chosen format; JSON is one object per line.
pub fn print_record(record: &Record, output: OutputFormat, line: fn(&Record) -> String) {
    match output {
        OutputFormat::Text => println!("{}", line(record)),
        OutputFormat::Json => match serde_json::to_string(record) {
            Ok(json) => println!("{}", json),
            Err(e) => tracing::warn!(error = %e, "Failed to serialize record"),
        },
    }
}

/// Summary line for record statistics, printed to stderr.
pub fn print_stats(label: &str, stats: &Stats) {
    let span = stats
        .span()
        .map(|d| format!(" over {}s", d.num_seconds()))
        .unwrap_or_default();
    eprintln!(
        "{:<9} {} records, {} bytes{}",
        label, stats.records, stats.bytes, span
    );
}
