//! Scan command - enumerate the master file table.

use super::{both, entry_line, path_filter, print_record};
use crate::app::App;
use crate::{FilterArgs, OutputFormat};
use serde::Serialize;
use std::time::Instant;
use usnkit_core::{Config, Filter, Record};

#[derive(Debug, Default, Serialize)]
struct ScanSummary {
    entries: usize,
    directories: usize,
    files: usize,
    shown: usize,
}

/// Run the scan command.
pub fn run(
    config: Config,
    volume: &str,
    filter_args: &FilterArgs,
    dirs: bool,
    files: bool,
    limit: Option<usize>,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let paths = path_filter(filter_args)?;
    let kind = if dirs {
        Some(Filter::is_dir())
    } else if files {
        Some(Filter::is_dir().not())
    } else {
        None
    };
    let filter = both(kind, paths);

    let app = App::open(config, volume)?;
    let start = Instant::now();
    let cache = app.build_cache(None)?;

    // Paths need the whole table, so filtering happens after resolution
    let mut records: Vec<Record> = cache.records();
    records.sort_by(|a, b| a.path.cmp(&b.path));

    let mut summary = ScanSummary {
        entries: records.len(),
        ..ScanSummary::default()
    };
    for record in &records {
        if record.is_dir() {
            summary.directories += 1;
        } else {
            summary.files += 1;
        }
    }

    let shown = records
        .iter()
        .filter(|r| filter.as_ref().map_or(true, |f| f.matches(r)))
        .take(limit.unwrap_or(usize::MAX));
    for record in shown {
        print_record(record, output, entry_line);
        summary.shown += 1;
    }

    eprintln!();
    eprintln!(
        "{} entries ({} directories, {} files), {} shown in {:.3}s",
        summary.entries,
        summary.directories,
        summary.files,
        summary.shown,
        start.elapsed().as_secs_f64()
    );
    if output == OutputFormat::Json {
        eprintln!("{}", serde_json::to_string(&summary)?);
    }
    Ok(())
}
