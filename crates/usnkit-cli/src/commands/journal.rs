//! Journal command - dump the journal from its first record.

use super::{journal_line, path_filter, print_record, print_stats, reason_mask};
use crate::app::App;
use crate::{FilterArgs, OutputFormat};
use std::io::SeekFrom;
use tracing::debug;
use usnkit_core::{Cache, Config, RecordPipeline};

/// Run the journal command.
pub fn run(
    config: Config,
    volume: &str,
    filter_args: &FilterArgs,
    reasons: Option<&str>,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let mask = reason_mask(&config, reasons)?;
    let filter = path_filter(filter_args)?;

    let app = App::open(config, volume)?;
    let cache = app.directory_cache()?;

    let mut pipeline = RecordPipeline::default()
        .with_processor(Cache::directory_processor(&cache))
        .with_filer(cache);
    if let Some(filter) = filter {
        pipeline = pipeline.with_filter(filter);
    }

    let mut cursor = app.journal.cursor(mask, pipeline)?;
    let first = cursor.journal_data().first_usn;
    cursor.seek(SeekFrom::Start(u64::try_from(first).unwrap_or(0)))?;
    debug!(first_usn = first, reason_mask = %mask, "Reading journal");

    let mut buf = app.config.buffer_policy().buffer();
    while let Some(batch) = cursor.next(&mut buf)? {
        for record in &batch {
            print_record(record, output, journal_line);
        }
    }

    let (total, matched) = cursor.stats();
    cursor.close()?;

    eprintln!();
    print_stats("Matched:", &matched);
    print_stats("Total:", &total);
    Ok(())
}
