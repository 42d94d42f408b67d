//! Monitor command - follow the journal live.

use super::{journal_line, path_filter, print_record, reason_mask};
use crate::app::App;
use crate::{FilterArgs, OutputFormat};
use crossbeam_channel::{after, never, select};
use std::time::Duration;
use tracing::{error, info};
use usnkit_core::{Cache, Config, RecordPipeline};

/// Run the monitor command.
pub fn run(
    config: Config,
    volume: &str,
    filter_args: &FilterArgs,
    reasons: Option<&str>,
    interval_ms: Option<u64>,
    duration_secs: Option<u64>,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let mask = reason_mask(&config, reasons)?;
    let filter = path_filter(filter_args)?;
    let interval = interval_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| config.poll_interval());

    let app = App::open(config, volume)?;
    let cache = app.directory_cache()?;
    let start = app.journal.query()?.next_usn;

    let mut pipeline = RecordPipeline::default()
        .with_processor(Cache::directory_processor(&cache))
        .with_filer(cache);
    if let Some(filter) = filter {
        pipeline = pipeline.with_filter(filter);
    }

    let monitor = app.journal.monitor();
    let subscription = monitor.listen(app.config.journal.listener_capacity.max(1));
    let errors = monitor.errors();
    monitor.run_with(start, interval, mask, pipeline)?;
    info!(start_usn = start, interval_ms = interval.as_millis() as u64, "Monitoring");

    eprintln!("Monitoring {} for changes...", app.journal.name());
    eprintln!("Press Ctrl+C to stop.");

    let deadline = match duration_secs {
        Some(secs) => after(Duration::from_secs(secs)),
        None => never(),
    };

    let mut count = 0u64;
    let outcome = loop {
        select! {
            recv(subscription.receiver()) -> record => match record {
                Ok(record) => {
                    print_record(&record, output, journal_line);
                    count += 1;
                }
                Err(_) => break Ok(()),
            },
            recv(errors) -> e => {
                if let Ok(e) = e {
                    error!(error = %e, "Monitor stopped");
                    break Err(e);
                }
            },
            recv(deadline) -> _ => break Ok(()),
        }
    };

    monitor.close()?;
    eprintln!("Monitoring stopped after {} records.", count);
    outcome.map_err(Into::into)
}
