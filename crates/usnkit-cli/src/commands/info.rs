//! Info command - show journal state.

use crate::app::App;
use crate::OutputFormat;
use usnkit_core::{Config, JournalData};

/// Run the info command.
pub fn run(
    config: Config,
    volume: &str,
    create: bool,
    max_size: u64,
    allocation_delta: u64,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let app = App::open(config, volume)?;

    let data = match app.journal.query() {
        Ok(data) => data,
        Err(e) if e.is_journal_not_active() && create => {
            eprintln!("No active journal on {}, creating one.", app.journal.name());
            app.journal.create(max_size, allocation_delta)?
        }
        Err(e) if e.is_journal_not_active() => {
            eprintln!("{}. Run with --create to create one.", e);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    match output {
        OutputFormat::Text => print_text(&app.journal.name(), &data),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&data)?),
    }
    Ok(())
}

fn print_text(name: &str, data: &JournalData) {
    println!("Change Journal on {}", name);
    println!("==================");
    println!();
    println!("  Journal ID:        {:016X}", data.journal_id);
    println!("  First USN:         {}", data.first_usn);
    println!("  Next USN:          {}", data.next_usn);
    println!("  Lowest valid USN:  {}", data.lowest_valid_usn);
    println!("  Max USN:           {}", data.max_usn);
    println!(
        "  Maximum size:      {} bytes ({:.1} MB)",
        data.maximum_size,
        data.maximum_size as f64 / (1024.0 * 1024.0)
    );
    println!("  Allocation delta:  {} bytes", data.allocation_delta);
    println!(
        "  Record versions:   {}-{}",
        data.min_supported_major_version, data.max_supported_major_version
    );
}
