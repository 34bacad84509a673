use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use affinity::config::Config;
use affinity::events;

/// Replay a JSON-lines event file, or stdin for `-`
pub fn execute(config: &Config, input: &Path, json: bool) -> Result<()> {
    let service = super::open_service(config)?;

    let report = if input == Path::new("-") {
        events::ingest(&service, io::stdin().lock())?
    } else {
        let file = File::open(input)
            .with_context(|| format!("Failed to open event file {}", input.display()))?;
        events::ingest(&service, BufReader::new(file))?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "Ingested {} items and {} reactions ({} duplicates, {} skipped, {} failed)",
            report.items, report.reactions, report.duplicates, report.skipped, report.failed
        );
    }
    Ok(())
}
