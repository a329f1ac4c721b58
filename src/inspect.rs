//! A dry run that shows how the first rows would be keyed, without writing any split files.

use crate::{key, run_log::RunLog, Error, SplitConfig};
use csv::StringRecord;
use std::io::Read;

/// How many rows are inspected when no count is given.
pub const DEFAULT_INSPECT_ROWS: usize = 20;

/// Writes the first `limit` data rows of `reader`, with their derived group
/// keys and allow-list membership, to `log`.
///
/// Returns the number of rows inspected.
pub fn inspect_reader<R: Read>(
    reader: R,
    config: &SplitConfig,
    limit: usize,
    log: &mut RunLog,
) -> Result<usize, Error> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(config.delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let header = reader.headers()?.clone();
    if header.is_empty() {
        return Err(Error::MissingHeader);
    }

    log.line(&format!("Header: {}", join(&header)))?;
    log.line(&format!("Inspecting first {limit} rows:"))?;

    let mut record = StringRecord::new();
    let mut inspected = 0;

    while reader.read_record(&mut record)? {
        if inspected >= limit {
            log.line(&format!("Stopping after inspecting {limit} rows."))?;
            break;
        }
        inspected += 1;

        log.line(&format!("Row {inspected}: {}", join(&record)))?;

        let Some(column) = config.group_column else {
            log.line("Extracted key: (no group column)")?;
            continue;
        };

        match &config.allow_list {
            Some(allow_list) => {
                let key = key::extension_key(&record, column);
                log.line(&format!("Extracted key: {key}"))?;
                log.line(&format!("Key in allow-list: {}", allow_list.contains(&key)))?;
            }
            None => {
                let line = record.position().map_or(0, |p| p.line());
                match key::raw_key(&record, column, line) {
                    Ok(key) => log.line(&format!("Extracted key: {key}"))?,
                    Err(e) => log.line(&format!("Extracted key: (invalid: {e})"))?,
                }
                log.line("Allow-list not provided.")?;
            }
        }
    }

    tracing::info!(rows = inspected, log = %log.path().display(), "Inspection complete");

    Ok(inspected)
}

fn join(record: &StringRecord) -> String {
    record.iter().collect::<Vec<_>>().join(" | ")
}
