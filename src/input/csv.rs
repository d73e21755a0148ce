use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;
use tracing::debug;

use crate::core::{Dataset, DatasetRow};

/// Load the recorded sensor table from a CSV file
///
/// Columns are positional and no header is assumed:
/// - column 0: timestamp, kept verbatim
/// - columns 1..=channel_count: channel readings, any of which may be blank
///
/// Blank or non-numeric cells leave that channel absent for the row, so a
/// header line simply contributes a row with no readings.
pub fn load_csv(path: &Path, channel_count: usize) -> Result<Dataset> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open dataset {}", path.display()))?;

    let dataset = parse_csv(file, channel_count)
        .with_context(|| format!("Failed to parse dataset {}", path.display()))?;

    debug!(
        "Loaded {} rows ({} channels) from {}",
        dataset.len(),
        channel_count,
        path.display()
    );

    Ok(dataset)
}

/// Parse CSV text from any reader; see [`load_csv`]
pub fn parse_csv<R: Read>(reader: R, channel_count: usize) -> Result<Dataset> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();

    for (line, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read CSV row {}", line + 1))?;

        let timestamp = record.get(0).unwrap_or_default();
        let channels = (1..=channel_count)
            .map(|column| record.get(column).and_then(parse_reading))
            .collect();

        rows.push(DatasetRow::new(timestamp, channels));
    }

    Ok(Dataset::new(rows, channel_count))
}

/// Parse one channel cell; blank, non-numeric and non-finite cells are absent
fn parse_reading(cell: &str) -> Option<f64> {
    if cell.is_empty() {
        return None;
    }
    cell.parse::<f64>().ok().filter(|v| v.is_finite())
}
