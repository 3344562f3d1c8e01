//! Console table and CSV rendering of a ranking.

use crate::report::RankedEntry;
use crate::{HarvestError, Result};
use csv::Writer;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::{debug, info};

/// The CSV header row.
pub const CSV_HEADER: [&str; 4] = ["skill", "mention_count", "frequency_percent", "source"];

const TABLE_HEADER: [&str; 4] = ["Skill", "Source", "Description", "Share of postings (%)"];
const COLUMN_WIDTHS: [usize; 4] = [22, 19, 29, 23];

fn border() -> String {
    let mut line = String::from("+");
    for width in COLUMN_WIDTHS {
        line.push_str(&"-".repeat(width + 2));
        line.push('+');
    }
    line
}

/// Renders the ranking as a bordered, fixed-width text table.
///
/// # Arguments
///
/// * `entries` - The ranked entries, already ordered.
/// * `precision` - Decimals shown for the percentage column.
pub fn render_table(entries: &[RankedEntry], precision: usize) -> String {
    let [w_name, w_source, w_desc, w_freq] = COLUMN_WIDTHS;
    let border = border();
    let mut lines = Vec::with_capacity(entries.len() + 4);

    lines.push(border.clone());
    lines.push(format!(
        "| {:<w_name$} | {:<w_source$} | {:<w_desc$} | {:<w_freq$} |",
        TABLE_HEADER[0], TABLE_HEADER[1], TABLE_HEADER[2], TABLE_HEADER[3],
    ));
    lines.push(border.clone());
    for entry in entries {
        // The trailing '%' takes one column of the last cell.
        lines.push(format!(
            "| {:<w_name$} | {:<w_source$} | {:<w_desc$} | {:>width$.precision$}% |",
            entry.name,
            entry.source,
            entry.description,
            entry.percent,
            width = w_freq - 1,
        ));
    }
    lines.push(border);

    lines.join("\n")
}

/// Writes the ranking to `path` as CSV, replacing any existing file.
///
/// Percentages are written with two decimals and a `.` separator.
pub fn write_csv(path: impl AsRef<Path>, entries: &[RankedEntry]) -> Result<()> {
    let path = path.as_ref();
    let io_error = |source| HarvestError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(io_error)?;
    let mut writer = Writer::from_writer(BufWriter::new(file));

    writer.write_record(CSV_HEADER)?;
    for entry in entries {
        let count = entry.count.to_string();
        let percent = format!("{:.2}", entry.percent);
        writer.write_record([&entry.name, &count, &percent, &entry.source])?;
    }
    writer.flush().map_err(io_error)?;

    debug!("Wrote {} rows", entries.len());
    info!("Data saved to file: {}", path.display());
    Ok(())
}
