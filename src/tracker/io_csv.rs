// Primitives for reading CSV files.

use coaching_tracker::builder::SheetBuilder;

use crate::tracker::io_common::{cell_from_text, header_name, simplify_file_name};
use crate::tracker::*;

/// Reads a CSV file whose first line holds the column names. Lines may have
/// fewer or more fields than the header.
pub fn read_csv_sheet(path: &str) -> TrackerResult<Sheet> {
    let rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;
    let source = simplify_file_name(path);
    let mut records = rdr.into_records();

    let header = match records.next() {
        Some(line_r) => line_r.context(CsvLineParseSnafu { path, lineno: 1usize })?,
        None => {
            warn!("read_csv_sheet: {}: empty file", path);
            return Ok(SheetBuilder::with_headers(&source, Vec::new()).build());
        }
    };
    let headers: Vec<String> = header
        .iter()
        .map(|s| header_name(&cell_from_text(s)))
        .collect();
    debug!("read_csv_sheet: header: {:?}", headers);

    let mut builder = SheetBuilder::with_headers(&source, headers);
    for (idx, line_r) in records.enumerate() {
        // The header is line 1.
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu { path, lineno })?;
        builder.add_row(line.iter().map(cell_from_text).collect());
    }
    debug!("read_csv_sheet: {}: {} rows", path, builder.num_rows());
    Ok(builder.build())
}
