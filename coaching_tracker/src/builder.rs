pub use crate::config::*;

/// A builder for assembling sheets row by row.
///
/// The spreadsheet readers use it, and it is the simplest way to feed the
/// tracker from other sources.
///
/// ```
/// use coaching_tracker::builder::SheetBuilder;
///
/// let mut builder = SheetBuilder::new("manual.xlsx", &["Employee Name", "Week", "Grade"]);
/// builder.add_text_row(&["Jane Doe", "2", "A-"]);
/// let sheet = builder.build();
///
/// assert_eq!(sheet.rows.len(), 1);
/// ```
pub struct SheetBuilder {
    pub(crate) _source: String,
    pub(crate) _headers: Vec<String>,
    pub(crate) _rows: Vec<Vec<CellValue>>,
}

impl SheetBuilder {
    pub fn new(source: &str, headers: &[&str]) -> SheetBuilder {
        SheetBuilder::with_headers(source, headers.iter().map(|s| s.to_string()).collect())
    }

    pub fn with_headers(source: &str, headers: Vec<String>) -> SheetBuilder {
        SheetBuilder {
            _source: source.to_string(),
            _headers: headers,
            _rows: Vec::new(),
        }
    }

    /// Adds a row of text cells. Blank strings become empty cells.
    pub fn add_text_row(&mut self, cells: &[&str]) {
        let row = cells
            .iter()
            .map(|s| {
                if s.trim().is_empty() {
                    CellValue::Empty
                } else {
                    CellValue::Text(s.to_string())
                }
            })
            .collect();
        self.add_row(row)
    }

    /// Adds a row of already converted cells.
    ///
    /// Trailing empty cells are dropped; readers of the sheet treat missing
    /// cells as empty.
    pub fn add_row(&mut self, mut cells: Vec<CellValue>) {
        while matches!(cells.last(), Some(CellValue::Empty)) {
            cells.pop();
        }
        // Fully blank lines are common at the bottom of exported workbooks.
        if cells.is_empty() {
            return;
        }
        self._rows.push(cells);
    }

    pub fn num_rows(&self) -> usize {
        self._rows.len()
    }

    pub fn build(self) -> Sheet {
        Sheet {
            source: self._source,
            headers: self._headers,
            rows: self._rows,
        }
    }
}
