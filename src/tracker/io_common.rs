use std::path::Path;

use calamine::DataType;
use coaching_tracker::data::excel_serial_to_date;
use coaching_tracker::CellValue;

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

/// Converts a spreadsheet cell.
pub fn cell_from_calamine(cell: &DataType) -> CellValue {
    match cell {
        DataType::String(s) if s.trim().is_empty() => CellValue::Empty,
        DataType::String(s) => CellValue::Text(s.clone()),
        DataType::Float(f) => CellValue::Number(*f),
        DataType::Int(i) => CellValue::Number(*i as f64),
        DataType::Bool(b) => CellValue::Bool(*b),
        DataType::DateTime(f) => match excel_serial_to_date(*f) {
            Some(d) => CellValue::Date(d),
            None => CellValue::Number(*f),
        },
        // Errors (#N/A, #REF!, ...) carry no information for the tracker.
        _ => CellValue::Empty,
    }
}

/// Converts a CSV field. Numbers are recognized, everything else stays text.
pub fn cell_from_text(s: &str) -> CellValue {
    let t = s.trim();
    if t.is_empty() {
        return CellValue::Empty;
    }
    match t.parse::<f64>() {
        Ok(f) if f.is_finite() => CellValue::Number(f),
        _ => CellValue::Text(s.to_string()),
    }
}

/// The name of a header cell. Line breaks inside headers are common in
/// exported workbooks.
pub fn header_name(cell: &CellValue) -> String {
    cell.as_text()
        .trim_start_matches('\u{feff}')
        .replace(['\n', '\r'], " ")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn calamine_cells() {
        assert_eq!(
            cell_from_calamine(&DataType::String("Jane".to_string())),
            CellValue::Text("Jane".to_string())
        );
        assert_eq!(
            cell_from_calamine(&DataType::String("  ".to_string())),
            CellValue::Empty
        );
        assert_eq!(cell_from_calamine(&DataType::Int(4)), CellValue::Number(4.0));
        assert_eq!(
            cell_from_calamine(&DataType::DateTime(45355.5)),
            CellValue::Date(NaiveDate::from_ymd_opt(2024, 3, 4).unwrap())
        );
        assert_eq!(cell_from_calamine(&DataType::Empty), CellValue::Empty);
    }

    #[test]
    fn text_cells() {
        assert_eq!(cell_from_text(" 4.5 "), CellValue::Number(4.5));
        assert_eq!(cell_from_text("B+"), CellValue::Text("B+".to_string()));
        assert_eq!(cell_from_text("nan"), CellValue::Text("nan".to_string()));
        assert_eq!(cell_from_text(""), CellValue::Empty);
    }

    #[test]
    fn header_names() {
        assert_eq!(
            header_name(&CellValue::Text(" Trainee\nRating ".to_string())),
            "Trainee Rating"
        );
        assert_eq!(header_name(&CellValue::Number(2.0)), "2");
        assert_eq!(simplify_file_name("/data/week2/manual.xlsx"), "manual.xlsx");
    }
}
