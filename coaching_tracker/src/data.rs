//! Coercions of raw cells: names, dates, week numbers and grades.

use chrono::{Datelike, Duration, NaiveDate};

use crate::config::CellValue;

/// Trimmed text of a cell, or `None` when there is nothing in it.
pub fn normalize_text(cell: &CellValue) -> Option<String> {
    match cell {
        CellValue::Empty => None,
        CellValue::Number(f) if !f.is_finite() => None,
        c => {
            let s = c.as_text().trim().to_string();
            if s.is_empty() {
                None
            } else {
                Some(s)
            }
        }
    }
}

/// The key identifying an employee across both sources.
///
/// Whitespace is collapsed and every word is capitalized, so that
/// `"  jane   DOE"` and `"Jane Doe"` are the same person.
pub fn build_employee_key(cell: &CellValue) -> Option<String> {
    let s = normalize_text(cell)?;
    let words: Vec<String> = s
        .split_whitespace()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(|c| c.to_lowercase()))
                    .collect(),
                None => String::new(),
            }
        })
        .collect();
    Some(words.join(" "))
}

/// Week of the month, where weeks start on Monday and the first week is the
/// one containing the first day of the month.
pub fn week_of_month(date: NaiveDate) -> u32 {
    let first_weekday = date
        .with_day(1)
        .map(|d| d.weekday().num_days_from_monday())
        .unwrap_or(0);
    (date.day() + first_weekday + 6) / 7
}

const EXCEL_MAX_SERIAL: f64 = 2_958_465.0;

/// Converts an Excel serial date (days since 1899-12-30) to a date.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 || serial > EXCEL_MAX_SERIAL {
        return None;
    }
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_signed(Duration::days(serial.floor() as i64))
}

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%d-%b-%Y",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%b %d %Y",
];

fn parse_date_text(s: &str) -> Option<NaiveDate> {
    // US dates with a two-digit year, e.g. 3/4/24.
    let parts: Vec<&str> = s.split('/').collect();
    if parts.len() == 3 && parts[0].len() <= 2 && parts[2].len() == 2 {
        return NaiveDate::parse_from_str(s, "%m/%d/%y").ok();
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// Reads a date out of a cell. Returns `None` for anything that does not
/// look like a date.
pub fn to_date(cell: &CellValue) -> Option<NaiveDate> {
    match cell {
        CellValue::Date(d) => Some(*d),
        CellValue::Number(f) => excel_serial_to_date(*f),
        CellValue::Text(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            parse_date_text(s).or_else(|| {
                // Date-times: only the date part matters.
                let head = s.split(|c: char| c == ' ' || c == 'T').next()?;
                parse_date_text(head)
            })
        }
        _ => None,
    }
}

/// The first number written in a week cell (`"Week 2"`, `"W2"`, `2`).
pub fn week_number(cell: &CellValue) -> Option<u32> {
    let text = normalize_text(cell)?;
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse::<u32>().ok()
}

/// Numeric value of a cell: numbers as-is, text parsed as a float.
pub fn to_numeric(cell: &CellValue) -> Option<f64> {
    let v = match cell {
        CellValue::Number(f) => Some(*f),
        CellValue::Text(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    v.filter(|f| f.is_finite())
}

/// Score of a letter grade on the 0-5 scale used by the manual assessments.
pub fn letter_grade_to_score(cell: &CellValue) -> Option<f64> {
    let s = match cell {
        CellValue::Text(s) => s.trim().to_uppercase(),
        _ => return None,
    };
    let score = match s.as_str() {
        "A+" | "A" => 5.0,
        "A-" => 4.7,
        "B+" => 4.3,
        "B" => 4.0,
        "B-" => 3.7,
        "C+" => 3.3,
        "C" => 3.0,
        "C-" => 2.7,
        "D+" => 2.3,
        "D" => 2.0,
        "D-" => 1.7,
        "E" => 1.0,
        "F" => 0.0,
        _ => return None,
    };
    Some(score)
}

/// Rounds to 2 decimals. The exact binary value is rounded, and exact ties go
/// to the even digit: 4.125 gives 4.12 and 0.375 gives 0.38.
pub fn round2(x: f64) -> f64 {
    if !x.is_finite() {
        return x;
    }
    format!("{:.2}", x).parse().unwrap_or(x)
}

/// Mean of the values rounded to 2 decimals, `None` for an empty slice.
pub fn mean_rounded(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(round2(values.iter().sum::<f64>() / values.len() as f64))
    }
}

/// Average grade of a set of cells.
///
/// If at least one cell is numeric, only the numeric cells count. Otherwise
/// the letter grades are converted to scores.
pub fn average_of_grades(cells: &[CellValue]) -> Option<f64> {
    let numeric: Vec<f64> = cells.iter().filter_map(to_numeric).collect();
    if !numeric.is_empty() {
        return mean_rounded(&numeric);
    }
    let mapped: Vec<f64> = cells.iter().filter_map(letter_grade_to_score).collect();
    mean_rounded(&mapped)
}
