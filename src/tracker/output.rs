use std::io::Write;

use coaching_tracker::columns::pick_first_available_column;
use coaching_tracker::data::to_numeric;
use coaching_tracker::views::*;
use serde_json::json;
use serde_json::Map as JSMap;

use crate::tracker::io_common::cell_from_text;
use crate::tracker::*;

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum OutputFormat {
    Json,
    Csv,
    Text,
}

pub fn parse_format(s: &str) -> TrackerResult<OutputFormat> {
    match s.trim().to_lowercase().as_str() {
        "json" => Ok(OutputFormat::Json),
        "csv" => Ok(OutputFormat::Csv),
        "text" | "txt" => Ok(OutputFormat::Text),
        _ => UnknownFormatSnafu { format: s }.fail(),
    }
}

/// The quick views that can be printed after a run.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum View {
    Table,
    Categories,
    Category,
    TopWeek,
    TopMonth,
    NeedsImprovement,
}

pub fn parse_view(s: &str) -> TrackerResult<View> {
    match s.trim().to_lowercase().replace('_', "-").as_str() {
        "table" => Ok(View::Table),
        "categories" => Ok(View::Categories),
        "category" => Ok(View::Category),
        "top-week" => Ok(View::TopWeek),
        "top-month" => Ok(View::TopMonth),
        "needs-improvement" => Ok(View::NeedsImprovement),
        _ => UnknownViewSnafu { view: s }.fail(),
    }
}

/// `stdout` and the empty string send the tracker to the standard output.
pub fn is_file_output(out: &str) -> bool {
    !(out.is_empty() || out == "stdout")
}

pub fn tracker_to_json(tracker_name: Option<&str>, period: &Period, rows: &[TrackerRow]) -> JSValue {
    let js_rows: Vec<JSValue> = rows
        .iter()
        .map(|row| {
            let mut m: JSMap<String, JSValue> = JSMap::new();
            for (col, text) in TRACKER_COLUMNS.iter().zip(row.cells()) {
                m.insert(col.to_string(), json!(text));
            }
            // Counts and averages stay numbers when present.
            let numbers = [
                (TRACKER_COLUMNS[7], row.service_now_count.map(|c| json!(c))),
                (TRACKER_COLUMNS[8], row.service_now_average.map(|a| json!(a))),
                (TRACKER_COLUMNS[9], row.manual_count.map(|c| json!(c))),
                (TRACKER_COLUMNS[10], row.manual_average.map(|a| json!(a))),
            ];
            for (col, v) in numbers {
                if let Some(v) = v {
                    m.insert(col.to_string(), v);
                }
            }
            JSValue::Object(m)
        })
        .collect();
    json!({
        "config": {"trackerName": tracker_name, "week": period.label()},
        "rows": js_rows
    })
}

fn write_csv<W: Write>(rows: &[TrackerRow], w: W) -> TrackerResult<W> {
    let mut wtr = csv::Writer::from_writer(w);
    wtr.write_record(TRACKER_COLUMNS.iter())
        .context(CsvWriteSnafu {})?;
    for row in rows {
        wtr.write_record(row.cells()).context(CsvWriteSnafu {})?;
    }
    match wtr.into_inner() {
        Ok(w) => Ok(w),
        Err(e) => Err(e.into_error()).context(WritingOutputSnafu { path: "csv" }),
    }
}

/// An aligned text table. Long cells are not wrapped.
pub fn render_text_table(headers: &[&str], lines: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for line in lines {
        for (idx, cell) in line.iter().enumerate() {
            if idx < widths.len() {
                widths[idx] = widths[idx].max(cell.chars().count());
            }
        }
    }
    let format_line = |cells: Vec<&str>| -> String {
        let padded: Vec<String> = cells
            .iter()
            .zip(widths.iter())
            .map(|(c, w)| format!("{:<width$}", c, width = *w))
            .collect();
        format!("{}\n", padded.join(" | ").trim_end())
    };
    let mut res = format_line(headers.to_vec());
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    res.push_str(&format!("{}\n", rule.join("-+-")));
    for line in lines {
        res.push_str(&format_line(line.iter().map(|s| s.as_str()).collect()));
    }
    res
}

/// The tracker in the requested format.
pub fn render_tracker(
    rows: &[TrackerRow],
    tracker_js: &JSValue,
    format: OutputFormat,
) -> TrackerResult<String> {
    let res = match format {
        OutputFormat::Json => {
            let mut s = serde_json::to_string_pretty(tracker_js).context(SerializingJsonSnafu {})?;
            s.push('\n');
            s
        }
        OutputFormat::Csv => {
            let bytes = write_csv(rows, Vec::new())?;
            String::from_utf8_lossy(&bytes).to_string()
        }
        OutputFormat::Text => {
            let lines: Vec<Vec<String>> = rows.iter().map(|r| r.cells()).collect();
            render_text_table(&TRACKER_COLUMNS, &lines)
        }
    };
    Ok(res)
}

pub fn write_tracker(
    rows: &[TrackerRow],
    tracker_js: &JSValue,
    format: OutputFormat,
    path: &str,
) -> TrackerResult<()> {
    let contents = render_tracker(rows, tracker_js, format)?;
    fs::write(path, contents).context(WritingOutputSnafu { path })?;
    info!("Tracker written to {}", path);
    Ok(())
}

// ********* Saved trackers ***********

fn row_from_fields<F: Fn(&str) -> String>(get: F) -> TrackerRow {
    let count = |col: &str| {
        to_numeric(&cell_from_text(&get(col)))
            .filter(|c| c.fract() == 0.0 && *c > 0.0)
            .map(|c| c as usize)
    };
    let avg = |col: &str| to_numeric(&cell_from_text(&get(col)));
    TrackerRow {
        employee_name: get(TRACKER_COLUMNS[0]),
        emp_id: get(TRACKER_COLUMNS[1]),
        organization: get(TRACKER_COLUMNS[2]),
        team_lead: get(TRACKER_COLUMNS[3]),
        status: get(TRACKER_COLUMNS[4]),
        quality_assessors: get(TRACKER_COLUMNS[5]),
        week: get(TRACKER_COLUMNS[6]),
        service_now_count: count(TRACKER_COLUMNS[7]),
        service_now_average: avg(TRACKER_COLUMNS[8]),
        manual_count: count(TRACKER_COLUMNS[9]),
        manual_average: avg(TRACKER_COLUMNS[10]),
        areas_to_improve: get(TRACKER_COLUMNS[11]),
        quality_parameter_category: get(TRACKER_COLUMNS[12]),
    }
}

fn js_text(v: Option<&JSValue>) -> String {
    match v {
        Some(JSValue::String(s)) => s.trim().to_string(),
        Some(JSValue::Number(n)) => n.to_string(),
        Some(JSValue::Bool(b)) => b.to_string(),
        _ => "".to_string(),
    }
}

/// Reads back the rows of a tracker written by an earlier run: the JSON
/// output, or any csv/xlsx sheet with the tracker columns.
pub fn read_saved_tracker(path: &str) -> TrackerResult<Vec<TrackerRow>> {
    info!("Reading saved tracker {:?}", path);
    let cfs = FileSource {
        provider: "tracker".to_string(),
        file_path: path.to_string(),
        file_type: None,
        excel_worksheet_name: None,
    };
    let is_json = path.to_lowercase().ends_with(".json");
    let sheet = match (is_json, cfs.file_type()) {
        (true, _) => return read_saved_json(path),
        (false, Ok(FileType::Csv)) => io_csv::read_csv_sheet(path)?,
        (false, Ok(FileType::Excel)) => io_excel::read_excel_sheet(path, None)?,
        (false, Err(e)) => return Err(e),
    };
    Ok(rows_from_sheet(&sheet))
}

fn read_saved_json(path: &str) -> TrackerResult<Vec<TrackerRow>> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(&contents).context(ParsingJsonSnafu { path })?;
    let rows_js = match &js {
        JSValue::Array(l) => l.clone(),
        JSValue::Object(m) => match m.get("rows") {
            Some(JSValue::Array(l)) => l.clone(),
            _ => whatever!("{}: no rows found in the saved tracker", path),
        },
        _ => whatever!("{}: no rows found in the saved tracker", path),
    };
    Ok(rows_js
        .iter()
        .map(|r| row_from_fields(|col| js_text(r.get(col))))
        .collect())
}

pub fn rows_from_sheet(sheet: &Sheet) -> Vec<TrackerRow> {
    let indexes: Vec<(&str, Option<usize>)> = TRACKER_COLUMNS
        .iter()
        .map(|col| (*col, pick_first_available_column(&sheet.headers, &[*col])))
        .collect();
    debug!("rows_from_sheet: {}: {:?}", sheet.source, indexes);
    sheet
        .rows
        .iter()
        .map(|row| {
            row_from_fields(|col| {
                indexes
                    .iter()
                    .find(|(c, _)| *c == col)
                    .and_then(|(_, idx)| idx.and_then(|i| row.get(i)))
                    .map(|cell| cell.as_text().trim().to_string())
                    .unwrap_or_default()
            })
        })
        .filter(|r| !r.employee_name.is_empty())
        .collect()
}

// ********* Quick views ***********

fn score_text(x: f64) -> String {
    format!("{:.2}", x)
}

/// The text of a quick view.
///
/// `weeks` holds the weekly trackers of the month, the tracked week last.
pub fn render_view(view: &View, period: &Period, weeks: &[Vec<TrackerRow>], category: Option<&str>) -> String {
    let empty: Vec<TrackerRow> = Vec::new();
    let rows = weeks.last().unwrap_or(&empty);
    match view {
        View::Table => {
            let lines: Vec<Vec<String>> = rows.iter().map(|r| r.cells()).collect();
            render_text_table(&TRACKER_COLUMNS, &lines)
        }
        View::Categories => {
            let counts = category_counts(rows);
            if counts.is_empty() {
                return "No missing quality parameters.\n".to_string();
            }
            let lines: Vec<Vec<String>> = counts
                .iter()
                .map(|c| vec![c.category.clone(), c.count.to_string()])
                .collect();
            render_text_table(&["Quality Parameter Category", "Count"], &lines)
        }
        View::Category => {
            let category = category.unwrap_or_default();
            let selected = rows_in_category(rows, category);
            if selected.is_empty() {
                return format!("No agents in category {:?}.\n", category);
            }
            let lines: Vec<Vec<String>> = missing_criteria(&selected)
                .into_iter()
                .map(|m| {
                    vec![
                        m.employee_name,
                        m.team_lead,
                        m.quality_assessors,
                        m.areas_to_improve,
                    ]
                })
                .collect();
            render_text_table(
                &["Employee Name", "Team Lead", "Quality Assessors", "Areas to Improve"],
                &lines,
            )
        }
        View::TopWeek => {
            let top = top_performers_week(rows);
            if top.is_empty() {
                return format!("No agents for {}.\n", period.label());
            }
            let lines: Vec<Vec<String>> = top
                .iter()
                .map(|(r, score)| vec![r.employee_name.clone(), r.team_lead.clone(), score_text(*score)])
                .collect();
            format!(
                "Top performer of {}\n{}",
                period.label(),
                render_text_table(&["Employee Name", "Team Lead", "Score"], &lines)
            )
        }
        View::TopMonth => {
            let top = top_performers_month(weeks);
            if top.is_empty() {
                return "No agents for the month.\n".to_string();
            }
            let lines: Vec<Vec<String>> = top
                .iter()
                .map(|(name, score)| vec![name.clone(), score_text(*score)])
                .collect();
            format!(
                "Top performer over {} weeks\n{}",
                weeks.len(),
                render_text_table(&["Employee Name", "Total Score"], &lines)
            )
        }
        View::NeedsImprovement => {
            let selected = needs_improvement(rows);
            if selected.is_empty() {
                return "No agents need improvement.\n".to_string();
            }
            let lines: Vec<Vec<String>> = selected
                .iter()
                .map(|r| {
                    vec![
                        r.employee_name.clone(),
                        r.team_lead.clone(),
                        r.quality_parameter_category.clone(),
                        r.areas_to_improve.clone(),
                    ]
                })
                .collect();
            render_text_table(
                &[
                    "Employee Name",
                    "Team Lead",
                    "Quality Parameter Category",
                    "Areas to Improve",
                ],
                &lines,
            )
        }
    }
}
