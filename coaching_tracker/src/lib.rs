mod config;
use log::{debug, info, warn};

use chrono::Datelike;
use std::collections::{BTreeMap, HashSet};

pub use crate::config::*;

pub mod builder;
pub mod columns;
pub mod comments;
pub mod data;
pub mod manual;
pub mod views;

use crate::columns::{extract_people_fields, PeopleColumns};
use crate::comments::clean_comment;
use crate::data::*;

// **** Prompts ****

pub const AREAS_SYSTEM_PROMPT: &str = "You are a QA coaching assistant.\n\
From the raw comments, output only improvement issues.\n\
- Each issue: a unique, very short phrase or one short sentence.\n\
- Merge duplicates; avoid filler and repetition.\n\
- No strengths, no generic advice, no checklists.\n\
- If no improvements, respond exactly: \"Analyst performed well. No improvement as of now.\"";

pub fn areas_user_prompt(observations: &str) -> String {
    format!(
        "Raw observations (cleaned): {}\n\
         Write only 2-3 sentences focusing on specific improvement actions and missed steps. \
         Avoid strengths, disclaimers, or generic best practices. \
         Do not include personally identifiable customer data.",
        observations
    )
}

// **** Private structures ****

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
enum SourceKind {
    Manual,
    ServiceNow,
}

/// Everything collected about one employee during the week.
#[derive(PartialEq, Debug, Clone, Default)]
struct EmployeeAggregate {
    team_leads: Vec<String>,
    assessors: Vec<String>,
    comments: Vec<String>,
    sn_ratings: Vec<CellValue>,
    manual_grades: Vec<CellValue>,
}

fn cell<'a>(row: &'a [CellValue], idx: Option<usize>) -> Option<&'a CellValue> {
    idx.and_then(|i| row.get(i)).filter(|c| !c.is_empty())
}

/// The rows of the sheet that belong to the tracked week.
///
/// A week column takes precedence over a date column. Without either, every
/// row is kept.
fn rows_in_period<'a>(
    sheet: &'a Sheet,
    cols: &PeopleColumns,
    period: &Period,
) -> Vec<&'a Vec<CellValue>> {
    let res: Vec<&Vec<CellValue>> = match (cols.week, cols.date) {
        (Some(week_idx), _) => sheet
            .rows
            .iter()
            .filter(|row| {
                cell(row, Some(week_idx)).and_then(week_number) == Some(period.week())
            })
            .collect(),
        (None, Some(date_idx)) => sheet
            .rows
            .iter()
            .filter(|row| match cell(row, Some(date_idx)).and_then(to_date) {
                Some(d) => d.month() == period.month() && week_of_month(d) == period.week(),
                None => false,
            })
            .collect(),
        (None, None) => {
            warn!(
                "{}: no week or date column, keeping all {} rows",
                sheet.source,
                sheet.rows.len()
            );
            sheet.rows.iter().collect()
        }
    };
    debug!(
        "rows_in_period: {}: {} of {} rows in {:?}",
        sheet.source,
        res.len(),
        sheet.rows.len(),
        period
    );
    res
}

fn accumulate(
    aggs: &mut BTreeMap<String, EmployeeAggregate>,
    sheet: &Sheet,
    period: &Period,
    kind: SourceKind,
) {
    let cols = extract_people_fields(sheet);
    if cols.name.is_none() {
        warn!("{}: no employee name column found, skipping", sheet.source);
        return;
    }
    for row in rows_in_period(sheet, &cols, period) {
        let name = match cell(row, cols.name).and_then(build_employee_key) {
            Some(n) => n,
            None => continue,
        };
        let agg = aggs.entry(name).or_default();
        if let Some(tl) = cell(row, cols.team_lead) {
            agg.team_leads.push(tl.as_text());
        }
        if let Some(qa) = cell(row, cols.assessor) {
            agg.assessors.push(qa.as_text());
        }
        if let Some(cm) = cell(row, cols.comments) {
            agg.comments.push(cm.as_text());
        }
        match kind {
            SourceKind::ServiceNow => {
                if let Some(r) = cell(row, cols.sn_rating) {
                    agg.sn_ratings.push(r.clone());
                }
            }
            SourceKind::Manual => {
                if let Some(g) = cell(row, cols.manual_grade) {
                    agg.manual_grades.push(g.clone());
                }
            }
        }
    }
}

/// The most frequent value. The first one seen wins ties.
fn majority(values: &[String]) -> Option<String> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for v in values.iter().map(|v| v.trim()).filter(|v| !v.is_empty()) {
        match counts.iter_mut().find(|(k, _)| k.as_str() == v) {
            Some(entry) => entry.1 += 1,
            None => counts.push((v.to_string(), 1)),
        }
    }
    let mut best: Option<(String, usize)> = None;
    for (k, c) in counts {
        if best.as_ref().map(|(_, bc)| c > *bc).unwrap_or(true) {
            best = Some((k, c));
        }
    }
    best.map(|(k, _)| k)
}

fn unique_sorted(values: &[String]) -> String {
    let set: HashSet<&str> = values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .collect();
    let mut l: Vec<&str> = set.into_iter().collect();
    l.sort_unstable();
    l.join(", ")
}

/// Asks the model for the areas to improve of one employee.
///
/// The comments are cleaned first. When nothing is left the model is not
/// called. Completion failures give an empty text.
pub fn synthesize_areas_to_improve(comments: &[String], completer: &mut dyn Completer) -> String {
    let cleaned: Vec<String> = comments
        .iter()
        .map(|c| clean_comment(c))
        .filter(|c| !c.is_empty())
        .collect();
    if cleaned.is_empty() {
        return "".to_string();
    }
    let messages = vec![
        ChatMessage::system(AREAS_SYSTEM_PROMPT),
        ChatMessage::user(&areas_user_prompt(&cleaned.join(" "))),
    ];
    match completer.complete(&messages) {
        Ok(text) => text.trim().to_string(),
        Err(e) => {
            warn!("synthesize_areas_to_improve: {}", e);
            "".to_string()
        }
    }
}

/// Builds the weekly tracker out of the manual assessments and the ServiceNow
/// export.
///
/// Arguments:
/// * `manual` the sheets of manual assessments (grades are read from these)
/// * `service_now` the sheets of the ServiceNow export (ratings are read from these)
/// * `period` the tracked week
/// * `completer` the model used to summarize the comments
///
/// Returns one row per employee, sorted by employee key.
pub fn generate_tracker(
    manual: &[Sheet],
    service_now: &[Sheet],
    period: &Period,
    completer: &mut dyn Completer,
) -> Vec<TrackerRow> {
    info!(
        "Generating tracker for {}: {} manual sheets, {} ServiceNow sheets",
        period.label(),
        manual.len(),
        service_now.len()
    );
    let mut aggs: BTreeMap<String, EmployeeAggregate> = BTreeMap::new();
    for sheet in manual {
        accumulate(&mut aggs, sheet, period, SourceKind::Manual);
    }
    for sheet in service_now {
        accumulate(&mut aggs, sheet, period, SourceKind::ServiceNow);
    }
    info!("Found {} employees", aggs.len());

    let mut res: Vec<TrackerRow> = Vec::new();
    for (name, agg) in aggs.iter() {
        debug!("generate_tracker: {}: {:?}", name, agg);
        let sn_ratings: Vec<f64> = agg.sn_ratings.iter().filter_map(to_numeric).collect();
        let manual_count = agg.manual_grades.len();
        let areas = synthesize_areas_to_improve(&agg.comments, completer);
        res.push(TrackerRow {
            employee_name: name.clone(),
            team_lead: majority(&agg.team_leads).unwrap_or_default(),
            quality_assessors: unique_sorted(&agg.assessors),
            week: period.label(),
            service_now_count: Some(sn_ratings.len()).filter(|c| *c > 0),
            service_now_average: mean_rounded(&sn_ratings),
            manual_count: Some(manual_count).filter(|c| *c > 0),
            manual_average: average_of_grades(&agg.manual_grades),
            areas_to_improve: areas,
            ..TrackerRow::default()
        });
    }
    res
}
