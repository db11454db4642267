//! Resolution of loosely named spreadsheet columns.
//!
//! The assessment workbooks are filled by hand and exported from different
//! tools, so the same field shows up as `Team Lead`, `team leader` or `TL`.
//! Each field has an ordered list of candidate names, matched first on the
//! lowercase name and then on its letters only.

use log::debug;
use std::collections::HashMap;

use crate::config::Sheet;

pub const EMPLOYEE_NAME: &[&str] = &["Employee Name", "Analyst Name", "Trainee", "Analyst", "Name"];
pub const TRAINEE_NAME: &[&str] = &[
    "Trainee",
    "Trainee Name",
    "Analyst Name",
    "Employee Name",
    "Analyst",
];
pub const ANALYST_NAME: &[&str] = &["Analyst Name", "Employee Name", "Analyst"];
pub const TEAM_LEAD: &[&str] = &["Team Lead", "Team Leader", "TL", "Manager", "Reporting Manager"];
pub const MANAGER: &[&str] = &["Manager", "Reporting Manager", "Supervisor"];
pub const QUALITY_ASSESSOR: &[&str] = &[
    "Assessor",
    "Quality Assessor",
    "QA",
    "Quality Analyst",
    "Analyst Name",
    "Coach",
];
pub const WEEK: &[&str] = &["Week", "Week Number", "Week_of_Month", "WOM"];
pub const DATE: &[&str] = &["Date", "Assessed On", "Created", "Assessment Date"];
pub const SN_RATING: &[&str] = &["Trainee rating", "Trainee Rating", "Rating"];
pub const MANUAL_GRADE: &[&str] = &["Grade", "Score", "Marks"];
pub const COMMENTS: &[&str] = &["Comments", "Notes", "QA Comments", "Reviewer Comments"];

fn norm(s: &str) -> String {
    s.trim().to_lowercase()
}

fn norm_simple(s: &str) -> String {
    norm(s).chars().filter(|c| c.is_ascii_lowercase()).collect()
}

/// Finds the first header matching one of the candidates.
///
/// All the candidates are tried on the lowercase names before any of them is
/// tried on the letters-only names, so the order of the candidates wins over
/// the order of the columns. When several headers share a key, the leftmost
/// one is used.
pub fn pick_first_available_column(headers: &[String], candidates: &[&str]) -> Option<usize> {
    pick_first_available_column_except(headers, candidates, None)
}

/// Same as [pick_first_available_column], never returning the `excluded`
/// column.
pub fn pick_first_available_column_except(
    headers: &[String],
    candidates: &[&str],
    excluded: Option<usize>,
) -> Option<usize> {
    let mut lower_map: HashMap<String, usize> = HashMap::new();
    let mut simple_map: HashMap<String, usize> = HashMap::new();
    for (idx, h) in headers.iter().enumerate() {
        if Some(idx) == excluded {
            continue;
        }
        lower_map.entry(norm(h)).or_insert(idx);
        simple_map.entry(norm_simple(h)).or_insert(idx);
    }
    for cand in candidates {
        if let Some(idx) = lower_map.get(&norm(cand)) {
            return Some(*idx);
        }
    }
    for cand in candidates {
        if let Some(idx) = simple_map.get(&norm_simple(cand)) {
            return Some(*idx);
        }
    }
    None
}

/// The columns of an assessment sheet that the tracker reads.
///
/// Any of them may be missing, in which case the corresponding fields stay
/// empty.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
pub struct PeopleColumns {
    pub name: Option<usize>,
    pub team_lead: Option<usize>,
    pub assessor: Option<usize>,
    pub week: Option<usize>,
    pub date: Option<usize>,
    pub sn_rating: Option<usize>,
    pub manual_grade: Option<usize>,
    pub comments: Option<usize>,
}

pub fn extract_people_fields(sheet: &Sheet) -> PeopleColumns {
    if sheet.is_empty() {
        return PeopleColumns::default();
    }
    let pick = |cands: &[&str]| pick_first_available_column(&sheet.headers, cands);

    let name = pick(EMPLOYEE_NAME)
        .or_else(|| pick(TRAINEE_NAME))
        .or_else(|| pick(ANALYST_NAME));
    // `Analyst Name` is both a name and an assessor candidate. The assessor
    // never reuses the name column.
    let assessor = pick_first_available_column_except(&sheet.headers, QUALITY_ASSESSOR, name);

    let cols = PeopleColumns {
        name,
        team_lead: pick(TEAM_LEAD).or_else(|| pick(MANAGER)),
        assessor,
        week: pick(WEEK),
        date: pick(DATE),
        sn_rating: pick(SN_RATING),
        manual_grade: pick(MANUAL_GRADE),
        comments: pick(COMMENTS),
    };
    debug!(
        "extract_people_fields: {}: headers {:?} -> {:?}",
        sheet.source, sheet.headers, cols
    );
    cols
}
