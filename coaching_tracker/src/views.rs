//! The data behind the quick views of a tracker: quality parameter
//! categories, top performers and the agents needing improvement.

use log::{debug, info, warn};
use std::collections::HashMap;

use crate::config::*;

/// The answer given when the comments contain nothing to improve.
pub const NO_IMPROVEMENT_TEXT: &str = "Analyst performed well. No improvement as of now.";

pub const OTHER_CATEGORY: &str = "Other";

/// Quality parameter categories, with the keywords that point to them.
///
/// The order matters: ties between categories go to the first one listed.
pub const QUALITY_CATEGORIES: &[(&str, &[&str])] = &[
    (
        "Call Opening & Closing",
        &["call opening", "opening", "closing", "greet", "introduc"],
    ),
    (
        "Probing & Troubleshooting",
        &["probing", "probe", "troubleshoot", "question", "issue context", "root cause"],
    ),
    (
        "Ticket Documentation",
        &[
            "ticket",
            "documentation",
            "document",
            "work note",
            "short description",
            "configuration item",
            "screenshot",
            "computer name",
            "bomgar",
            "notes",
        ],
    ),
    (
        "Empathy & Tone",
        &["empathy", "assurance", "tone", "professional", "courteous", "apolog", "rapport"],
    ),
    ("Hold Procedure", &["hold", "dead air", "mute"]),
    (
        "Escalation & Resolution",
        &["escalat", "resolution", "resolve", "next steps", "sla", "confirm"],
    ),
    (
        "User Validation",
        &["validation", "validate", "verify", "verification", "identity"],
    ),
    (
        "Contact & Follow-up",
        &[
            "contact method",
            "preferred contact",
            "reminder",
            "follow up",
            "follow-up",
            "previous tickets",
            "teams",
            "callback",
        ],
    ),
];

fn has_areas(text: &str) -> bool {
    let t = text.trim();
    !t.is_empty() && !t.eq_ignore_ascii_case(NO_IMPROVEMENT_TEXT)
}

/// Keyword categorization of an areas-to-improve text.
///
/// Returns the category with the most keyword hits, `None` if no keyword
/// matches.
pub fn categorize_areas(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    let mut best: Option<(&'static str, usize)> = None;
    for (category, keywords) in QUALITY_CATEGORIES.iter() {
        let hits = keywords.iter().filter(|k| lower.contains(*k)).count();
        if hits > 0 && best.map(|(_, h)| hits > h).unwrap_or(true) {
            best = Some((*category, hits));
        }
    }
    best.map(|(c, _)| c)
}

fn ask_category(text: &str, completer: &mut dyn Completer) -> String {
    let names: Vec<&str> = QUALITY_CATEGORIES.iter().map(|(c, _)| *c).collect();
    let messages = vec![
        ChatMessage::system(
            "You classify QA coaching feedback into quality parameter categories. \
             Answer with the category name only.",
        ),
        ChatMessage::user(&format!(
            "Categories: {}\nAreas to improve: {}\nWhich single category fits best?",
            names.join("; "),
            text
        )),
    ];
    match completer.complete(&messages) {
        Ok(answer) => {
            let answer = answer.trim().trim_end_matches('.').trim();
            names
                .iter()
                .find(|n| n.eq_ignore_ascii_case(answer))
                .map(|n| n.to_string())
                .unwrap_or_else(|| {
                    debug!("ask_category: answer {:?} is not a known category", answer);
                    OTHER_CATEGORY.to_string()
                })
        }
        Err(e) => {
            warn!("ask_category: completion failed: {}", e);
            OTHER_CATEGORY.to_string()
        }
    }
}

/// Fills the quality parameter category of the rows that do not have one yet.
///
/// Rows that already carry a category are left untouched, so that a saved
/// tracker is not recategorized.
pub fn fill_categories(rows: &mut [TrackerRow], completer: &mut dyn Completer) {
    let mut asked = 0;
    for row in rows.iter_mut() {
        if !row.quality_parameter_category.trim().is_empty() || !has_areas(&row.areas_to_improve)
        {
            continue;
        }
        row.quality_parameter_category = match categorize_areas(&row.areas_to_improve) {
            Some(c) => c.to_string(),
            None => {
                asked += 1;
                ask_category(&row.areas_to_improve, completer)
            }
        };
    }
    info!("fill_categories: {} rows, {} sent to the model", rows.len(), asked);
}

fn has_category(row: &TrackerRow) -> bool {
    let c = row.quality_parameter_category.trim();
    !c.is_empty() && !c.eq_ignore_ascii_case("nan")
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CategoryCount {
    pub category: String,
    pub count: usize,
}

impl CategoryCount {
    /// The label of the treemap tile, for example `Hold Procedure, 3`.
    pub fn label(&self) -> String {
        format!("{}, {}", self.category, self.count)
    }
}

/// Number of rows per category, most frequent first.
pub fn category_counts(rows: &[TrackerRow]) -> Vec<CategoryCount> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for row in rows.iter().filter(|r| has_category(r)) {
        *counts
            .entry(row.quality_parameter_category.trim().to_string())
            .or_insert(0) += 1;
    }
    let mut res: Vec<CategoryCount> = counts
        .into_iter()
        .map(|(category, count)| CategoryCount { category, count })
        .collect();
    res.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.category.cmp(&b.category)));
    res
}

/// The rows of one category.
pub fn rows_in_category<'a>(rows: &'a [TrackerRow], category: &str) -> Vec<&'a TrackerRow> {
    rows.iter()
        .filter(|r| r.quality_parameter_category.trim() == category.trim())
        .collect()
}

/// The short projection shown for agents with missing criteria.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct MissingCriteria {
    pub employee_name: String,
    pub team_lead: String,
    pub quality_assessors: String,
    pub areas_to_improve: String,
}

pub fn missing_criteria(rows: &[&TrackerRow]) -> Vec<MissingCriteria> {
    rows.iter()
        .map(|r| MissingCriteria {
            employee_name: r.employee_name.clone(),
            team_lead: r.team_lead.clone(),
            quality_assessors: r.quality_assessors.clone(),
            areas_to_improve: r.areas_to_improve.clone(),
        })
        .collect()
}

/// The agents for which at least one improvement criterion was identified.
pub fn needs_improvement(rows: &[TrackerRow]) -> Vec<&TrackerRow> {
    rows.iter().filter(|r| has_category(r)).collect()
}

/// Performance score of a row: the mean of the ServiceNow and manual averages,
/// weighted by their number of assessments. Zero without any rating.
pub fn performance_score(row: &TrackerRow) -> f64 {
    let mut total = 0.0;
    let mut weight = 0.0;
    for (count, avg) in [
        (row.service_now_count, row.service_now_average),
        (row.manual_count, row.manual_average),
    ] {
        if let Some(a) = avg {
            let w = count.unwrap_or(1).max(1) as f64;
            total += a * w;
            weight += w;
        }
    }
    if weight > 0.0 {
        total / weight
    } else {
        0.0
    }
}

const SCORE_EPSILON: f64 = 1e-9;

/// The best rows of a weekly tracker. Ties are all returned, by name.
pub fn top_performers_week(rows: &[TrackerRow]) -> Vec<(&TrackerRow, f64)> {
    let scored: Vec<(&TrackerRow, f64)> = rows.iter().map(|r| (r, performance_score(r))).collect();
    let top = match scored.iter().map(|p| p.1).reduce(f64::max) {
        Some(x) => x,
        None => return Vec::new(),
    };
    let mut res: Vec<(&TrackerRow, f64)> = scored
        .into_iter()
        .filter(|p| (p.1 - top).abs() < SCORE_EPSILON)
        .collect();
    res.sort_by(|a, b| a.0.employee_name.cmp(&b.0.employee_name));
    res
}

/// The best employees over several weekly trackers of the same month.
///
/// Scores are summed per employee, so that attendance over the month counts.
pub fn top_performers_month(weeks: &[Vec<TrackerRow>]) -> Vec<(String, f64)> {
    let mut totals: HashMap<String, f64> = HashMap::new();
    for row in weeks.iter().flatten() {
        *totals.entry(row.employee_name.clone()).or_insert(0.0) += performance_score(row);
    }
    let top = match totals.values().cloned().reduce(f64::max) {
        Some(x) => x,
        None => return Vec::new(),
    };
    let mut res: Vec<(String, f64)> = totals
        .into_iter()
        .filter(|p| (p.1 - top).abs() < SCORE_EPSILON)
        .collect();
    res.sort_by(|a, b| a.0.cmp(&b.0));
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedAnswer(Result<String, CompletionError>, usize);

    impl Completer for FixedAnswer {
        fn complete(&mut self, _messages: &[ChatMessage]) -> Result<String, CompletionError> {
            self.1 += 1;
            self.0.clone()
        }
    }

    fn row(name: &str, areas: &str) -> TrackerRow {
        TrackerRow {
            employee_name: name.to_string(),
            areas_to_improve: areas.to_string(),
            ..TrackerRow::default()
        }
    }

    fn rated(name: &str, sn: Option<(usize, f64)>, manual: Option<(usize, f64)>) -> TrackerRow {
        TrackerRow {
            employee_name: name.to_string(),
            service_now_count: sn.map(|p| p.0),
            service_now_average: sn.map(|p| p.1),
            manual_count: manual.map(|p| p.0),
            manual_average: manual.map(|p| p.1),
            ..TrackerRow::default()
        }
    }

    #[test]
    fn keyword_categories() {
        assert_eq!(
            categorize_areas("Reduce hold time and avoid dead air."),
            Some("Hold Procedure")
        );
        assert_eq!(
            categorize_areas("Ensure ticket notes are complete: symptoms and fix."),
            Some("Ticket Documentation")
        );
        assert_eq!(categorize_areas("Smile more."), None);
    }

    #[test]
    fn categories_are_only_filled_when_missing() {
        let mut rows = vec![
            row("A", "Probe for full issue context before troubleshooting."),
            row("B", NO_IMPROVEMENT_TEXT),
            row("C", ""),
            TrackerRow {
                quality_parameter_category: "Hold Procedure".to_string(),
                ..row("D", "Probe more.")
            },
            row("E", "Smile more."),
        ];
        let mut completer = FixedAnswer(Ok("empathy & tone.".to_string()), 0);
        fill_categories(&mut rows, &mut completer);
        let cats: Vec<&str> = rows
            .iter()
            .map(|r| r.quality_parameter_category.as_str())
            .collect();
        assert_eq!(
            cats,
            vec!["Probing & Troubleshooting", "", "", "Hold Procedure", "Empathy & Tone"]
        );
        assert_eq!(completer.1, 1);
    }

    #[test]
    fn unknown_or_failed_answers_become_other() {
        let mut rows = vec![row("E", "Smile more.")];
        fill_categories(&mut rows, &mut FixedAnswer(Ok("Vibes".to_string()), 0));
        assert_eq!(rows[0].quality_parameter_category, OTHER_CATEGORY);

        let mut rows = vec![row("E", "Smile more.")];
        fill_categories(&mut rows, &mut NoCompleter);
        assert_eq!(rows[0].quality_parameter_category, OTHER_CATEGORY);
    }

    #[test]
    fn counts_and_drill_down() {
        let mk = |name: &str, cat: &str| TrackerRow {
            quality_parameter_category: cat.to_string(),
            ..row(name, "x")
        };
        let rows = vec![
            mk("A", "Hold Procedure"),
            mk("B", "Empathy & Tone"),
            mk("C", "Hold Procedure"),
            mk("D", ""),
            mk("E", "nan"),
            mk("F", "Empathy & Tone"),
            mk("G", "Call Opening & Closing"),
        ];
        let counts = category_counts(&rows);
        let labels: Vec<String> = counts.iter().map(|c| c.label()).collect();
        assert_eq!(
            labels,
            vec![
                "Empathy & Tone, 2",
                "Hold Procedure, 2",
                "Call Opening & Closing, 1"
            ]
        );
        let hold = rows_in_category(&rows, "Hold Procedure");
        assert_eq!(hold.len(), 2);
        let projected = missing_criteria(&hold);
        assert_eq!(projected[1].employee_name, "C");
        assert_eq!(needs_improvement(&rows).len(), 5);
    }

    #[test]
    fn scores_are_weighted_by_counts() {
        let r = rated("A", Some((3, 4.0)), Some((1, 5.0)));
        assert!((performance_score(&r) - 4.25).abs() < 1e-9);
        assert_eq!(performance_score(&rated("B", None, None)), 0.0);
        assert_eq!(performance_score(&rated("C", None, Some((2, 3.5)))), 3.5);
    }

    #[test]
    fn top_of_the_week_keeps_ties() {
        let rows = vec![
            rated("Zoe", Some((1, 4.5)), None),
            rated("Adam", None, Some((2, 4.5))),
            rated("Mia", Some((1, 3.0)), None),
        ];
        let top: Vec<&str> = top_performers_week(&rows)
            .iter()
            .map(|p| p.0.employee_name.as_str())
            .collect();
        assert_eq!(top, vec!["Adam", "Zoe"]);
        assert!(top_performers_week(&[]).is_empty());
    }

    #[test]
    fn top_of_the_month_sums_weeks() {
        let week1 = vec![rated("Zoe", Some((1, 5.0)), None), rated("Adam", Some((1, 4.0)), None)];
        let week2 = vec![rated("Adam", Some((1, 4.0)), None)];
        let top = top_performers_month(&[week1, week2]);
        assert_eq!(top, vec![("Adam".to_string(), 8.0)]);
    }
}
