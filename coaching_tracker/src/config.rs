// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;

use chrono::NaiveDate;

/// The content of one spreadsheet cell, as understood by the tracker.
///
/// The readers (Excel, CSV) convert their native cell types into this
/// representation. Everything downstream is total over these values.
#[derive(PartialEq, Debug, Clone)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDate),
}

impl CellValue {
    /// The textual form of the cell, the way a spreadsheet would display it.
    ///
    /// Integral numbers are printed without decimals so that week numbers and
    /// employee ids stored as floats read naturally.
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Empty => "".to_string(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(f) if f.fract() == 0.0 && f.abs() < 1e15 => {
                format!("{}", *f as i64)
            }
            CellValue::Number(f) => f.to_string(),
            CellValue::Bool(b) => b.to_string(),
            CellValue::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

/// One worksheet: a header row and the data rows below it.
///
/// Rows may be shorter than the header; missing trailing cells read as empty.
#[derive(PartialEq, Debug, Clone)]
pub struct Sheet {
    /// Where the sheet came from (usually the file name). Only used for logging.
    pub source: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl Sheet {
    /// A sheet without rows or without columns. Column resolution gives up on
    /// these.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.headers.is_empty()
    }
}

/// The week being tracked: a month (1-12) and a week of that month (1-6).
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct Period {
    month: u32,
    week: u32,
}

impl Period {
    pub fn new(month: u32, week: u32) -> Result<Period, PeriodError> {
        if !(1..=12).contains(&month) {
            return Err(PeriodError::InvalidMonth(month));
        }
        // A month spans at most 6 calendar weeks.
        if !(1..=6).contains(&week) {
            return Err(PeriodError::InvalidWeek(week));
        }
        Ok(Period { month, week })
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn week(&self) -> u32 {
        self.week
    }

    /// The label written in the tracker, for example `Mar - Week 2`.
    pub fn label(&self) -> String {
        let month_name = NaiveDate::from_ymd_opt(1900, self.month, 1)
            .map(|d| d.format("%b").to_string())
            .unwrap_or_default();
        format!("{} - Week {}", month_name, self.week)
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum PeriodError {
    InvalidMonth(u32),
    InvalidWeek(u32),
}

impl Error for PeriodError {}

impl Display for PeriodError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PeriodError::InvalidMonth(m) => write!(f, "invalid month {} (expected 1-12)", m),
            PeriodError::InvalidWeek(w) => write!(f, "invalid week {} (expected 1-6)", w),
        }
    }
}

// ******** Output data structures *********

/// The names of the tracker columns, in output order.
pub const TRACKER_COLUMNS: [&str; 13] = [
    "Employee Name",
    "Emp ID",
    "Organization",
    "Team Lead",
    "Status",
    "Quality Assessors",
    "Week",
    "Service Now Assessments Count",
    "Service Now Assessments Average Rating",
    "Manual Assessments Count",
    "Manual Assessments Average Rating",
    "Areas to Improve",
    "Quality Parameter Category",
];

/// One line of the weekly tracker.
///
/// `emp_id`, `organization` and `status` are left empty by the generator;
/// coaches fill them in afterwards. A count of zero is stored as `None` so
/// that it renders as an empty cell.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct TrackerRow {
    pub employee_name: String,
    pub emp_id: String,
    pub organization: String,
    pub team_lead: String,
    pub status: String,
    pub quality_assessors: String,
    pub week: String,
    pub service_now_count: Option<usize>,
    pub service_now_average: Option<f64>,
    pub manual_count: Option<usize>,
    pub manual_average: Option<f64>,
    pub areas_to_improve: String,
    pub quality_parameter_category: String,
}

impl TrackerRow {
    /// The cells of the row, as text, in the order of `TRACKER_COLUMNS`.
    pub fn cells(&self) -> Vec<String> {
        let count = |c: Option<usize>| c.map(|x| x.to_string()).unwrap_or_default();
        let avg = |a: Option<f64>| a.map(|x| format!("{}", x)).unwrap_or_default();
        vec![
            self.employee_name.clone(),
            self.emp_id.clone(),
            self.organization.clone(),
            self.team_lead.clone(),
            self.status.clone(),
            self.quality_assessors.clone(),
            self.week.clone(),
            count(self.service_now_count),
            avg(self.service_now_average),
            count(self.manual_count),
            avg(self.manual_average),
            self.areas_to_improve.clone(),
            self.quality_parameter_category.clone(),
        ]
    }
}

// ********* Text completion **********

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: &str) -> ChatMessage {
        ChatMessage {
            role: "system".to_string(),
            content: content.to_string(),
        }
    }

    pub fn user(content: &str) -> ChatMessage {
        ChatMessage {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }
}

/// Errors reported by a text-completion backend.
///
/// The tracker never propagates them: a failed completion becomes an empty
/// text in the output.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum CompletionError {
    /// No backend is configured (no API key, or completions are disabled).
    Unavailable,
    /// Every available key hit its rate limit.
    RateLimited(String),
    Failed(String),
}

impl Error for CompletionError {}

impl Display for CompletionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompletionError::Unavailable => write!(f, "no text completion backend available"),
            CompletionError::RateLimited(msg) => write!(f, "rate limited: {}", msg),
            CompletionError::Failed(msg) => write!(f, "completion failed: {}", msg),
        }
    }
}

/// A hosted text-completion service, seen as an opaque collaborator.
pub trait Completer {
    /// Returns the completion text for the given conversation.
    fn complete(&mut self, messages: &[ChatMessage]) -> Result<String, CompletionError>;
}

/// The completer used when no backend is available. Every call fails.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
pub struct NoCompleter;

impl Completer for NoCompleter {
    fn complete(&mut self, _messages: &[ChatMessage]) -> Result<String, CompletionError> {
        Err(CompletionError::Unavailable)
    }
}
