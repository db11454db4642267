//! Cleaning of reviewer comments and of the text returned by the LLM.
//!
//! Reviewer comments are mostly pasted checklists ("Call opening followed:
//! Yes", numbered bullets, ...). Only the free-text observations are useful to
//! summarize areas to improve.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref YESNO_SUFFIX: Regex = Regex::new(
        r"(?i):\s*-?\s*Yes\b|:\s*-?\s*No\b|:\s*-?\s*Yes/No\b|:\s*-?\s*Resolved\b|:\s*-?\s*Escalated\b|:\s*-?\s*Closed\b|:\s*Accurate\b"
    )
    .unwrap();
    static ref BULLET_LINE: Regex = Regex::new(r"^\s*(?:\d+[\.\)]|[-*•·])\s+").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// Lines containing any of these are checklist items, not observations.
pub const CHECKLIST_KEYS: &[&str] = &[
    "checked for previous tickets",
    "preference contact method",
    "preferred contact method",
    "contact type",
    "ms teams chat integration",
    "ms teams integration",
    "short description",
    "configuration item",
    "category",
    "computer name documented",
    "error screenshot attached",
    "ticket state",
    "work note documentation",
    "additional assistance",
    "call opening followed",
    "user validation procedure",
    "display empathy & assurance",
    "call holding procedure",
    "professional and positive tone",
    "sufficient probing",
    "proper 3 reminder process",
    "bomgar chat messages attached",
    "computer name documented/ bomgar chat messages attached",
];

/// Preambles that the model likes to put before the actual answer.
pub const OUTPUT_PREFIXES: &[&str] = &[
    "Here is a concise summary of Areas to Improve:",
    "Here is a summary of Areas to Improve:",
    "Based on the raw comments,",
    "Here are the areas to improve:",
    "Here are the Areas to Improve:",
    "Here is the summary of Areas to Improve:",
];

fn is_checklist_line(line: &str) -> bool {
    let l = line.trim().trim_matches('"').to_lowercase();
    if l.is_empty() {
        return true;
    }
    if l.starts_with("observations") || l.contains("observation/areas for improvement") {
        return true;
    }
    if CHECKLIST_KEYS.iter().any(|k| l.contains(k)) {
        return true;
    }
    YESNO_SUFFIX.is_match(line) || BULLET_LINE.is_match(line)
}

/// Keeps the free-text observations of a reviewer comment, on a single line.
pub fn clean_comment(raw: &str) -> String {
    let normalized = raw.replace('\r', "\n");
    let mut kept: Vec<&str> = Vec::new();
    for line in normalized.split('\n').map(|l| l.trim()) {
        if is_checklist_line(line) {
            continue;
        }
        let core = line.trim_matches(|c: char| " -•*·\t\"'".contains(c));
        if core.chars().count() < 3 {
            continue;
        }
        kept.push(line.trim_matches('"').trim());
    }
    let text = kept.join(" ");
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

/// Removes the known preambles from a model answer.
pub fn clean_output(text: &str) -> String {
    let mut res = text.to_string();
    for p in OUTPUT_PREFIXES {
        res = res.replace(p, "");
    }
    res.trim().to_string()
}
