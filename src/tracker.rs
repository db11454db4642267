use log::{debug, info, warn};

use coaching_tracker::views::fill_categories;
use coaching_tracker::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;
use crate::tracker::config_reader::*;
use crate::tracker::groq::GroqClient;
use crate::tracker::output::*;

mod config_reader;
mod groq;
mod io_common;
mod io_csv;
mod io_excel;
mod output;

#[derive(Debug, Snafu)]
pub enum TrackerError {
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::Error,
        path: String,
    },
    #[snafu(display("No worksheet found in {path}"))]
    EmptyExcel { path: String },
    #[snafu(display("Worksheet {worksheet} not found in {path}"))]
    MissingWorksheet { path: String, worksheet: String },
    #[snafu(display("Error opening CSV file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error reading line {lineno} of {path}"))]
    CsvLineParse {
        source: csv::Error,
        path: String,
        lineno: usize,
    },
    #[snafu(display("Error writing CSV output"))]
    CsvWrite { source: csv::Error },
    #[snafu(display("Error reading file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON file {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error serializing the tracker"))]
    SerializingJson { source: serde_json::Error },
    #[snafu(display("Error writing {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Unknown provider {provider:?} (expected manual or servicenow)"))]
    UnknownProvider { provider: String },
    #[snafu(display("Cannot tell the file type of {path} (expected xlsx, xls, ods or csv)"))]
    UnknownFileType { path: String },
    #[snafu(display("Unknown output format {format:?} (expected json, csv or text)"))]
    UnknownFormat { format: String },
    #[snafu(display("Unknown view {view:?}"))]
    UnknownView { view: String },
    #[snafu(display("Invalid tracked week"))]
    InvalidPeriod { source: PeriodError },
    #[snafu(display("The month and the week to track must be provided"))]
    MissingPeriod {},
    #[snafu(display("No manual or ServiceNow source provided"))]
    MissingSources {},
    #[snafu(display("Cannot find the directory of {path}"))]
    MissingParentDir { path: String },
    #[snafu(display("The category view needs a --category"))]
    MissingCategory {},
    #[snafu(display("Error creating the HTTP client"))]
    HttpClient { source: reqwest::Error },
    #[snafu(display("Difference detected between the generated tracker and the reference {path}"))]
    ReferenceMismatch { path: String },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

type TrackerResult<T> = Result<T, TrackerError>;

/// Everything a run needs, once the config file and the flags are merged.
#[derive(PartialEq, Debug, Clone)]
pub struct RunSettings {
    pub tracker_name: Option<String>,
    pub period: Period,
    pub sources: Vec<FileSource>,
    pub out: Option<String>,
    pub format: OutputFormat,
    pub view: View,
    pub category: Option<String>,
    pub previous: Vec<String>,
    pub reference: Option<String>,
    pub llm: LlmSettings,
    pub use_llm: bool,
}

pub fn settings_from_args(args: &Args) -> TrackerResult<RunSettings> {
    let (config, root) = match &args.config {
        Some(config_path) => {
            let config = read_config(config_path)?;
            let root = Path::new(config_path.as_str())
                .parent()
                .context(MissingParentDirSnafu {
                    path: config_path.clone(),
                })?
                .to_path_buf();
            (Some(config), Some(root))
        }
        None => (None, None),
    };
    let root_p: Option<&Path> = root.as_deref();
    let output_settings = config.as_ref().and_then(|c| c.output_settings.clone());

    // Sources given on the command line replace the ones of the config file.
    let cli_sources: Vec<FileSource> = args
        .manual
        .iter()
        .flatten()
        .map(|p| FileSource::new(Provider::Manual, p, args.excel_worksheet_name.clone()))
        .chain(args.servicenow.iter().flatten().map(|p| {
            FileSource::new(Provider::ServiceNow, p, args.excel_worksheet_name.clone())
        }))
        .collect();
    let sources: Vec<FileSource> = if !cli_sources.is_empty() {
        cli_sources
    } else {
        config
            .as_ref()
            .map(|c| c.sources.clone())
            .unwrap_or_default()
            .into_iter()
            .map(|cfs| FileSource {
                file_path: resolve_path(root_p, &cfs.file_path),
                excel_worksheet_name: cfs
                    .excel_worksheet_name
                    .clone()
                    .or_else(|| args.excel_worksheet_name.clone()),
                ..cfs
            })
            .collect()
    };
    if sources.is_empty() {
        return MissingSourcesSnafu {}.fail();
    }

    let config_period = config.as_ref().and_then(|c| c.period.clone());
    let month = args
        .month
        .or_else(|| config_period.as_ref().map(|p| p.month))
        .context(MissingPeriodSnafu {})?;
    let week = args
        .week
        .or_else(|| config_period.as_ref().map(|p| p.week))
        .context(MissingPeriodSnafu {})?;
    let period = Period::new(month, week).context(InvalidPeriodSnafu {})?;

    let out = match &args.out {
        Some(o) => Some(o.clone()),
        None => output_settings
            .as_ref()
            .and_then(|o| o.output_file.clone())
            .map(|o| resolve_path(root_p, &o)),
    };
    let format = parse_format(
        args.format
            .clone()
            .or_else(|| output_settings.as_ref().and_then(|o| o.format.clone()))
            .unwrap_or_else(|| "json".to_string())
            .as_str(),
    )?;
    let view = parse_view(args.view.as_deref().unwrap_or("table"))?;
    if view == View::Category && args.category.is_none() {
        return MissingCategorySnafu {}.fail();
    }

    let llm = config.as_ref().and_then(|c| c.llm.clone()).unwrap_or_default();
    let use_llm = !args.no_llm && llm.enabled.unwrap_or(true);

    Ok(RunSettings {
        tracker_name: output_settings.and_then(|o| o.tracker_name),
        period,
        sources,
        out,
        format,
        view,
        category: args.category.clone(),
        previous: args.previous.clone().unwrap_or_default(),
        reference: args.reference.clone(),
        llm,
        use_llm,
    })
}

fn read_source(cfs: &FileSource) -> TrackerResult<Sheet> {
    info!("Attempting to read {:?} file {:?}", cfs.provider, cfs.file_path);
    let sheet = match cfs.file_type()? {
        FileType::Excel => {
            io_excel::read_excel_sheet(&cfs.file_path, cfs.excel_worksheet_name.as_deref())
        }
        FileType::Csv => io_csv::read_csv_sheet(&cfs.file_path),
    }?;
    debug!(
        "read_source: {}: {} columns, {} rows",
        sheet.source,
        sheet.headers.len(),
        sheet.rows.len()
    );
    Ok(sheet)
}

/// Reads every source and builds the tracker of the week.
pub fn build_tracker(
    settings: &RunSettings,
    completer: &mut dyn Completer,
) -> TrackerResult<Vec<TrackerRow>> {
    let mut manual: Vec<Sheet> = Vec::new();
    let mut service_now: Vec<Sheet> = Vec::new();
    for cfs in settings.sources.iter() {
        let provider = cfs.provider()?;
        let sheet = read_source(cfs)?;
        match provider {
            Provider::Manual => manual.push(sheet),
            Provider::ServiceNow => service_now.push(sheet),
        }
    }
    let mut rows = generate_tracker(&manual, &service_now, &settings.period, completer);
    fill_categories(&mut rows, completer);
    Ok(rows)
}

fn make_completer(settings: &RunSettings) -> TrackerResult<Box<dyn Completer>> {
    if !settings.use_llm {
        info!("The model is disabled, areas to improve will be left empty");
        return Ok(Box::new(NoCompleter));
    }
    match GroqClient::from_settings(&settings.llm)? {
        Some(client) => Ok(Box::new(client)),
        None => {
            warn!("No API key found, areas to improve will be left empty");
            Ok(Box::new(NoCompleter))
        }
    }
}

fn check_reference(reference_path: &str, tracker_js: &JSValue) -> TrackerResult<()> {
    let contents = fs::read_to_string(reference_path).context(OpeningJsonSnafu {
        path: reference_path,
    })?;
    let reference: JSValue = serde_json::from_str(&contents).context(ParsingJsonSnafu {
        path: reference_path,
    })?;
    let pretty_reference = serde_json::to_string_pretty(&reference).context(SerializingJsonSnafu {})?;
    let pretty_tracker = serde_json::to_string_pretty(tracker_js).context(SerializingJsonSnafu {})?;
    if pretty_reference != pretty_tracker {
        warn!("Found differences with the reference tracker");
        print_diff(pretty_reference.as_str(), pretty_tracker.as_str(), "\n");
        return ReferenceMismatchSnafu {
            path: reference_path,
        }
        .fail();
    }
    info!("The tracker matches the reference {}", reference_path);
    Ok(())
}

pub fn run_tracker(args: &Args) -> TrackerResult<()> {
    let settings = settings_from_args(args)?;
    info!("settings: {:?}", settings);

    let mut completer = make_completer(&settings)?;
    let rows = build_tracker(&settings, completer.as_mut())?;
    info!("Generated {} tracker rows for {}", rows.len(), settings.period.label());

    let tracker_js = tracker_to_json(settings.tracker_name.as_deref(), &settings.period, &rows);
    let to_file = settings.out.as_deref().filter(|o| is_file_output(o));
    match (to_file, &settings.view) {
        (Some(path), _) => write_tracker(&rows, &tracker_js, settings.format, path)?,
        (None, View::Table) => print!("{}", render_tracker(&rows, &tracker_js, settings.format)?),
        (None, _) => {}
    }

    if settings.view != View::Table {
        let mut weeks: Vec<Vec<TrackerRow>> = Vec::new();
        for p in settings.previous.iter() {
            weeks.push(read_saved_tracker(p)?);
        }
        weeks.push(rows.clone());
        print!(
            "{}",
            render_view(
                &settings.view,
                &settings.period,
                &weeks,
                settings.category.as_deref()
            )
        );
    }

    if let Some(reference_path) = &settings.reference {
        check_reference(reference_path, &tracker_js)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use coaching_tracker::views::rows_in_category;

    fn test_data(name: &str) -> String {
        let p: PathBuf = [env!("CARGO_MANIFEST_DIR"), "tests", "data", name]
            .iter()
            .collect();
        p.as_path().display().to_string()
    }

    // Unique per test run.
    fn temp_path(name: &str) -> String {
        std::env::temp_dir()
            .join(format!("qatrack_{}_{}", std::process::id(), name))
            .display()
            .to_string()
    }

    fn fixture_args() -> Args {
        Args {
            manual: Some(vec![test_data("manual.csv")]),
            servicenow: Some(vec![test_data("servicenow.csv")]),
            month: Some(3),
            week: Some(2),
            ..Args::default()
        }
    }

    /// Answers like the model would, and records the conversations.
    struct ScriptedCompleter {
        calls: Vec<Vec<ChatMessage>>,
    }

    impl Completer for ScriptedCompleter {
        fn complete(&mut self, messages: &[ChatMessage]) -> Result<String, CompletionError> {
            self.calls.push(messages.to_vec());
            let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
            if last.contains("hold procedure") {
                Ok("Follow the hold procedure before placing the user on hold.".to_string())
            } else if last.contains("on hold without asking") {
                Ok("Confirm the resolution with the user before closing.".to_string())
            } else {
                Err(CompletionError::Failed("unexpected prompt".to_string()))
            }
        }
    }

    #[test]
    fn settings_from_flags() {
        let settings = settings_from_args(&fixture_args()).unwrap();
        assert_eq!(settings.sources.len(), 2);
        assert_eq!(settings.period, Period::new(3, 2).unwrap());
        assert_eq!(settings.format, OutputFormat::Json);
        assert_eq!(settings.view, View::Table);
        assert!(settings.use_llm);
    }

    #[test]
    fn settings_errors() {
        let args = Args {
            month: Some(3),
            week: Some(2),
            ..Args::default()
        };
        assert!(matches!(
            settings_from_args(&args),
            Err(TrackerError::MissingSources {})
        ));
        let args = Args {
            week: None,
            ..fixture_args()
        };
        assert!(matches!(
            settings_from_args(&args),
            Err(TrackerError::MissingPeriod {})
        ));
        let args = Args {
            month: Some(13),
            ..fixture_args()
        };
        assert!(matches!(
            settings_from_args(&args),
            Err(TrackerError::InvalidPeriod { .. })
        ));
        let args = Args {
            view: Some("category".to_string()),
            ..fixture_args()
        };
        assert!(matches!(
            settings_from_args(&args),
            Err(TrackerError::MissingCategory {})
        ));
    }

    #[test]
    fn settings_from_config() {
        let args = Args {
            config: Some(test_data("tracker_config.json")),
            week: Some(1),
            ..Args::default()
        };
        let settings = settings_from_args(&args).unwrap();
        assert_eq!(settings.tracker_name, Some("Service Desk".to_string()));
        // Flags override the config file.
        assert_eq!(settings.period, Period::new(3, 1).unwrap());
        assert_eq!(settings.sources[0].file_path, test_data("manual.csv"));
        assert!(!settings.use_llm);
    }

    #[test]
    fn build_fixture_tracker() {
        let settings = settings_from_args(&fixture_args()).unwrap();
        let mut completer = ScriptedCompleter { calls: Vec::new() };
        let rows = build_tracker(&settings, &mut completer).unwrap();

        let names: Vec<&str> = rows.iter().map(|r| r.employee_name.as_str()).collect();
        assert_eq!(names, vec!["Jane Doe", "John Roe"]);

        let jane = &rows[0];
        assert_eq!(jane.team_lead, "Alice Smith");
        assert_eq!(jane.quality_assessors, "Bob Stone, Carol White, Eve Long");
        assert_eq!(jane.week, "Mar - Week 2");
        assert_eq!(jane.service_now_count, Some(2));
        assert_eq!(jane.service_now_average, Some(4.5));
        assert_eq!(jane.manual_count, Some(2));
        assert_eq!(jane.manual_average, Some(4.0));
        assert_eq!(jane.emp_id, "");
        assert_eq!(
            jane.areas_to_improve,
            "Follow the hold procedure before placing the user on hold."
        );
        assert_eq!(jane.quality_parameter_category, "Hold Procedure");

        let john = &rows[1];
        assert_eq!(john.team_lead, "Dan Brown");
        assert_eq!(john.quality_assessors, "Bob Stone, Eve Long");
        assert_eq!(john.service_now_count, Some(1));
        assert_eq!(john.service_now_average, Some(3.0));
        assert_eq!(john.manual_average, Some(5.0));
        assert_eq!(john.quality_parameter_category, "Escalation & Resolution");

        // One call per employee with comments, none for the categories.
        assert_eq!(completer.calls.len(), 2);
        assert!(completer.calls[0][1]
            .content
            .starts_with("Raw observations (cleaned): Did not follow the hold procedure."));
        assert_eq!(rows_in_category(&rows, "Hold Procedure").len(), 1);
    }

    #[test]
    fn fixture_tracker_without_model() {
        let settings = settings_from_args(&fixture_args()).unwrap();
        let rows = build_tracker(&settings, &mut NoCompleter).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.areas_to_improve.is_empty()));
        assert!(rows.iter().all(|r| r.quality_parameter_category.is_empty()));
    }

    #[test]
    fn unreadable_source() {
        let args = Args {
            manual: Some(vec![test_data("missing.csv")]),
            ..fixture_args()
        };
        let settings = settings_from_args(&args).unwrap();
        assert!(matches!(
            build_tracker(&settings, &mut NoCompleter),
            Err(TrackerError::CsvOpen { .. })
        ));
    }

    #[test]
    fn run_with_config_and_reference() {
        let out_s = temp_path("run_with_config.json");
        let args = Args {
            config: Some(test_data("tracker_config.json")),
            out: Some(out_s.clone()),
            reference: Some(test_data("expected_tracker.json")),
            ..Args::default()
        };
        run_tracker(&args).unwrap();
        let written: JSValue = serde_json::from_str(&fs::read_to_string(&out_s).unwrap()).unwrap();
        let expected: JSValue =
            serde_json::from_str(&fs::read_to_string(test_data("expected_tracker.json")).unwrap())
                .unwrap();
        assert_eq!(written, expected);
    }

    #[test]
    fn reference_mismatch() {
        let args = Args {
            config: Some(test_data("tracker_config.json")),
            week: Some(1),
            out: Some(temp_path("reference_mismatch.json")),
            reference: Some(test_data("expected_tracker.json")),
            ..Args::default()
        };
        assert!(matches!(
            run_tracker(&args),
            Err(TrackerError::ReferenceMismatch { .. })
        ));
    }
}
