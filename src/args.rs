use clap::Parser;

/// This is a weekly QA coaching tracker generator.
#[derive(Parser, Debug, Clone, Default)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) A JSON file describing the sources, the week and the LLM settings.
    /// See the manual for the format. The other options override what it contains.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path, repeatable) A spreadsheet (xlsx, xls, ods or csv) of manual assessments.
    #[clap(short, long, value_parser)]
    pub manual: Option<Vec<String>>,

    /// (file path, repeatable) A spreadsheet (xlsx, xls, ods or csv) exported from ServiceNow.
    #[clap(short, long, value_parser)]
    pub servicenow: Option<Vec<String>>,

    /// (1-12) The month of the tracked week.
    #[clap(long, value_parser)]
    pub month: Option<u32>,

    /// (1-6) The week of the month to track.
    #[clap(short, long, value_parser)]
    pub week: Option<u32>,

    /// (file path, 'stdout' or empty) If specified, the tracker will be written to the given
    /// location. Setting this option overrides the path that may be specified with the --config option.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (default json) The output format: json, csv or text.
    #[clap(long, value_parser)]
    pub format: Option<String>,

    /// When using Excel files, indicates the name of the worksheet to use (default: the first one).
    #[clap(long, value_parser)]
    pub excel_worksheet_name: Option<String>,

    /// (default table) The quick view to print: table, categories, category, top-week, top-month
    /// or needs-improvement.
    #[clap(long, value_parser)]
    pub view: Option<String>,

    /// The category to drill down into, with --view category.
    #[clap(long, value_parser)]
    pub category: Option<String>,

    /// (file path, repeatable) Trackers saved for earlier weeks of the month (json, csv or xlsx),
    /// used by --view top-month.
    #[clap(long, value_parser)]
    pub previous: Option<Vec<String>>,

    /// (file path) A reference tracker in JSON format. If provided, qatrack will
    /// check that the generated tracker matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    // Other arguments
    /// If passed as an argument, the areas to improve are not sent to the LLM.
    #[clap(long, takes_value = false)]
    pub no_llm: bool,

    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
