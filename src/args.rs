use clap::Parser;

/// This program extracts the examination/tally sections (심사·집계부) of scanned election
/// result documents and aggregates them by district and by candidate.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file paths) The tally documents to process, in order. Files that are not PDF documents
    /// are ignored.
    #[clap(value_parser)]
    pub inputs: Vec<String>,

    /// (file path, optional) A JSON configuration file (output settings, candidates, page ranges,
    /// model and rendering options).
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path) Where to write the CSV export. By default, the file is named after the number of
    /// selected candidates and written to the output directory of the configuration.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (repeatable, default all the target candidates) The candidates to include in the export and
    /// in the summary, in order. Passing an empty name selects no candidate.
    #[clap(long, value_parser)]
    pub candidates: Option<Vec<String>>,

    /// (number, default 1) The first page of each document to process (1-based). Pages keep their
    /// absolute number for the classification.
    #[clap(long, value_parser)]
    pub start: Option<u32>,

    /// (number, default the last page) The last page of each document to process (1-based,
    /// inclusive).
    #[clap(long, value_parser)]
    pub end: Option<u32>,

    /// (number) Only processes this many pages of each document, from the start page.
    #[clap(long, value_parser)]
    pub sample: Option<u32>,

    /// (file path or 'stdout') If specified, the summary by district, candidate and voting type is
    /// written in JSON format to the given location.
    #[clap(long, value_parser)]
    pub summary: Option<String>,

    /// (file path) A reference summary in JSON format. If provided, the program checks that the
    /// computed summary matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (file path) Saves the extracted page records in JSON format.
    #[clap(long, value_parser)]
    pub records_out: Option<String>,

    /// (file path) Loads page records saved with --records-out instead of extracting the documents.
    #[clap(long, value_parser)]
    pub records_in: Option<String>,

    /// The name of the extraction model. Overrides the configuration file.
    #[clap(long, value_parser)]
    pub model: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
