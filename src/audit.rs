use log::{debug, info, warn};

use tally_sheet::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;
use crate::audit::config_reader::*;
use crate::audit::io_common::format_count;

pub mod config_reader;
pub mod io_common;
pub mod io_csv;
pub mod io_pdf;
pub mod io_records;
pub mod io_vision;
pub mod io_xlsx;

#[derive(Debug, Snafu)]
pub enum AuditError {
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error writing file {path}"))]
    WritingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Invalid page range {first}-{last} for {label:?}"))]
    InvalidPageRange { first: u32, last: u32, label: String },
    #[snafu(display("No PDF document among the input files"))]
    MissingInput {},

    #[snafu(display("Could not run {command}"))]
    RenderCommand {
        source: std::io::Error,
        command: String,
    },
    #[snafu(display("{command} failed on page {page} of {path}: {stderr}"))]
    RenderFailed {
        command: String,
        page: u32,
        path: String,
        stderr: String,
    },
    #[snafu(display("Could not read the page count of {path}"))]
    PageCount { path: String },
    #[snafu(display("Could not read the rendered page {page} of {path}"))]
    ReadingImage {
        source: std::io::Error,
        page: u32,
        path: String,
    },

    #[snafu(display("Environment variable {var} is not set"))]
    MissingApiKey { var: String },
    #[snafu(display("Request to the extraction model failed"))]
    HttpRequest { source: reqwest::Error },
    #[snafu(display("Extraction model returned status {status}: {body}"))]
    ApiStatus { status: u16, body: String },
    #[snafu(display("Extraction model returned an empty response"))]
    EmptyResponse {},
    #[snafu(display("Could not parse the extraction response: {text}"))]
    ParsingExtraction {
        source: serde_json::Error,
        text: String,
    },

    #[snafu(display("Error writing CSV"))]
    CsvWrite { source: csv::Error },
    #[snafu(display("Error writing CSV"))]
    CsvBuffer { source: std::io::Error },
    #[snafu(display("Error writing Excel file {path}"))]
    XlsxWrite {
        source: rust_xlsxwriter::XlsxError,
        path: String,
    },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type AuditResult<T> = Result<T, AuditError>;

fn district_summaries_to_json(ds: &[DistrictSummary]) -> Vec<JSValue> {
    let mut l: Vec<JSValue> = Vec::new();
    for d in ds.iter() {
        let mut by_candidate: Vec<JSValue> = Vec::new();
        for (name, totals) in d.votes_by_candidate.iter() {
            by_candidate.push(json!({
                "candidate": name,
                "classified": totals.classified,
                "reconfirm": totals.reconfirm,
                "total": totals.total,
            }));
        }
        l.push(json!({
            "district": d.district,
            "validTotal": d.valid_total,
            "invalidTotal": d.invalid_total,
            "grandTotal": d.grand_total,
            "votesByCandidate": by_candidate,
        }));
    }
    l
}

fn build_summary_js(contest: &str, selected: &[String], records: &[PageRecord]) -> JSValue {
    json!({
        "config": {
            "contest": contest,
            "candidates": selected,
        },
        "pages": records.len(),
        "districts": district_summaries_to_json(&aggregate_by_district(records)),
        "candidates": aggregate_by_candidate(records, selected),
        "votingTypes": aggregate_by_voting_type(records),
        "discrepancies": find_discrepancies(records),
    })
}

fn log_summary(selected: &[String], records: &[PageRecord]) {
    let valid: u64 = records.iter().fold(0, |acc, r| acc.saturating_add(r.valid_votes));
    let invalid: u64 = records.iter().fold(0, |acc, r| acc.saturating_add(r.invalid_votes));
    let total: u64 = records.iter().fold(0, |acc, r| acc.saturating_add(r.total_votes));
    info!("Pages: {}", records.len());
    info!(
        "Valid: {}  Invalid: {}  Total: {}",
        format_count(valid),
        format_count(invalid),
        format_count(total)
    );
    info!(
        "{:<12} {:>15} {:>12} {:>15} {:>9}",
        "후보자", "분류", "재확인", "계", "재확인율"
    );
    for cs in aggregate_by_candidate(records, selected) {
        info!(
            "{:<12} {:>15} {:>12} {:>15} {:>8.2}%",
            cs.name,
            format_count(cs.totals.classified),
            format_count(cs.totals.reconfirm),
            format_count(cs.totals.total),
            cs.reconfirm_rate
        );
    }
    for vs in aggregate_by_voting_type(records) {
        info!(
            "  {:<24}: {} pages, valid {}, invalid {}, total {}",
            vs.voting_type,
            vs.pages,
            format_count(vs.valid),
            format_count(vs.invalid),
            format_count(vs.total)
        );
    }
    for d in find_discrepancies(records) {
        warn!(
            "Page {:?} ({}): {}: classified {} + reconfirm {} != total {}",
            d.page_number, d.district, d.candidate, d.classified, d.reconfirm, d.total
        );
    }
}

fn selected_candidates(args: &Args, config: &AuditConfig) -> Vec<String> {
    let selected: Vec<String> = match &args.candidates {
        Some(cs) => cs.clone(),
        None => config.target_candidates(),
    };
    // An empty name is how an empty selection is passed on the command line.
    selected.into_iter().filter(|c| !c.is_empty()).collect()
}

fn export_path(args: &Args, config: &AuditConfig, num_candidates: usize) -> PathBuf {
    if let Some(p) = &args.out {
        return PathBuf::from(p);
    }
    let dir = config
        .output_settings
        .output_directory
        .clone()
        .unwrap_or_else(|| ".".to_string());
    Path::new(dir.as_str()).join(io_csv::export_file_name(num_candidates))
}

/// The pages to process: `--start`/`--end`, with `--sample` counting from the start page.
fn page_window(args: &Args) -> (Option<u32>, Option<u32>) {
    let sample_end = args
        .sample
        .map(|n| args.start.unwrap_or(1).max(1).saturating_add(n).saturating_sub(1));
    let last = match (args.end, sample_end) {
        (Some(e), Some(s)) => Some(e.min(s)),
        (e, s) => e.or(s),
    };
    (args.start, last)
}

fn extract_records(args: &Args, config: &AuditConfig) -> AuditResult<(Vec<PageRecord>, Option<String>)> {
    let documents = io_pdf::collect_documents(&args.inputs, config.render.dpi());
    if documents.is_empty() {
        return MissingInputSnafu {}.fail();
    }
    info!("Found {} documents", documents.len());

    let mut model = config.model.clone();
    if args.model.is_some() {
        model.model = args.model.clone();
    }
    let extractor = io_vision::VisionExtractor::new(&model, &config.target_candidates())?;
    if !io_vision::api_key_present() {
        warn!(
            "{} is not set: every page will fail extraction",
            io_vision::API_KEY_VAR
        );
    }

    let table = config.classification_table();
    let (first, last) = page_window(args);
    let mut session = ExtractionSession::new().page_window(first, last);
    // The records collected before a failure are exported in any case.
    let error = match start_extraction(&mut session, &documents, &extractor, &table) {
        Ok(()) => None,
        Err(e) => {
            warn!("Extraction stopped: {}", e);
            Some(
                session
                    .error()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| format!("Failed to process files: {}", e)),
            )
        }
    };
    Ok((session.into_results(), error))
}

pub fn run_audit(args: &Args) -> AuditResult<()> {
    let config: AuditConfig = match &args.config {
        Some(p) => read_config(p)?,
        None => AuditConfig::default(),
    };
    info!("config: {:?}", config);

    let selected = selected_candidates(args, &config);
    info!("Selected candidates: {:?}", selected);

    let (records, run_error) = match &args.records_in {
        Some(p) => (io_records::read_records(p)?, None),
        None => extract_records(args, &config)?,
    };
    debug!("records: {:?}", records);

    if let Some(p) = &args.records_out {
        io_records::write_records(p, &records)?;
        info!("Records written to {}", p);
    }

    log_summary(&selected, &records);

    let csv_path = export_path(args, &config, selected.len());
    match io_csv::write_csv(&csv_path, &records, &selected)? {
        Some(p) => info!("CSV written to {}", p.display()),
        None => info!("Nothing to export (no results or no candidates selected)"),
    }
    let xlsx_path = io_xlsx::xlsx_path(&csv_path);
    if let Some(p) = io_xlsx::write_xlsx(&xlsx_path, &records, &selected)? {
        info!("Excel copy written to {}", p.display());
    }

    let contest = config
        .output_settings
        .contest_name
        .clone()
        .unwrap_or_else(|| DEFAULT_CONTEST_NAME.to_string());
    let summary_js = build_summary_js(&contest, &selected, &records);
    let pretty_js_summary = serde_json::to_string_pretty(&summary_js).context(ParsingJsonSnafu {})?;
    match args.summary.as_deref() {
        Some("stdout") => println!("{}", pretty_js_summary),
        Some(p) => {
            fs::write(p, &pretty_js_summary).context(WritingFileSnafu { path: p })?;
            info!("Summary written to {}", p);
        }
        None => {}
    }

    // The reference summary, if provided for comparison
    if let Some(summary_p) = &args.reference {
        let summary_ref = read_summary(summary_p)?;
        let pretty_js_summary_ref =
            serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
        if pretty_js_summary_ref != pretty_js_summary {
            warn!("Found differences with the reference summary");
            print_diff(
                pretty_js_summary_ref.as_str(),
                pretty_js_summary.as_str(),
                "\n",
            );
            whatever!("Difference detected between calculated summary and reference summary")
        }
    }

    if let Some(msg) = run_error {
        whatever!("{}", msg)
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn record(page: u32, district: &str, name: &str, c: u64, r: u64, t: u64) -> PageRecord {
        PageRecord {
            page_number: Some(page),
            district: district.to_string(),
            voting_type: "선거일 (Election Day)".to_string(),
            candidate_votes: vec![CandidateVote {
                candidate_name: name.to_string(),
                classified_votes: c,
                reconfirm_votes: r,
                total_votes: t,
            }],
            valid_votes: t,
            invalid_votes: 1,
            total_votes: t + 1,
        }
    }

    fn args(argv: &[&str]) -> Args {
        let mut v = vec!["tallyaudit"];
        v.extend_from_slice(argv);
        Args::parse_from(v)
    }

    #[test]
    fn summary_json() {
        let records = vec![
            record(30, "애월읍", "이재명", 100, 5, 105),
            record(31, "애월읍", "이재명", 10, 0, 12),
        ];
        let js = build_summary_js("test", &["이재명".to_string()], &records);
        assert_eq!(js["pages"], json!(2));
        assert_eq!(js["districts"].as_array().map(|a| a.len()), Some(1));
        assert_eq!(js["districts"][0]["grandTotal"], json!(119));
        assert_eq!(
            js["districts"][0]["votesByCandidate"][0],
            json!({"candidate": "이재명", "classified": 110, "reconfirm": 5, "total": 117})
        );
        assert_eq!(js["candidates"][0]["totals"]["total"], json!(117));
        assert_eq!(js["votingTypes"][0]["pages"], json!(2));
        assert_eq!(js["discrepancies"][0]["pageNumber"], json!(31));
    }

    #[test]
    fn candidate_selection() {
        let config = AuditConfig::default();
        assert_eq!(selected_candidates(&args(&[]), &config).len(), 5);
        assert_eq!(
            selected_candidates(&args(&["--candidates", "김문수", "--candidates", "이재명"]), &config),
            vec!["김문수".to_string(), "이재명".to_string()]
        );
        assert!(selected_candidates(&args(&["--candidates", ""]), &config).is_empty());
    }

    #[test]
    fn export_path_defaults() {
        let config = AuditConfig::default();
        assert_eq!(
            export_path(&args(&[]), &config, 2),
            Path::new(".").join("21대대선_심사집계부_2명.csv")
        );
        assert_eq!(
            export_path(&args(&["--out", "a.csv"]), &config, 2),
            PathBuf::from("a.csv")
        );
    }

    #[test]
    fn run_from_records() {
        let dir = tempfile::tempdir().unwrap();
        let records_p = dir.path().join("records.json");
        let csv_p = dir.path().join("out.csv");
        let summary_p = dir.path().join("summary.json");
        io_records::write_records(
            records_p.to_str().unwrap(),
            &[record(1, "한림읍", "이재명", 100, 5, 105)],
        )
        .unwrap();

        let a = args(&[
            "--records-in",
            records_p.to_str().unwrap(),
            "--out",
            csv_p.to_str().unwrap(),
            "--summary",
            summary_p.to_str().unwrap(),
            "--candidates",
            "이재명",
        ]);
        run_audit(&a).unwrap();

        let csv_text = fs::read_to_string(&csv_p).unwrap();
        assert!(csv_text.starts_with('\u{feff}'));
        assert!(csv_text.contains("\"한림읍\""));
        assert!(dir.path().join("out.xlsx").exists());

        // The summary just written is its own reference.
        let a2 = args(&[
            "--records-in",
            records_p.to_str().unwrap(),
            "--out",
            csv_p.to_str().unwrap(),
            "--candidates",
            "이재명",
            "--reference",
            summary_p.to_str().unwrap(),
        ]);
        assert!(run_audit(&a2).is_ok());
    }

    #[test]
    fn written_summary_reads_back_identical() {
        let selected = vec!["이재명".to_string()];
        let mut mismatches = 0;
        for classified in 1..3000u64 {
            for reconfirm in [1u64, 3, 7, 11] {
                let records = vec![record(
                    1,
                    "한림읍",
                    "이재명",
                    classified,
                    reconfirm,
                    classified + reconfirm,
                )];
                let written =
                    serde_json::to_string_pretty(&build_summary_js("test", &selected, &records)).unwrap();
                let read: JSValue = serde_json::from_str(&written).unwrap();
                if serde_json::to_string_pretty(&read).unwrap() != written {
                    mismatches += 1;
                }
            }
        }
        assert_eq!(mismatches, 0);
    }

    #[test]
    fn page_window_from_args() {
        assert_eq!(page_window(&args(&[])), (None, None));
        assert_eq!(page_window(&args(&["--start", "27"])), (Some(27), None));
        assert_eq!(
            page_window(&args(&["--start", "27", "--end", "168"])),
            (Some(27), Some(168))
        );
        assert_eq!(page_window(&args(&["--sample", "10"])), (None, Some(10)));
        assert_eq!(
            page_window(&args(&["--start", "27", "--sample", "3"])),
            (Some(27), Some(29))
        );
        assert_eq!(
            page_window(&args(&["--start", "27", "--end", "28", "--sample", "3"])),
            (Some(27), Some(28))
        );
    }

    #[test]
    fn reference_mismatch_fails() {
        let dir = tempfile::tempdir().unwrap();
        let records_p = dir.path().join("records.json");
        let ref_p = dir.path().join("reference.json");
        io_records::write_records(
            records_p.to_str().unwrap(),
            &[record(1, "한림읍", "이재명", 100, 5, 105)],
        )
        .unwrap();
        fs::write(&ref_p, "{\"pages\": 7}").unwrap();
        let a = args(&[
            "--records-in",
            records_p.to_str().unwrap(),
            "--out",
            dir.path().join("out.csv").to_str().unwrap(),
            "--reference",
            ref_p.to_str().unwrap(),
        ]);
        assert!(run_audit(&a).is_err());
    }

    #[test]
    fn no_pdf_input() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("notes.txt");
        fs::write(&p, "hello").unwrap();
        let a = args(&[p.to_str().unwrap()]);
        assert!(matches!(run_audit(&a), Err(AuditError::MissingInput {})));
    }
}
