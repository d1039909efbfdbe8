// Primitives for writing the CSV export.

use csv::{QuoteStyle, Terminator, WriterBuilder};
use snafu::prelude::*;

use crate::audit::*;

/// Byte order mark, so that spreadsheet programs read the export as UTF-8.
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
pub const TOTAL_ROW_LABEL: &str = "전체 합계";

pub fn export_file_name(num_candidates: usize) -> String {
    format!("21대대선_심사집계부_{}명.csv", num_candidates)
}

pub fn header(selected: &[String]) -> Vec<String> {
    let mut h: Vec<String> = ["투표구", "유형", "유효투표", "무효투표", "총계"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    for name in selected.iter() {
        h.push(format!("{}_분류", name));
        h.push(format!("{}_재확인", name));
        h.push(format!("{}_계", name));
    }
    h
}

/// The numeric cells of a row: page totals, then three cells per selected candidate.
fn numeric_cells(rec: &PageRecord, selected: &[String]) -> Vec<u64> {
    let mut cells = vec![rec.valid_votes, rec.invalid_votes, rec.total_votes];
    for name in selected.iter() {
        match rec.candidate(name) {
            // The total is the one read from the page, not recomputed.
            Some(cv) => cells.extend([cv.classified_votes, cv.reconfirm_votes, cv.total_votes]),
            None => cells.extend([0, 0, 0]),
        }
    }
    cells
}

/// One row of the export: district, voting type and the numeric cells.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ExportRow {
    pub district: String,
    pub voting_type: String,
    pub cells: Vec<u64>,
}

/// The rows of the export, one per record in order, then the grand total row.
pub fn export_rows(records: &[PageRecord], selected: &[String]) -> Vec<ExportRow> {
    let mut totals: Vec<u64> = vec![0; 3 + 3 * selected.len()];
    let mut rows: Vec<ExportRow> = Vec::with_capacity(records.len() + 1);
    for rec in records.iter() {
        let cells = numeric_cells(rec, selected);
        for (t, c) in totals.iter_mut().zip(cells.iter()) {
            *t = t.saturating_add(*c);
        }
        rows.push(ExportRow {
            district: rec.district.clone(),
            voting_type: rec.voting_type.clone(),
            cells,
        });
    }
    rows.push(ExportRow {
        district: TOTAL_ROW_LABEL.to_string(),
        voting_type: "".to_string(),
        cells: totals,
    });
    rows
}

/// Appends one row: the district and type fields are always quoted, the numbers never are.
fn write_row(buf: &mut Vec<u8>, row: &ExportRow) -> AuditResult<()> {
    {
        let mut wtr = WriterBuilder::new()
            .quote_style(QuoteStyle::Always)
            .terminator(Terminator::Any(b','))
            .from_writer(&mut *buf);
        wtr.write_record([row.district.as_str(), row.voting_type.as_str()])
            .context(CsvWriteSnafu {})?;
        wtr.flush().context(CsvBufferSnafu {})?;
    }
    let numbers: Vec<String> = row.cells.iter().map(|c| c.to_string()).collect();
    buf.extend_from_slice(numbers.join(",").as_bytes());
    buf.push(b'\n');
    Ok(())
}

/// The CSV export of the records, prefixed with a byte order mark.
///
/// Returns nothing when there are no records or no selected candidates.
pub fn render_csv(records: &[PageRecord], selected: &[String]) -> AuditResult<Option<Vec<u8>>> {
    if records.is_empty() || selected.is_empty() {
        return Ok(None);
    }

    let mut wtr = WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .from_writer(UTF8_BOM.to_vec());
    wtr.write_record(header(selected)).context(CsvWriteSnafu {})?;
    let mut buf = wtr
        .into_inner()
        .map_err(|e| e.into_error())
        .context(CsvBufferSnafu {})?;

    for row in export_rows(records, selected).iter() {
        write_row(&mut buf, row)?;
    }
    Ok(Some(buf))
}

/// Writes the CSV export to the given path, if there is anything to export.
pub fn write_csv(path: &Path, records: &[PageRecord], selected: &[String]) -> AuditResult<Option<PathBuf>> {
    match render_csv(records, selected)? {
        Some(bytes) => {
            fs::write(path, bytes).context(WritingFileSnafu {
                path: path.display().to_string(),
            })?;
            Ok(Some(path.to_path_buf()))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vote(name: &str, classified: u64, reconfirm: u64, total: u64) -> CandidateVote {
        CandidateVote {
            candidate_name: name.to_string(),
            classified_votes: classified,
            reconfirm_votes: reconfirm,
            total_votes: total,
        }
    }

    fn records() -> Vec<PageRecord> {
        vec![
            PageRecord {
                page_number: Some(1),
                district: "한림읍".to_string(),
                voting_type: "관내사전 (Early In)".to_string(),
                candidate_votes: vec![vote("이재명", 100, 5, 105), vote("김문수", 40, 1, 41)],
                valid_votes: 146,
                invalid_votes: 2,
                total_votes: 148,
            },
            PageRecord {
                page_number: Some(2),
                district: "애월읍".to_string(),
                voting_type: "관내사전 (Early In)".to_string(),
                // Inconsistent total, kept as read.
                candidate_votes: vec![vote("김문수", 10, 2, 20)],
                valid_votes: 20,
                invalid_votes: 0,
                total_votes: 20,
            },
        ]
    }

    fn render_text(records: &[PageRecord], selected: &[String]) -> Option<String> {
        render_csv(records, selected)
            .unwrap()
            .map(|b| String::from_utf8(b).unwrap())
    }

    #[test]
    fn export_rows() {
        let selected = vec!["이재명".to_string(), "김문수".to_string()];
        let text = render_text(&records(), &selected).unwrap();
        assert!(text.starts_with('\u{feff}'));
        let lines: Vec<&str> = text.trim_start_matches('\u{feff}').lines().collect();
        assert_eq!(
            lines,
            vec![
                "투표구,유형,유효투표,무효투표,총계,이재명_분류,이재명_재확인,이재명_계,김문수_분류,김문수_재확인,김문수_계",
                "\"한림읍\",\"관내사전 (Early In)\",146,2,148,100,5,105,40,1,41",
                "\"애월읍\",\"관내사전 (Early In)\",20,0,20,0,0,0,10,2,20",
                "\"전체 합계\",\"\",166,2,168,100,5,105,50,3,61",
            ]
        );
    }

    #[test]
    fn selection_order_is_kept() {
        let selected = vec!["김문수".to_string()];
        let text = render_text(&records(), &selected).unwrap();
        let header = text.trim_start_matches('\u{feff}').lines().next().unwrap();
        assert_eq!(header, "투표구,유형,유효투표,무효투표,총계,김문수_분류,김문수_재확인,김문수_계");
    }

    #[test]
    fn nothing_to_export() {
        assert_eq!(render_text(&records(), &[]), None);
        assert_eq!(render_text(&[], &["이재명".to_string()]), None);

        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join(export_file_name(0));
        assert_eq!(write_csv(&p, &records(), &[]).unwrap(), None);
        assert!(!p.exists());
    }

    #[test]
    fn file_name() {
        assert_eq!(export_file_name(3), "21대대선_심사집계부_3명.csv");
    }

    #[test]
    fn numeric_looking_text_is_quoted() {
        let records = vec![PageRecord {
            page_number: Some(1),
            district: "101".to_string(),
            voting_type: "2".to_string(),
            candidate_votes: vec![vote("이재명", 1, 0, 1)],
            valid_votes: 1,
            invalid_votes: 0,
            total_votes: 1,
        }];
        let text = render_text(&records, &["이재명".to_string()]).unwrap();
        let lines: Vec<&str> = text.trim_start_matches('\u{feff}').lines().collect();
        assert_eq!(lines[1], "\"101\",\"2\",1,0,1,1,0,1");
        assert_eq!(lines[2], "\"전체 합계\",\"\",1,0,1,1,0,1");
    }

    #[test]
    fn embedded_quotes_are_escaped() {
        let mut records = records();
        records.truncate(1);
        records[0].district = "한림\"읍, 1".to_string();
        let text = render_text(&records, &["이재명".to_string()]).unwrap();
        let lines: Vec<&str> = text.trim_start_matches('\u{feff}').lines().collect();
        assert_eq!(lines[1], "\"한림\"\"읍, 1\",\"관내사전 (Early In)\",146,2,148,100,5,105");
    }
}
