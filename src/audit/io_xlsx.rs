// Excel copy of the CSV export.

use rust_xlsxwriter::Workbook;
use snafu::prelude::*;

use crate::audit::{io_csv::*, *};

pub const SHEET_NAME: &str = "심사집계부";

/// The Excel file written next to a CSV export.
pub fn xlsx_path(csv_path: &Path) -> PathBuf {
    csv_path.with_extension("xlsx")
}

/// Writes the same columns and rows as the CSV export, total row included.
///
/// Returns nothing when there are no records or no selected candidates.
pub fn write_xlsx(path: &Path, records: &[PageRecord], selected: &[String]) -> AuditResult<Option<PathBuf>> {
    if records.is_empty() || selected.is_empty() {
        return Ok(None);
    }
    let path_str = path.display().to_string();

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet
        .set_name(SHEET_NAME)
        .context(XlsxWriteSnafu { path: &path_str })?;
    for (col, name) in header(selected).iter().enumerate() {
        worksheet
            .write_string(0, col as u16, name)
            .context(XlsxWriteSnafu { path: &path_str })?;
    }
    for (idx, row) in export_rows(records, selected).iter().enumerate() {
        let r = idx as u32 + 1;
        worksheet
            .write_string(r, 0, &row.district)
            .context(XlsxWriteSnafu { path: &path_str })?;
        worksheet
            .write_string(r, 1, &row.voting_type)
            .context(XlsxWriteSnafu { path: &path_str })?;
        for (col, c) in row.cells.iter().enumerate() {
            worksheet
                .write_number(r, col as u16 + 2, *c as f64)
                .context(XlsxWriteSnafu { path: &path_str })?;
        }
    }
    workbook
        .save(path)
        .context(XlsxWriteSnafu { path: &path_str })?;
    Ok(Some(path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::{open_workbook, DataType, Reader, Xlsx};

    fn record(district: &str, c: u64, r: u64) -> PageRecord {
        PageRecord {
            page_number: Some(1),
            district: district.to_string(),
            voting_type: "선거일 (Election Day)".to_string(),
            candidate_votes: vec![CandidateVote {
                candidate_name: "이재명".to_string(),
                classified_votes: c,
                reconfirm_votes: r,
                total_votes: c + r,
            }],
            valid_votes: c + r,
            invalid_votes: 1,
            total_votes: c + r + 1,
        }
    }

    #[test]
    fn excel_copy() {
        let dir = tempfile::tempdir().unwrap();
        let csv_p = dir.path().join(export_file_name(1));
        let p = xlsx_path(&csv_p);
        assert_eq!(p.extension().and_then(|e| e.to_str()), Some("xlsx"));

        let records = vec![record("한림읍", 100, 5), record("101", 10, 2)];
        let written = write_xlsx(&p, &records, &["이재명".to_string()]).unwrap();
        assert_eq!(written, Some(p.clone()));

        let mut workbook: Xlsx<_> = open_workbook(&p).unwrap();
        let range = workbook.worksheet_range(SHEET_NAME).unwrap().unwrap();
        let rows: Vec<Vec<DataType>> = range.rows().map(|r| r.to_vec()).collect();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0][0], DataType::String("투표구".to_string()));
        assert_eq!(rows[0][7], DataType::String("이재명_계".to_string()));
        assert_eq!(rows[1][0], DataType::String("한림읍".to_string()));
        // Text stays text even when it looks like a number.
        assert_eq!(rows[2][0], DataType::String("101".to_string()));
        assert_eq!(rows[2][4], DataType::Float(13.0));
        assert_eq!(rows[3][0], DataType::String(TOTAL_ROW_LABEL.to_string()));
        assert_eq!(rows[3][5], DataType::Float(110.0));
        assert_eq!(rows[3][7], DataType::Float(117.0));
    }

    #[test]
    fn nothing_to_write() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("out.xlsx");
        assert_eq!(write_xlsx(&p, &[], &["이재명".to_string()]).unwrap(), None);
        assert_eq!(write_xlsx(&p, &[record("한림읍", 1, 0)], &[]).unwrap(), None);
        assert!(!p.exists());
    }
}
