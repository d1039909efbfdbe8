// The extracted records, saved as JSON so that a run can be re-aggregated
// without calling the extraction model again.

use snafu::prelude::*;

use crate::audit::*;

pub fn write_records(path: &str, records: &[PageRecord]) -> AuditResult<()> {
    let contents = serde_json::to_string_pretty(records).context(ParsingJsonSnafu {})?;
    fs::write(path, contents).context(WritingFileSnafu { path })
}

pub fn read_records(path: &str) -> AuditResult<Vec<PageRecord>> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let records: Vec<PageRecord> = serde_json::from_str(&contents).context(ParsingJsonSnafu {})?;
    info!("Read {} records from {}", records.len(), path);
    Ok(records)
}
