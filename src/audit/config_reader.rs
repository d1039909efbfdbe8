use crate::audit::*;

use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;
use snafu::prelude::*;

pub const DEFAULT_CONTEST_NAME: &str = "제21대 대통령선거";
pub const DEFAULT_DPI: u32 = 200;

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(rename = "contestName")]
    pub contest_name: Option<String>,
    #[serde(rename = "outputDirectory")]
    pub output_directory: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelSettings {
    pub model: Option<String>,
    pub endpoint: Option<String>,
    #[serde(rename = "timeoutSeconds")]
    pub timeout_seconds: Option<u64>,
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderSettings {
    #[serde(rename = "dpi")]
    _dpi: Option<u32>,
}

impl RenderSettings {
    pub fn dpi(&self) -> u32 {
        self._dpi.unwrap_or(DEFAULT_DPI)
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(rename = "outputSettings", default)]
    pub output_settings: OutputSettings,
    pub candidates: Option<Vec<String>>,
    #[serde(rename = "pageRanges")]
    pub page_ranges: Option<Vec<PageRange>>,
    #[serde(default)]
    pub model: ModelSettings,
    #[serde(default)]
    pub render: RenderSettings,
}

impl AuditConfig {
    /// The candidates the model is asked for.
    pub fn target_candidates(&self) -> Vec<String> {
        match &self.candidates {
            Some(cs) => cs.clone(),
            None => TARGET_CANDIDATES.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn classification_table(&self) -> ClassificationTable {
        match &self.page_ranges {
            Some(ranges) => ClassificationTable::new(ranges.clone()),
            None => ClassificationTable::default(),
        }
    }
}

fn validate_page_ranges(ranges: &[PageRange]) -> AuditResult<()> {
    for r in ranges.iter() {
        if r.first == 0 || r.first > r.last {
            return InvalidPageRangeSnafu {
                first: r.first,
                last: r.last,
                label: r.label.clone(),
            }
            .fail();
        }
    }
    Ok(())
}

pub fn read_config(path: &str) -> AuditResult<AuditConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: AuditConfig = serde_json::from_str(&contents).context(ParsingJsonSnafu {})?;
    if let Some(ranges) = &config.page_ranges {
        validate_page_ranges(ranges)?;
    }
    Ok(config)
}

pub fn read_summary(path: &str) -> AuditResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    debug!("read_summary: {:?}", js);
    Ok(js)
}
