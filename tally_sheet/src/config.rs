// ********* Input data structures ***********

use serde::{Deserialize, Deserializer, Serialize};

/// The candidates the extraction is asked to look for, in ballot order.
pub const TARGET_CANDIDATES: [&str; 5] = ["이재명", "김문수", "이준석", "권영국", "송진호"];

/// The key used for records that did not carry a district name.
pub const UNKNOWN_DISTRICT: &str = "Unknown";

// The extraction model may return null for a value it could not read.
// Both null and a missing field become the default (0 for the numbers).
fn default_if_null<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    let x: Option<T> = Option::deserialize(deserializer)?;
    Ok(x.unwrap_or_default())
}

/// The vote breakdown of one candidate on one page.
///
/// `total_votes` is kept as read from the document. It is expected to be
/// `classified_votes + reconfirm_votes` but this is not enforced: see
/// [`crate::find_discrepancies`].
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateVote {
    #[serde(default, deserialize_with = "default_if_null")]
    pub candidate_name: String,
    /// Ballots already sorted for this candidate (분류된 투표지).
    #[serde(default, deserialize_with = "default_if_null")]
    pub classified_votes: u64,
    /// Ballots flagged for re-verification (재확인대상 투표지).
    #[serde(default, deserialize_with = "default_if_null")]
    pub reconfirm_votes: u64,
    #[serde(default, deserialize_with = "default_if_null")]
    pub total_votes: u64,
}

/// The result extracted from one page of a tally document.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRecord {
    /// 1-based page number, set by the pipeline (never by the extractor).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    #[serde(default, deserialize_with = "default_if_null")]
    pub district: String,
    #[serde(default, deserialize_with = "default_if_null")]
    pub voting_type: String,
    #[serde(default, deserialize_with = "default_if_null")]
    pub candidate_votes: Vec<CandidateVote>,
    #[serde(default, deserialize_with = "default_if_null")]
    pub valid_votes: u64,
    #[serde(default, deserialize_with = "default_if_null")]
    pub invalid_votes: u64,
    #[serde(default, deserialize_with = "default_if_null")]
    pub total_votes: u64,
}

impl PageRecord {
    /// The vote entry for the given candidate on this page, if the page has one.
    pub fn candidate(&self, name: &str) -> Option<&CandidateVote> {
        self.candidate_votes
            .iter()
            .find(|cv| cv.candidate_name == name)
    }

    /// The district name used as a grouping key.
    pub fn district_key(&self) -> &str {
        if self.district.is_empty() {
            UNKNOWN_DISTRICT
        } else {
            self.district.as_str()
        }
    }
}

// ******** Output data structures *********

#[derive(Eq, PartialEq, Debug, Clone, Copy, Default, Serialize)]
pub struct CandidateTotals {
    pub classified: u64,
    pub reconfirm: u64,
    pub total: u64,
}

impl CandidateTotals {
    pub fn add_vote(&mut self, cv: &CandidateVote) {
        self.classified = self.classified.saturating_add(cv.classified_votes);
        self.reconfirm = self.reconfirm.saturating_add(cv.reconfirm_votes);
        self.total = self.total.saturating_add(cv.total_votes);
    }
}

/// Totals for one district across all its pages.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct DistrictSummary {
    pub district: String,
    /// Per-candidate sub-totals, in the order the candidates were first seen in this district.
    pub votes_by_candidate: Vec<(String, CandidateTotals)>,
    pub valid_total: u64,
    pub invalid_total: u64,
    pub grand_total: u64,
}

impl DistrictSummary {
    pub fn new(district: &str) -> DistrictSummary {
        DistrictSummary {
            district: district.to_string(),
            votes_by_candidate: Vec::new(),
            valid_total: 0,
            invalid_total: 0,
            grand_total: 0,
        }
    }

    pub fn candidate(&self, name: &str) -> Option<&CandidateTotals> {
        self.votes_by_candidate
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t)
    }

    pub(crate) fn candidate_mut(&mut self, name: &str) -> &mut CandidateTotals {
        let idx = match self.votes_by_candidate.iter().position(|(n, _)| n == name) {
            Some(idx) => idx,
            None => {
                self.votes_by_candidate
                    .push((name.to_string(), CandidateTotals::default()));
                self.votes_by_candidate.len() - 1
            }
        };
        &mut self.votes_by_candidate[idx].1
    }
}

/// Totals for one candidate across all the pages.
#[derive(PartialEq, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateSummary {
    pub name: String,
    pub totals: CandidateTotals,
    /// Share of the reconfirm ballots in the total, in percent.
    pub reconfirm_rate: f64,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VotingTypeSummary {
    pub voting_type: String,
    pub valid: u64,
    pub invalid: u64,
    pub total: u64,
    pub pages: u32,
}

/// A candidate entry whose total does not match classified + reconfirm.
#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Discrepancy {
    pub page_number: Option<u32>,
    pub district: String,
    pub candidate: String,
    pub classified: u64,
    pub reconfirm: u64,
    pub total: u64,
}

// ********* Configuration **********

/// An inclusive range of 1-based pages that share a voting type.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct PageRange {
    pub first: u32,
    pub last: u32,
    pub label: String,
}

impl PageRange {
    pub fn new(first: u32, last: u32, label: &str) -> PageRange {
        PageRange {
            first,
            last,
            label: label.to_string(),
        }
    }

    pub fn contains(&self, page: u32) -> bool {
        self.first <= page && page <= self.last
    }
}

/// Maps page numbers to voting types.
///
/// The layout of a tally document is fixed by the election commission: the
/// default table describes the 171-page document of one 21st presidential
/// election district. Other layouts are supported by providing another table.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationTable {
    pub ranges: Vec<PageRange>,
}

impl ClassificationTable {
    pub fn new(ranges: Vec<PageRange>) -> ClassificationTable {
        ClassificationTable { ranges }
    }

    /// The final voting type of a page.
    ///
    /// The first range containing the page wins over the extracted value. Pages
    /// outside every range keep the extracted value.
    pub fn classify(&self, page: u32, extracted: &str) -> String {
        match self.ranges.iter().find(|r| r.contains(page)) {
            Some(r) => r.label.clone(),
            None => extracted.to_string(),
        }
    }
}

impl Default for ClassificationTable {
    fn default() -> Self {
        ClassificationTable::new(vec![
            PageRange::new(1, 26, "관내사전 (Early In)"),
            PageRange::new(27, 168, "선거일 (Election Day)"),
            PageRange::new(169, 169, "관외사전 (Early Out)"),
            PageRange::new(170, 170, "재외투표 (Overseas)"),
            PageRange::new(171, 171, "거소/선상 (Absentee)"),
        ])
    }
}

/// Classifies a page with the default table.
pub fn classify_page(page: u32, extracted: &str) -> String {
    ClassificationTable::default().classify(page, extracted)
}
