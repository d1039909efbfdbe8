mod config;
pub mod manual;
pub mod session;

use log::{debug, info};

pub use crate::config::*;
pub use crate::session::*;

/// Groups the records by district.
///
/// Returns one summary per distinct district, in the order the districts
/// first appear in the records. Records without a district are grouped
/// under [`UNKNOWN_DISTRICT`].
///
/// The summaries are recomputed from scratch: calling this function twice on
/// the same records returns the same result.
pub fn aggregate_by_district(records: &[PageRecord]) -> Vec<DistrictSummary> {
    let mut res: Vec<DistrictSummary> = Vec::new();
    for rec in records.iter() {
        let key = rec.district_key();
        let idx = match res.iter().position(|ds| ds.district == key) {
            Some(idx) => idx,
            None => {
                debug!("aggregate_by_district: new district {:?}", key);
                res.push(DistrictSummary::new(key));
                res.len() - 1
            }
        };
        let ds = &mut res[idx];
        ds.valid_total = ds.valid_total.saturating_add(rec.valid_votes);
        ds.invalid_total = ds.invalid_total.saturating_add(rec.invalid_votes);
        ds.grand_total = ds.grand_total.saturating_add(rec.total_votes);
        for cv in rec.candidate_votes.iter() {
            ds.candidate_mut(&cv.candidate_name).add_vote(cv);
        }
    }
    info!(
        "aggregate_by_district: {} records, {} districts",
        records.len(),
        res.len()
    );
    res
}

/// Totals per candidate across all the records, for the given candidates and in the given order.
///
/// A candidate that never appears in the records gets zero totals.
pub fn aggregate_by_candidate(records: &[PageRecord], candidates: &[String]) -> Vec<CandidateSummary> {
    candidates
        .iter()
        .map(|name| {
            let mut totals = CandidateTotals::default();
            for cv in records.iter().filter_map(|rec| rec.candidate(name)) {
                totals.add_vote(cv);
            }
            let reconfirm_rate = if totals.total > 0 {
                (totals.reconfirm as f64) / (totals.total as f64) * 100.0
            } else {
                0.0
            };
            CandidateSummary {
                name: name.clone(),
                totals,
                reconfirm_rate,
            }
        })
        .collect()
}

/// Totals per voting type, in the order the types first appear in the records.
pub fn aggregate_by_voting_type(records: &[PageRecord]) -> Vec<VotingTypeSummary> {
    let mut res: Vec<VotingTypeSummary> = Vec::new();
    for rec in records.iter() {
        let idx = match res.iter().position(|vs| vs.voting_type == rec.voting_type) {
            Some(idx) => idx,
            None => {
                res.push(VotingTypeSummary {
                    voting_type: rec.voting_type.clone(),
                    valid: 0,
                    invalid: 0,
                    total: 0,
                    pages: 0,
                });
                res.len() - 1
            }
        };
        let vs = &mut res[idx];
        vs.valid = vs.valid.saturating_add(rec.valid_votes);
        vs.invalid = vs.invalid.saturating_add(rec.invalid_votes);
        vs.total = vs.total.saturating_add(rec.total_votes);
        vs.pages += 1;
    }
    res
}

/// All the candidate entries whose total is not the sum of the classified and
/// reconfirm ballots.
///
/// The records are not modified: the totals read from the documents are kept
/// as they are in every aggregation and export.
pub fn find_discrepancies(records: &[PageRecord]) -> Vec<Discrepancy> {
    let mut res: Vec<Discrepancy> = Vec::new();
    for rec in records.iter() {
        for cv in rec.candidate_votes.iter() {
            if cv.classified_votes.checked_add(cv.reconfirm_votes) != Some(cv.total_votes) {
                res.push(Discrepancy {
                    page_number: rec.page_number,
                    district: rec.district_key().to_string(),
                    candidate: cv.candidate_name.clone(),
                    classified: cv.classified_votes,
                    reconfirm: cv.reconfirm_votes,
                    total: cv.total_votes,
                });
            }
        }
    }
    res
}
