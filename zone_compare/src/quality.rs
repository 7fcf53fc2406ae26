use log::{info, warn};

use crate::config::*;
use crate::{sorted_zones, zone_metrics};

/// Consistency checks of the counters of one zone.
#[derive(PartialEq, Debug, Clone)]
pub struct ZoneQuality {
    pub info: ZoneInfo,
    /// good + invalid + blank ballots.
    pub ballots_sum: u64,
    /// The ballot counters add up to the total votes.
    pub ballots_consistent: bool,
    /// Sum of the votes of all the candidates.
    pub candidate_vote_sum: u64,
    /// The candidate votes add up to the good ballots.
    pub candidate_votes_consistent: bool,
    pub metrics: ZoneMetrics,
}

/// Checks the counters of a single zone.
///
/// The candidate votes are compared with the good ballots only: invalid and
/// blank ballots are never attributed to a candidate.
pub fn zone_quality(record: &ZoneRecord, thresholds: &Thresholds) -> ZoneQuality {
    let info = &record.info;
    let ballots_sum = vote_sum([info.good_vote, info.invalid_vote, info.no_vote]);
    let candidate_vote_sum = vote_sum(record.candidates.iter().map(|c| c.vote));
    ZoneQuality {
        info: info.clone(),
        ballots_sum,
        ballots_consistent: ballots_sum == info.total_vote,
        candidate_vote_sum,
        candidate_votes_consistent: candidate_vote_sum == info.good_vote,
        metrics: zone_metrics(Some(info), thresholds),
    }
}

/// The quality rows of all the zones of a snapshot, by province then zone.
pub fn quality_report(snapshot: &Snapshot, thresholds: &Thresholds) -> Vec<ZoneQuality> {
    let rows: Vec<ZoneQuality> = sorted_zones(snapshot)
        .into_iter()
        .map(|record| zone_quality(record, thresholds))
        .collect();
    for row in rows.iter() {
        if !row.ballots_consistent {
            warn!(
                "quality_report: zone {}: good + invalid + blank = {} but total is {}",
                row.info.zone_id, row.ballots_sum, row.info.total_vote
            );
        }
        if !row.candidate_votes_consistent {
            warn!(
                "quality_report: zone {}: candidate votes sum to {} but good ballots are {}",
                row.info.zone_id, row.candidate_vote_sum, row.info.good_vote
            );
        }
    }
    info!(
        "quality_report: version {}: {} zones, {} with inconsistent ballots, {} with inconsistent candidate votes",
        snapshot.version,
        rows.len(),
        rows.iter().filter(|r| !r.ballots_consistent).count(),
        rows.iter().filter(|r| !r.candidate_votes_consistent).count()
    );
    rows
}

/// Compares the total votes of a constituency snapshot with those of the
/// party-list snapshot. Both count the ballots cast in every zone, so any
/// difference points at an incomplete or inconsistent publication.
pub fn cross_check_totals(zones: &Snapshot, party_list: &PartyListSnapshot) -> VoteCrossCheck {
    let zone_total_votes = zones.total_votes();
    let party_list_total_votes = party_list.total_votes();
    let diff = vote_delta(party_list_total_votes, zone_total_votes);
    if diff != 0 {
        warn!(
            "cross_check_totals: version {}: constituency total {} differs from party-list total {} (version {}) by {}",
            zones.version, zone_total_votes, party_list_total_votes, party_list.version, diff
        );
    }
    VoteCrossCheck {
        party_list_total_votes,
        zone_total_votes,
        diff,
    }
}
