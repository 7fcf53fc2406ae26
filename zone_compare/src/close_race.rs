use log::{debug, warn};

use crate::config::*;

// Margin = rank 1 votes - rank 2 votes: the lead of the winner over the runner-up.
// If the invalid votes are at least the margin, giving all of them to rank 2
// could in theory make rank 2 win.

/// The zones of a snapshot where the race is close and the invalid votes could flip it.
///
/// A zone is reported when all of the following hold:
/// * it has a rank 1 and a rank 2 candidate,
/// * the margin between them is positive,
/// * the margin is below `margin_significant_pct` percent of the total votes,
/// * the invalid votes are at least the margin.
///
/// Rows come in the order of the zones in the snapshot.
pub fn close_race_rows(snapshot: &Snapshot, margin_significant_pct: f64) -> Vec<CloseRaceRow> {
    let rows: Vec<CloseRaceRow> = snapshot
        .zones
        .iter()
        .filter_map(|record| close_race_row(record, margin_significant_pct))
        .collect();
    debug!(
        "close_race_rows: version {}: {} close races out of {} zones",
        snapshot.version,
        rows.len(),
        snapshot.zones.len()
    );
    rows
}

/// Applies the close-race test to a single zone.
pub fn close_race_row(record: &ZoneRecord, margin_significant_pct: f64) -> Option<CloseRaceRow> {
    let info = &record.info;
    let r1 = record.candidates.iter().find(|c| c.rank == 1)?;
    let r2 = record.candidates.iter().find(|c| c.rank == 2)?;

    if r1.vote < r2.vote {
        warn!(
            "close_race_row: zone {}: rank inversion, rank 1 has {} votes and rank 2 has {}",
            info.zone_id, r1.vote, r2.vote
        );
        return None;
    }
    if r1.vote == r2.vote {
        debug!("close_race_row: zone {}: tie between rank 1 and rank 2", info.zone_id);
        return None;
    }
    let margin = r1.vote - r2.vote;

    let margin_pct = if info.total_vote > 0 {
        margin as f64 / info.total_vote as f64 * 100.0
    } else {
        0.0
    };
    let not_significant = margin_pct < margin_significant_pct;
    let invalid_could_flip = info.invalid_vote >= margin;
    if !(not_significant && invalid_could_flip) {
        return None;
    }

    Some(CloseRaceRow {
        province: info.province.clone(),
        zone: info.zone.clone(),
        zone_id: info.zone_id.clone(),
        rank1: race_candidate(r1),
        rank2: race_candidate(r2),
        margin,
        margin_pct,
        invalid_vote: info.invalid_vote,
        total_vote: info.total_vote,
    })
}

fn race_candidate(c: &CandidateResult) -> RaceCandidate {
    RaceCandidate {
        party: c.party.clone(),
        name: c.full_name(),
        votes: c.vote,
    }
}

/// Stable sort by invalid votes. Equal rows keep their order.
pub fn sort_close_races(rows: &mut [CloseRaceRow], order: InvalidOrder) {
    match order {
        InvalidOrder::Unsorted => {}
        InvalidOrder::Asc => rows.sort_by_key(|r| r.invalid_vote),
        InvalidOrder::Desc => rows.sort_by(|a, b| b.invalid_vote.cmp(&a.invalid_vote)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(zone_id: &str, total_vote: u64, invalid_vote: u64, votes: &[(u32, u64)]) -> ZoneRecord {
        ZoneRecord {
            info: ZoneInfo {
                total_vote,
                invalid_vote,
                ..ZoneInfo::new(zone_id, "1", "Province", zone_id)
            },
            candidates: votes
                .iter()
                .enumerate()
                .map(|(idx, (rank, vote))| {
                    CandidateResult::new(idx as u32 + 1, *rank, *vote, "10")
                        .with_party("Party")
                        .with_name("First", "Last")
                })
                .collect(),
        }
    }

    #[test]
    fn flags_possible_flip() {
        let r = record("Z", 20000, 60, &[(1, 1000), (2, 950), (3, 10)]);
        let row = close_race_row(&r, 10.0).unwrap();
        assert_eq!(row.margin, 50);
        assert!((row.margin_pct - 0.25).abs() < 1e-9);
        assert_eq!(row.invalid_vote, 60);
        assert_eq!(row.rank1.votes, 1000);
        assert_eq!(row.rank2.name, "First Last");
    }

    #[test]
    fn each_condition_is_required() {
        // Invalid votes below the margin.
        assert!(close_race_row(&record("Z", 20000, 49, &[(1, 1000), (2, 950)]), 10.0).is_none());
        // Invalid votes exactly at the margin.
        assert!(close_race_row(&record("Z", 20000, 50, &[(1, 1000), (2, 950)]), 10.0).is_some());
        // Margin not below the threshold: 60 / 500 = 12%.
        assert!(close_race_row(&record("Z", 500, 70, &[(1, 280), (2, 220)]), 10.0).is_none());
        // Missing rank 2.
        assert!(close_race_row(&record("Z", 20000, 60, &[(1, 1000), (3, 950)]), 10.0).is_none());
        // Missing rank 1.
        assert!(close_race_row(&record("Z", 20000, 60, &[(2, 1000), (3, 950)]), 10.0).is_none());
    }

    #[test]
    fn rank_inversion_and_tie_are_not_reported() {
        // Rank 2 ahead of rank 1 is inconsistent data: never trusted as a close race.
        assert!(close_race_row(&record("Z", 20000, 500, &[(1, 900), (2, 950)]), 10.0).is_none());
        assert!(close_race_row(&record("Z", 20000, 500, &[(1, 950), (2, 950)]), 10.0).is_none());
    }

    #[test]
    fn extreme_votes_keep_the_margin_exact() {
        let r = record("Z", u64::MAX, u64::MAX, &[(1, u64::MAX), (2, 1)]);
        let row = close_race_row(&r, 200.0).unwrap();
        assert_eq!(row.margin, u64::MAX - 1);
        let inverted = record("Z", u64::MAX, u64::MAX, &[(1, 1), (2, u64::MAX)]);
        assert!(close_race_row(&inverted, 200.0).is_none());
    }

    #[test]
    fn zero_total_gives_zero_margin_pct() {
        let row = close_race_row(&record("Z", 0, 60, &[(1, 100), (2, 90)]), 10.0).unwrap();
        assert_eq!(row.margin_pct, 0.0);
    }

    #[test]
    fn sort_is_stable() {
        let snapshot = Snapshot {
            version: "v".to_string(),
            zones: vec![
                record("A", 20000, 80, &[(1, 1000), (2, 950)]),
                record("B", 20000, 60, &[(1, 1000), (2, 950)]),
                record("C", 20000, 80, &[(1, 1000), (2, 990)]),
            ],
        };
        let rows = close_race_rows(&snapshot, 10.0);
        let ids = |rows: &[CloseRaceRow]| rows.iter().map(|r| r.zone_id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&rows), vec!["A", "B", "C"]);

        let mut asc = rows.clone();
        sort_close_races(&mut asc, InvalidOrder::Asc);
        assert_eq!(ids(&asc), vec!["B", "A", "C"]);

        let mut desc = rows.clone();
        sort_close_races(&mut desc, InvalidOrder::Desc);
        assert_eq!(ids(&desc), vec!["A", "C", "B"]);

        let mut same = rows.clone();
        sort_close_races(&mut same, InvalidOrder::Unsorted);
        assert_eq!(ids(&same), ids(&rows));
    }
}
