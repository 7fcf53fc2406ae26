use log::debug;

use std::collections::HashMap;

use crate::config::*;
use crate::{compare_ids, CandidateIndex};

/// Keeps the zone groups where `party_id` holds rank 1 in version A.
///
/// Only the version A entries of the member candidates are looked at: a group
/// whose rank 1 belongs to another party is dropped even if the filtered party
/// is present at a lower rank. Without a party, the groups pass through.
pub fn filter_by_rank1_party(
    groups: Vec<ZoneGroup>,
    index_a: &CandidateIndex<'_>,
    party_id: Option<&str>,
) -> Vec<ZoneGroup> {
    let party_id = match party_id {
        Some(p) => p,
        None => return groups,
    };
    let before = groups.len();
    let kept: Vec<ZoneGroup> = groups
        .into_iter()
        .filter(|g| {
            g.keys.iter().any(|k| {
                index_a
                    .get(k)
                    .map(|e| e.candidate.rank == 1 && e.candidate.party_id == party_id)
                    .unwrap_or(false)
            })
        })
        .collect();
    debug!(
        "filter_by_rank1_party: party {}: kept {} of {} zones",
        party_id,
        kept.len(),
        before
    );
    kept
}

/// Orders the zones in place. All the sorts are stable.
///
/// When `by_total_delta` is set, it takes precedence over `mode`: the zones
/// are ordered by total vote delta (B - A), largest first, and the zones with
/// no change always come last. Otherwise `mode` orders the zones by the
/// invalid or turnout percentage of the `side` version.
pub fn sort_zones(zones: &mut [ZoneComparison], mode: SortMode, side: Side, by_total_delta: bool) {
    if by_total_delta {
        zones.sort_by(|x, y| {
            let (dx, dy) = (x.total_vote_delta, y.total_vote_delta);
            (dx == 0).cmp(&(dy == 0)).then_with(|| dy.cmp(&dx))
        });
        return;
    }
    match mode {
        SortMode::Unsorted => {}
        SortMode::InvalidAsc => {
            zones.sort_by(|x, y| x.metrics(side).invalid_pct.total_cmp(&y.metrics(side).invalid_pct))
        }
        SortMode::InvalidDesc => {
            zones.sort_by(|x, y| y.metrics(side).invalid_pct.total_cmp(&x.metrics(side).invalid_pct))
        }
        SortMode::TurnoutAsc => {
            zones.sort_by(|x, y| x.metrics(side).turnout_pct.total_cmp(&y.metrics(side).turnout_pct))
        }
        SortMode::TurnoutDesc => {
            zones.sort_by(|x, y| y.metrics(side).turnout_pct.total_cmp(&x.metrics(side).turnout_pct))
        }
    }
}

/// The parties that lead at least one zone of the snapshot, by party id.
pub fn rank1_parties(snapshot: &Snapshot) -> Vec<PartyOption> {
    let mut parties: HashMap<&str, &str> = HashMap::new();
    for record in snapshot.zones.iter() {
        for c in record.candidates.iter().filter(|c| c.rank == 1) {
            parties.entry(c.party_id.as_str()).or_insert(c.party.as_str());
        }
    }
    let mut res: Vec<PartyOption> = parties
        .into_iter()
        .map(|(party_id, party)| PartyOption {
            party_id: party_id.to_string(),
            party: party.to_string(),
        })
        .collect();
    res.sort_by(|a, b| compare_ids(&a.party_id, &b.party_id));
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{build_candidate_index, SnapshotBuilder};

    fn comparison(zone_id: &str, invalid_a: f64, turnout_b: f64, delta: i64) -> ZoneComparison {
        ZoneComparison {
            group: ZoneGroup {
                province_id: "1".to_string(),
                province: "P".to_string(),
                zone: "1".to_string(),
                zone_id: zone_id.to_string(),
                keys: vec![],
                info_a: None,
                info_b: None,
            },
            rows: vec![],
            metrics_a: ZoneMetrics {
                invalid_pct: invalid_a,
                ..ZoneMetrics::default()
            },
            metrics_b: ZoneMetrics {
                turnout_pct: turnout_b,
                ..ZoneMetrics::default()
            },
            total_vote_delta: delta,
        }
    }

    fn ids(zones: &[ZoneComparison]) -> Vec<&str> {
        zones.iter().map(|z| z.group.zone_id.as_str()).collect()
    }

    fn sample() -> Vec<ZoneComparison> {
        vec![
            comparison("a", 3.0, 60.0, 0),
            comparison("b", 1.0, 70.0, -5),
            comparison("c", 2.0, 50.0, 12),
            comparison("d", 1.0, 70.0, 0),
            comparison("e", 5.0, 40.0, 3),
        ]
    }

    #[test]
    fn total_delta_puts_zero_last() {
        let mut zones = sample();
        sort_zones(&mut zones, SortMode::InvalidAsc, Side::A, true);
        assert_eq!(ids(&zones), vec!["c", "e", "b", "a", "d"]);
    }

    #[test]
    fn metric_sorts_read_selected_side() {
        let mut zones = sample();
        sort_zones(&mut zones, SortMode::InvalidAsc, Side::A, false);
        assert_eq!(ids(&zones), vec!["b", "d", "c", "a", "e"]);

        let mut zones = sample();
        sort_zones(&mut zones, SortMode::InvalidDesc, Side::A, false);
        assert_eq!(ids(&zones), vec!["e", "a", "c", "b", "d"]);

        let mut zones = sample();
        sort_zones(&mut zones, SortMode::TurnoutDesc, Side::B, false);
        assert_eq!(ids(&zones), vec!["b", "d", "a", "c", "e"]);

        // Version A has no turnout in this sample: everything ties and the order is kept.
        let mut zones = sample();
        sort_zones(&mut zones, SortMode::TurnoutAsc, Side::A, false);
        assert_eq!(ids(&zones), vec!["a", "b", "c", "d", "e"]);

        let mut zones = sample();
        sort_zones(&mut zones, SortMode::Unsorted, Side::B, false);
        assert_eq!(ids(&zones), vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn party_filter_only_looks_at_rank_1() {
        let a = SnapshotBuilder::new("A")
            .zone(
                ZoneInfo::new("Z1", "1", "P", "1"),
                &[
                    CandidateResult::new(1, 1, 300, "11"),
                    CandidateResult::new(2, 2, 200, "10"),
                ],
            )
            .zone(
                ZoneInfo::new("Z2", "1", "P", "2"),
                &[
                    CandidateResult::new(1, 2, 100, "11"),
                    CandidateResult::new(2, 1, 200, "10"),
                ],
            )
            .build();
        let index_a = build_candidate_index(&a);
        let group = |zone_id: &str, zone: &str| ZoneGroup {
            province_id: "1".to_string(),
            province: "P".to_string(),
            zone: zone.to_string(),
            zone_id: zone_id.to_string(),
            keys: vec![CandidateKey::new(zone_id, 1), CandidateKey::new(zone_id, 2)],
            info_a: None,
            info_b: None,
        };
        let groups = vec![group("Z1", "1"), group("Z2", "2")];

        let kept = filter_by_rank1_party(groups.clone(), &index_a, Some("10"));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].zone_id, "Z2");

        assert!(filter_by_rank1_party(groups.clone(), &index_a, Some("99")).is_empty());
        assert_eq!(filter_by_rank1_party(groups, &index_a, None).len(), 2);
    }

    #[test]
    fn parties_are_deduplicated_and_ordered() {
        let s = SnapshotBuilder::new("A")
            .zone(
                ZoneInfo::new("Z1", "1", "P", "1"),
                &[
                    CandidateResult::new(1, 1, 300, "10").with_party("Ten"),
                    CandidateResult::new(2, 2, 200, "2").with_party("Two"),
                ],
            )
            .zone(
                ZoneInfo::new("Z2", "1", "P", "2"),
                &[CandidateResult::new(1, 1, 300, "9").with_party("Nine")],
            )
            .zone(
                ZoneInfo::new("Z3", "1", "P", "3"),
                &[CandidateResult::new(1, 1, 300, "10").with_party("Ten")],
            )
            .build();
        let parties = rank1_parties(&s);
        let ids: Vec<&str> = parties.iter().map(|p| p.party_id.as_str()).collect();
        assert_eq!(ids, vec!["9", "10"]);
        assert_eq!(parties[1].party, "Ten");
    }
}
