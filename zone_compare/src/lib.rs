/*!
Comparison of two snapshots of constituency election results.

A snapshot is the list of zones published under one version tag, each zone
carrying its ballot counters and the tally of its candidates. This crate joins
two snapshots candidate by candidate, groups the result by zone, computes the
invalid-vote and turnout percentages, finds the close races that the invalid
votes could overturn, and applies the filter and orderings requested by the
caller.

```
use zone_compare::*;

let a = SnapshotBuilder::new("20260208T120000")
    .zone(
        ZoneInfo::new("1001", "10", "Bangkok", "1").with_ballots(900, 80, 20).with_eligible(2000),
        &[
            CandidateResult::new(1, 1, 500, "10"),
            CandidateResult::new(2, 2, 400, "11"),
        ],
    )
    .build();
let b = SnapshotBuilder::new("20260208T130000")
    .zone(
        ZoneInfo::new("1001", "10", "Bangkok", "1").with_ballots(1000, 90, 20).with_eligible(2000),
        &[
            CandidateResult::new(1, 1, 560, "10"),
            CandidateResult::new(2, 2, 440, "11"),
        ],
    )
    .build();

let cmp = compare_snapshots(&a, &b, &ViewOptions::default(), &Thresholds::DEFAULT);
assert_eq!(cmp.summary.total_votes_diff, 110);
assert_eq!(cmp.zones[0].rows[0].diff, 60);
```

The whole computation is pure: nothing is cached between two calls.
*/

pub mod builder;
mod close_race;
mod config;
pub mod manual;
mod metrics;
mod quality;
mod view;

use log::{debug, info, warn};

use std::{
    cmp::Ordering,
    collections::{HashMap, HashSet},
};

pub use crate::builder::SnapshotBuilder;
pub use crate::close_race::*;
pub use crate::config::*;
pub use crate::metrics::*;
pub use crate::quality::*;
pub use crate::view::*;

/// A candidate and its zone, as found in one snapshot.
#[derive(Debug, Clone, Copy)]
pub struct IndexEntry<'a> {
    pub zone: &'a ZoneInfo,
    pub candidate: &'a CandidateResult,
}

/// Point lookup of the candidates of one snapshot.
pub type CandidateIndex<'a> = HashMap<CandidateKey, IndexEntry<'a>>;

/// Lookup of the zone figures of one snapshot by zone id.
pub type ZoneIndex<'a> = HashMap<&'a str, &'a ZoneInfo>;

/// Indexes all the candidates of a snapshot by `(zone_id, candidate_no)`.
///
/// Duplicated keys are not expected in well-formed data. If they happen, the
/// last one wins.
pub fn build_candidate_index(snapshot: &Snapshot) -> CandidateIndex<'_> {
    let mut index = CandidateIndex::new();
    for record in snapshot.zones.iter() {
        for candidate in record.candidates.iter() {
            let key = CandidateKey::new(&record.info.zone_id, candidate.candidate_no);
            let entry = IndexEntry {
                zone: &record.info,
                candidate,
            };
            if index.insert(key.clone(), entry).is_some() {
                warn!(
                    "build_candidate_index: version {}: duplicate candidate {}, keeping the last one",
                    snapshot.version, key
                );
            }
        }
    }
    debug!(
        "build_candidate_index: version {}: {} candidates",
        snapshot.version,
        index.len()
    );
    index
}

/// Indexes the zone figures of a snapshot by zone id. The last duplicate wins.
pub fn build_zone_index(snapshot: &Snapshot) -> ZoneIndex<'_> {
    snapshot
        .zones
        .iter()
        .map(|record| (record.info.zone_id.as_str(), &record.info))
        .collect()
}

/// Compares two identifiers that are numbers encoded as strings.
///
/// Identifiers that are not integers come after all the numeric ones and are
/// compared as text.
pub fn compare_ids(a: &str, b: &str) -> Ordering {
    match (a.trim().parse::<i64>(), b.trim().parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// Province, then zone.
pub fn compare_zones(a: &ZoneInfo, b: &ZoneInfo) -> Ordering {
    compare_ids(&a.province_id, &b.province_id).then_with(|| compare_ids(&a.zone, &b.zone))
}

/// The zones of a snapshot ordered by province then zone. Ties keep the snapshot order.
pub fn sorted_zones(snapshot: &Snapshot) -> Vec<&ZoneRecord> {
    let mut zones: Vec<&ZoneRecord> = snapshot.zones.iter().collect();
    zones.sort_by(|a, b| compare_zones(&a.info, &b.info));
    zones
}

/// The union of the keys of both indexes, each key once, ordered by province,
/// zone and candidate number.
///
/// The zone used for ordering a key is the one of version A when the key is
/// present there, otherwise the one of version B. The zone id breaks the
/// remaining ties so that the order is total.
pub fn join_keys(index_a: &CandidateIndex<'_>, index_b: &CandidateIndex<'_>) -> Vec<CandidateKey> {
    let mut entries: Vec<(&CandidateKey, &ZoneInfo)> =
        index_a.iter().map(|(k, e)| (k, e.zone)).collect();
    entries.extend(
        index_b
            .iter()
            .filter(|(k, _)| !index_a.contains_key(*k))
            .map(|(k, e)| (k, e.zone)),
    );
    entries.sort_by(|(ka, za), (kb, zb)| {
        compare_zones(za, zb)
            .then_with(|| ka.candidate_no.cmp(&kb.candidate_no))
            .then_with(|| ka.zone_id.cmp(&kb.zone_id))
    });
    entries.into_iter().map(|(k, _)| k.clone()).collect()
}

/// Pairs the votes of both versions for each key.
///
/// A candidate missing from one version counts 0 votes on that side.
pub fn join_rows(
    keys: &[CandidateKey],
    index_a: &CandidateIndex<'_>,
    index_b: &CandidateIndex<'_>,
) -> Vec<JoinedRow> {
    let mut rows: Vec<JoinedRow> = Vec::with_capacity(keys.len());
    for key in keys.iter() {
        let entry_a = index_a.get(key);
        let entry_b = index_b.get(key);
        let entry = match entry_a.or(entry_b) {
            Some(e) => e,
            None => continue,
        };
        let vote_a = entry_a.map(|e| e.candidate.vote).unwrap_or(0);
        let vote_b = entry_b.map(|e| e.candidate.vote).unwrap_or(0);
        rows.push(JoinedRow {
            key: key.clone(),
            zone: entry.zone.clone(),
            candidate: entry.candidate.clone(),
            vote_a,
            vote_b,
            diff: vote_delta(vote_a, vote_b),
        });
    }
    rows
}

/// Groups the ordered keys by `(province_id, zone)`, in order of first appearance.
///
/// The zone figures of each version are looked up with the zone id of the
/// first key of the group. They are `None` when the zone is missing from that
/// version.
pub fn group_zones(
    keys: &[CandidateKey],
    index_a: &CandidateIndex<'_>,
    index_b: &CandidateIndex<'_>,
    zones_a: &ZoneIndex<'_>,
    zones_b: &ZoneIndex<'_>,
) -> Vec<ZoneGroup> {
    let mut groups: Vec<ZoneGroup> = Vec::new();
    let mut positions: HashMap<(&str, &str), usize> = HashMap::new();
    for key in keys.iter() {
        let entry = match index_a.get(key).or_else(|| index_b.get(key)) {
            Some(e) => e,
            None => continue,
        };
        let zone = entry.zone;
        match positions.get(&(zone.province_id.as_str(), zone.zone.as_str())) {
            Some(&pos) => groups[pos].keys.push(key.clone()),
            None => {
                positions.insert((zone.province_id.as_str(), zone.zone.as_str()), groups.len());
                groups.push(ZoneGroup {
                    province_id: zone.province_id.clone(),
                    province: zone.province.clone(),
                    zone: zone.zone.clone(),
                    zone_id: key.zone_id.clone(),
                    keys: vec![key.clone()],
                    info_a: zones_a.get(key.zone_id.as_str()).map(|z| (*z).clone()),
                    info_b: zones_b.get(key.zone_id.as_str()).map(|z| (*z).clone()),
                });
            }
        }
    }
    debug!("group_zones: {} keys in {} groups", keys.len(), groups.len());
    groups
}

/// Runs the full comparison of two snapshots.
///
/// Arguments:
/// * `snapshot_a`, `snapshot_b` the two versions to compare. Diffs are `B - A`.
/// * `options` the filter and orderings to apply to the zones and close races.
/// * `thresholds` the limits of the noteworthy flags.
pub fn compare_snapshots(
    snapshot_a: &Snapshot,
    snapshot_b: &Snapshot,
    options: &ViewOptions,
    thresholds: &Thresholds,
) -> Comparison {
    info!(
        "compare_snapshots: {} zones in version {}, {} zones in version {}, options: {:?}",
        snapshot_a.zones.len(),
        snapshot_a.version,
        snapshot_b.zones.len(),
        snapshot_b.version,
        options
    );

    let index_a = build_candidate_index(snapshot_a);
    let index_b = build_candidate_index(snapshot_b);
    let zones_a = build_zone_index(snapshot_a);
    let zones_b = build_zone_index(snapshot_b);

    let keys = join_keys(&index_a, &index_b);
    let groups = group_zones(&keys, &index_a, &index_b, &zones_a, &zones_b);
    let groups = filter_by_rank1_party(groups, &index_a, options.party_filter.as_deref());

    let mut rows_by_key: HashMap<CandidateKey, JoinedRow> = join_rows(&keys, &index_a, &index_b)
        .into_iter()
        .map(|row| (row.key.clone(), row))
        .collect();

    let mut zones: Vec<ZoneComparison> = groups
        .into_iter()
        .map(|group| {
            let rows: Vec<JoinedRow> = group
                .keys
                .iter()
                .filter_map(|k| rows_by_key.remove(k))
                .collect();
            annotate_group(group, rows, thresholds)
        })
        .collect();
    sort_zones(
        &mut zones,
        options.sort_mode,
        options.sort_version,
        options.sort_by_total_delta,
    );

    let mut close_races = close_race_rows(snapshot_b, thresholds.margin_significant_pct);
    sort_close_races(&mut close_races, options.close_race_order);

    let summary = summarize(snapshot_a, snapshot_b);
    info!(
        "compare_snapshots: {} zones kept, {} close races, total votes {} -> {} ({:+})",
        zones.len(),
        close_races.len(),
        summary.total_votes_a,
        summary.total_votes_b,
        summary.total_votes_diff
    );

    Comparison {
        version_a: snapshot_a.version.clone(),
        version_b: snapshot_b.version.clone(),
        summary,
        zones,
        close_races,
        parties: rank1_parties(snapshot_a),
    }
}

fn annotate_group(group: ZoneGroup, rows: Vec<JoinedRow>, thresholds: &Thresholds) -> ZoneComparison {
    let metrics_a = zone_metrics(group.info_a.as_ref(), thresholds);
    let metrics_b = zone_metrics(group.info_b.as_ref(), thresholds);
    let total_vote_delta = group.total_vote_delta();
    ZoneComparison {
        group,
        rows,
        metrics_a,
        metrics_b,
        total_vote_delta,
    }
}

/// Total votes of both snapshots and their difference.
pub fn summarize(snapshot_a: &Snapshot, snapshot_b: &Snapshot) -> ComparisonSummary {
    let total_votes_a = snapshot_a.total_votes();
    let total_votes_b = snapshot_b.total_votes();
    ComparisonSummary {
        total_votes_a,
        total_votes_b,
        total_votes_diff: vote_delta(total_votes_a, total_votes_b),
    }
}

/// The distinct keys of an index. Mostly useful for checking a join.
pub fn index_keys(index: &CandidateIndex<'_>) -> HashSet<CandidateKey> {
    index.keys().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn zone(zone_id: &str, province_id: &str, zone: &str) -> ZoneInfo {
        ZoneInfo::new(zone_id, province_id, &format!("P{}", province_id), zone)
    }

    fn snapshot_a() -> Snapshot {
        SnapshotBuilder::new("A")
            .zone(
                zone("Z2", "2", "1").with_ballots(300, 10, 5),
                &[
                    CandidateResult::new(2, 1, 200, "10"),
                    CandidateResult::new(1, 2, 100, "11"),
                ],
            )
            .zone(
                zone("Z1", "1", "2").with_ballots(600, 20, 0),
                &[
                    CandidateResult::new(3, 1, 500, "11"),
                    CandidateResult::new(1, 2, 100, "10"),
                ],
            )
            .zone(
                zone("Z10", "10", "1").with_ballots(50, 0, 0),
                &[CandidateResult::new(1, 1, 50, "12")],
            )
            .build()
    }

    fn snapshot_b() -> Snapshot {
        SnapshotBuilder::new("B")
            .zone(
                zone("Z1", "1", "2").with_ballots(700, 25, 0),
                &[
                    CandidateResult::new(1, 1, 400, "10"),
                    CandidateResult::new(2, 2, 300, "12"),
                ],
            )
            .zone(
                zone("Z2", "2", "1").with_ballots(300, 10, 5),
                &[
                    CandidateResult::new(1, 1, 150, "11"),
                    CandidateResult::new(2, 2, 150, "10"),
                ],
            )
            .build()
    }

    #[test]
    fn index_keeps_last_duplicate() {
        init_logger();
        let s = SnapshotBuilder::new("dup")
            .zone(
                zone("Z1", "1", "1"),
                &[
                    CandidateResult::new(1, 1, 10, "10"),
                    CandidateResult::new(1, 2, 20, "11"),
                ],
            )
            .build();
        let index = build_candidate_index(&s);
        assert_eq!(index.len(), 1);
        assert_eq!(index[&CandidateKey::new("Z1", 1)].candidate.vote, 20);
    }

    #[test]
    fn empty_snapshot_gives_empty_index() {
        let s = Snapshot::default();
        assert!(build_candidate_index(&s).is_empty());
        assert!(build_zone_index(&s).is_empty());
    }

    #[test]
    fn ids_compare_numerically() {
        assert_eq!(compare_ids("2", "10"), Ordering::Less);
        assert_eq!(compare_ids("10", "10"), Ordering::Equal);
        assert_eq!(compare_ids("10", "x"), Ordering::Less);
        assert_eq!(compare_ids("b", "a"), Ordering::Greater);
    }

    #[test]
    fn join_orders_by_province_zone_candidate() {
        let (a, b) = (snapshot_a(), snapshot_b());
        let (ia, ib) = (build_candidate_index(&a), build_candidate_index(&b));
        let keys = join_keys(&ia, &ib);
        let expected = vec![
            CandidateKey::new("Z1", 1),
            CandidateKey::new("Z1", 2),
            CandidateKey::new("Z1", 3),
            CandidateKey::new("Z2", 1),
            CandidateKey::new("Z2", 2),
            CandidateKey::new("Z10", 1),
        ];
        assert_eq!(keys, expected);
    }

    #[test]
    fn join_uses_zero_for_missing_side() {
        let (a, b) = (snapshot_a(), snapshot_b());
        let (ia, ib) = (build_candidate_index(&a), build_candidate_index(&b));
        let rows = join_rows(&join_keys(&ia, &ib), &ia, &ib);
        let only_a = rows
            .iter()
            .find(|r| r.key == CandidateKey::new("Z1", 3))
            .unwrap();
        assert_eq!((only_a.vote_a, only_a.vote_b, only_a.diff), (500, 0, -500));
        let only_b = rows
            .iter()
            .find(|r| r.key == CandidateKey::new("Z1", 2))
            .unwrap();
        assert_eq!((only_b.vote_a, only_b.vote_b, only_b.diff), (0, 300, 300));
        assert_eq!(only_b.candidate.party_id, "12");
    }

    #[test]
    fn join_prefers_version_a_for_display() {
        let (a, b) = (snapshot_a(), snapshot_b());
        let (ia, ib) = (build_candidate_index(&a), build_candidate_index(&b));
        let rows = join_rows(&[CandidateKey::new("Z1", 1)], &ia, &ib);
        assert_eq!(rows[0].candidate.rank, 2);
        assert_eq!(rows[0].zone.total_vote, 620);
    }

    #[test]
    fn groups_follow_join_order() {
        let (a, b) = (snapshot_a(), snapshot_b());
        let (ia, ib) = (build_candidate_index(&a), build_candidate_index(&b));
        let (za, zb) = (build_zone_index(&a), build_zone_index(&b));
        let groups = group_zones(&join_keys(&ia, &ib), &ia, &ib, &za, &zb);
        let ids: Vec<&str> = groups.iter().map(|g| g.zone_id.as_str()).collect();
        assert_eq!(ids, vec!["Z1", "Z2", "Z10"]);
        assert_eq!(groups[0].keys.len(), 3);
        assert!(groups[2].info_a.is_some());
        assert!(groups[2].info_b.is_none());
        assert_eq!(groups[2].total_vote_delta(), -50);
    }

    #[test]
    fn compare_end_to_end() {
        init_logger();
        let (a, b) = (snapshot_a(), snapshot_b());
        let cmp = compare_snapshots(&a, &b, &ViewOptions::default(), &Thresholds::DEFAULT);
        assert_eq!(cmp.version_a, "A");
        assert_eq!(cmp.summary.total_votes_a, 315 + 620 + 50);
        assert_eq!(cmp.summary.total_votes_b, 725 + 315);
        assert_eq!(cmp.summary.total_votes_diff, 1040 - 985);
        assert_eq!(cmp.zones.len(), 3);
        assert_eq!(cmp.zones[0].rows.len(), 3);
        let all_rows: usize = cmp.zones.iter().map(|z| z.rows.len()).sum();
        assert_eq!(all_rows, 6);
        let parties: Vec<&str> = cmp.parties.iter().map(|p| p.party_id.as_str()).collect();
        assert_eq!(parties, vec!["10", "11", "12"]);
    }

    #[test]
    fn compare_applies_party_filter_and_total_sort() {
        let (a, b) = (snapshot_a(), snapshot_b());
        let options = ViewOptions::from_params([("party", "11"), ("sortTotal", "1")]);
        let cmp = compare_snapshots(&a, &b, &options, &Thresholds::DEFAULT);
        let ids: Vec<&str> = cmp.zones.iter().map(|z| z.group.zone_id.as_str()).collect();
        assert_eq!(ids, vec!["Z1"]);

        let options = ViewOptions::from_params([("sortTotal", "1")]);
        let cmp = compare_snapshots(&a, &b, &options, &Thresholds::DEFAULT);
        let deltas: Vec<i64> = cmp.zones.iter().map(|z| z.total_vote_delta).collect();
        assert_eq!(deltas, vec![105, -50, 0]);
    }

    #[test]
    fn extreme_votes_clamp_the_differences() {
        let a = SnapshotBuilder::new("A")
            .zone(
                zone("Z1", "1", "1").with_total_vote(u64::MAX),
                &[CandidateResult::new(1, 1, u64::MAX, "10")],
            )
            .build();
        let b = SnapshotBuilder::new("B")
            .zone(zone("Z1", "1", "1"), &[CandidateResult::new(1, 1, 0, "10")])
            .build();
        let cmp = compare_snapshots(&a, &b, &ViewOptions::default(), &Thresholds::DEFAULT);
        assert_eq!(cmp.zones[0].rows[0].diff, i64::MIN);
        assert_eq!(cmp.zones[0].total_vote_delta, i64::MIN);
        assert_eq!(cmp.summary.total_votes_diff, i64::MIN);

        let back = summarize(&b, &a);
        assert_eq!(back.total_votes_diff, i64::MAX);
    }
}
