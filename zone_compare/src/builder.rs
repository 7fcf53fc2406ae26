pub use crate::config::*;

/// A builder for assembling a snapshot in memory.
///
/// It is the simplest way to create fixtures without going through the JSON
/// format of the published data.
///
/// ```
/// use zone_compare::builder::SnapshotBuilder;
/// use zone_compare::{CandidateResult, ZoneInfo};
///
/// let snapshot = SnapshotBuilder::new("20260208T120000")
///     .zone(
///         ZoneInfo::new("1001", "10", "Bangkok", "1").with_ballots(900, 80, 20),
///         &[CandidateResult::new(1, 1, 500, "10")],
///     )
///     .ranked_zone(
///         ZoneInfo::new("1002", "10", "Bangkok", "2"),
///         &[(1, 300, "10"), (2, 700, "11")],
///     )
///     .build();
///
/// assert_eq!(snapshot.zones.len(), 2);
/// assert_eq!(snapshot.zones[1].candidates[1].rank, 1);
/// ```
pub struct SnapshotBuilder {
    pub(crate) _version: String,
    pub(crate) _zones: Vec<ZoneRecord>,
}

impl SnapshotBuilder {
    pub fn new(version: &str) -> SnapshotBuilder {
        SnapshotBuilder {
            _version: version.to_string(),
            _zones: Vec::new(),
        }
    }

    /// Adds a zone with candidates whose ranks are already known.
    pub fn zone(mut self, info: ZoneInfo, candidates: &[CandidateResult]) -> SnapshotBuilder {
        self.add_zone(info, candidates.to_vec());
        self
    }

    /// Adds a zone from `(candidate_no, vote, party_id)` triples.
    ///
    /// Ranks are assigned by decreasing votes. Equal votes are ranked by candidate number.
    pub fn ranked_zone(mut self, info: ZoneInfo, votes: &[(u32, u64, &str)]) -> SnapshotBuilder {
        let mut order: Vec<&(u32, u64, &str)> = votes.iter().collect();
        order.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        let candidates: Vec<CandidateResult> = votes
            .iter()
            .map(|(no, vote, party_id)| {
                let rank = order
                    .iter()
                    .position(|(no2, _, _)| no2 == no)
                    .map(|pos| pos as u32 + 1)
                    .unwrap_or(0);
                CandidateResult::new(*no, rank, *vote, party_id)
            })
            .collect();
        self.add_zone(info, candidates);
        self
    }

    pub fn add_zone(&mut self, info: ZoneInfo, candidates: Vec<CandidateResult>) {
        self._zones.push(ZoneRecord { info, candidates });
    }

    pub fn build(self) -> Snapshot {
        Snapshot {
            version: self._version,
            zones: self._zones,
        }
    }
}
