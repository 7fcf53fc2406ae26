// ********* Input data structures ***********

/// Aggregate statistics of one constituency in one snapshot.
///
/// `good_vote + invalid_vote + no_vote` is expected to equal `total_vote`, but
/// this is not enforced: a deviation is reported by the quality report, it is
/// not an error.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct ZoneInfo {
    /// Stable identifier, unique within a snapshot.
    pub zone_id: String,
    pub province_id: String,
    pub province: String,
    /// Display label of the zone inside its province (usually a number).
    pub zone: String,
    pub total_vote: u64,
    pub good_vote: u64,
    pub invalid_vote: u64,
    pub no_vote: u64,
    /// Number of eligible voters.
    pub eligible: u64,
}

impl ZoneInfo {
    pub fn new(zone_id: &str, province_id: &str, province: &str, zone: &str) -> ZoneInfo {
        ZoneInfo {
            zone_id: zone_id.to_string(),
            province_id: province_id.to_string(),
            province: province.to_string(),
            zone: zone.to_string(),
            ..ZoneInfo::default()
        }
    }

    /// Sets the ballot counters. `total_vote` is the sum of good, invalid and blank votes.
    pub fn with_ballots(self, good_vote: u64, invalid_vote: u64, no_vote: u64) -> ZoneInfo {
        ZoneInfo {
            total_vote: vote_sum([good_vote, invalid_vote, no_vote]),
            good_vote,
            invalid_vote,
            no_vote,
            ..self
        }
    }

    pub fn with_total_vote(self, total_vote: u64) -> ZoneInfo {
        ZoneInfo { total_vote, ..self }
    }

    pub fn with_eligible(self, eligible: u64) -> ZoneInfo {
        ZoneInfo { eligible, ..self }
    }
}

/// The tally of one candidate within a zone, in one snapshot.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct CandidateResult {
    /// Ballot number, unique within a zone.
    pub candidate_no: u32,
    /// 1-based finishing position within the zone. Rank 1 is leading.
    pub rank: u32,
    pub vote: u64,
    pub party_id: String,
    pub party: String,
    pub first_name: String,
    pub last_name: String,
}

impl CandidateResult {
    pub fn new(candidate_no: u32, rank: u32, vote: u64, party_id: &str) -> CandidateResult {
        CandidateResult {
            candidate_no,
            rank,
            vote,
            party_id: party_id.to_string(),
            ..CandidateResult::default()
        }
    }

    pub fn with_party(self, party: &str) -> CandidateResult {
        CandidateResult {
            party: party.to_string(),
            ..self
        }
    }

    pub fn with_name(self, first_name: &str, last_name: &str) -> CandidateResult {
        CandidateResult {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            ..self
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// One zone of a snapshot and the candidates that ran in it.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ZoneRecord {
    pub info: ZoneInfo,
    pub candidates: Vec<CandidateResult>,
}

/// All the zone results published under one version tag.
///
/// Snapshots are never mutated once loaded.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct Snapshot {
    pub version: String,
    pub zones: Vec<ZoneRecord>,
}

impl Snapshot {
    pub fn total_votes(&self) -> u64 {
        vote_sum(self.zones.iter().map(|z| z.info.total_vote))
    }
}

/// The party-list results published next to a constituency snapshot.
///
/// Only the zone counters are kept: they are used to cross-check the total
/// votes of the constituency snapshot with the same version.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct PartyListSnapshot {
    pub version: String,
    pub zones: Vec<ZoneInfo>,
}

impl PartyListSnapshot {
    pub fn total_votes(&self) -> u64 {
        vote_sum(self.zones.iter().map(|z| z.total_vote))
    }
}

/// Adds vote counters. Corrupted counters saturate instead of overflowing.
pub fn vote_sum<I: IntoIterator<Item = u64>>(votes: I) -> u64 {
    votes.into_iter().fold(0, |acc, v| acc.saturating_add(v))
}

/// `b - a`, clamped to the range of `i64`.
pub fn vote_delta(a: u64, b: u64) -> i64 {
    let d = b as i128 - a as i128;
    d.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Identifies one candidate across versions.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Ord, PartialOrd)]
pub struct CandidateKey {
    pub zone_id: String,
    pub candidate_no: u32,
}

impl CandidateKey {
    pub fn new(zone_id: &str, candidate_no: u32) -> CandidateKey {
        CandidateKey {
            zone_id: zone_id.to_string(),
            candidate_no,
        }
    }
}

impl std::fmt::Display for CandidateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.zone_id, self.candidate_no)
    }
}

// ********* Configuration **********

/// Which of the two compared snapshots a value is read from.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
pub enum Side {
    #[default]
    A,
    B,
}

/// Ordering of the zones by one of their metrics.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
pub enum SortMode {
    #[default]
    Unsorted,
    InvalidAsc,
    InvalidDesc,
    TurnoutAsc,
    TurnoutDesc,
}

impl SortMode {
    /// Unknown values are not an error: they mean no sorting.
    pub fn parse(s: &str) -> SortMode {
        match s {
            "invalid_asc" => SortMode::InvalidAsc,
            "invalid_desc" => SortMode::InvalidDesc,
            "turnout_asc" => SortMode::TurnoutAsc,
            "turnout_desc" => SortMode::TurnoutDesc,
            _ => SortMode::Unsorted,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortMode::Unsorted => "",
            SortMode::InvalidAsc => "invalid_asc",
            SortMode::InvalidDesc => "invalid_desc",
            SortMode::TurnoutAsc => "turnout_asc",
            SortMode::TurnoutDesc => "turnout_desc",
        }
    }
}

/// Ordering of the close-race rows by invalid votes.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
pub enum InvalidOrder {
    #[default]
    Unsorted,
    Asc,
    Desc,
}

impl InvalidOrder {
    pub fn parse(s: &str) -> InvalidOrder {
        match s {
            "asc" => InvalidOrder::Asc,
            "desc" => InvalidOrder::Desc,
            _ => InvalidOrder::Unsorted,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InvalidOrder::Unsorted => "",
            InvalidOrder::Asc => "asc",
            InvalidOrder::Desc => "desc",
        }
    }
}

/// The caller's view of a comparison: selected versions, filter and orderings.
///
/// This is usually built from the query parameters of a request with
/// [`ViewOptions::from_params`].
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct ViewOptions {
    pub version_a: Option<String>,
    pub version_b: Option<String>,
    /// Keep only the zones where this party holds rank 1 in version A.
    pub party_filter: Option<String>,
    pub sort_mode: SortMode,
    /// The version whose metrics `sort_mode` reads.
    pub sort_version: Side,
    /// Overrides `sort_mode` when set.
    pub sort_by_total_delta: bool,
    pub close_race_order: InvalidOrder,
}

impl ViewOptions {
    /// Reads the options from query-style key/value pairs.
    ///
    /// Recognized keys: `a`, `b`, `party`, `sort`, `sortVer`, `sortTotal`,
    /// `sortInvalid`. Unknown keys are ignored and unrecognized values fall
    /// back to the inert default. When a key appears several times, the last
    /// value wins.
    pub fn from_params<I, K, V>(params: I) -> ViewOptions
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut res = ViewOptions::default();
        for (k, v) in params {
            res.apply_param(k.as_ref(), v.as_ref());
        }
        res
    }

    /// Applies a single key/value pair on top of the current options.
    pub fn apply_param(&mut self, key: &str, value: &str) {
        let value = value.trim();
        match key {
            "a" => self.version_a = non_empty(value),
            "b" => self.version_b = non_empty(value),
            "party" => {
                self.party_filter = match value {
                    "" | "__all__" => None,
                    x => Some(x.to_string()),
                }
            }
            "sort" => self.sort_mode = SortMode::parse(value),
            "sortVer" => {
                self.sort_version = if value.eq_ignore_ascii_case("b") {
                    Side::B
                } else {
                    Side::A
                }
            }
            "sortTotal" => self.sort_by_total_delta = matches!(value, "1" | "true"),
            "sortInvalid" => self.close_race_order = InvalidOrder::parse(value),
            _ => {}
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Thresholds of the noteworthy flags.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct Thresholds {
    /// An invalid-vote percentage strictly above this value is flagged.
    pub invalid_pct: f64,
    /// A race is close when the margin is strictly below this percentage of the total votes.
    pub margin_significant_pct: f64,
}

impl Thresholds {
    pub const DEFAULT: Thresholds = Thresholds {
        invalid_pct: 10.0,
        margin_significant_pct: 10.0,
    };
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds::DEFAULT
    }
}

// ******** Output data structures *********

/// One candidate seen in either snapshot, with its vote in both.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct JoinedRow {
    pub key: CandidateKey,
    /// Taken from version A when present there, otherwise from version B.
    pub zone: ZoneInfo,
    /// Taken from version A when present there, otherwise from version B.
    pub candidate: CandidateResult,
    /// 0 when the candidate is missing from version A.
    pub vote_a: u64,
    /// 0 when the candidate is missing from version B.
    pub vote_b: u64,
    /// `vote_b - vote_a`
    pub diff: i64,
}

/// The candidates sharing a `(province_id, zone)` pair, with the zone figures of both versions.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ZoneGroup {
    pub province_id: String,
    pub province: String,
    pub zone: String,
    /// The zone id of the first candidate of the group.
    pub zone_id: String,
    pub keys: Vec<CandidateKey>,
    pub info_a: Option<ZoneInfo>,
    pub info_b: Option<ZoneInfo>,
}

impl ZoneGroup {
    pub fn info(&self, side: Side) -> Option<&ZoneInfo> {
        match side {
            Side::A => self.info_a.as_ref(),
            Side::B => self.info_b.as_ref(),
        }
    }

    /// Total votes of version B minus those of version A. A missing side counts as 0.
    pub fn total_vote_delta(&self) -> i64 {
        let total = |info: &Option<ZoneInfo>| info.as_ref().map(|i| i.total_vote).unwrap_or(0);
        vote_delta(total(&self.info_a), total(&self.info_b))
    }
}

/// Derived percentages of one zone in one version.
#[derive(PartialEq, Debug, Clone, Copy, Default)]
pub struct ZoneMetrics {
    pub invalid_pct: f64,
    pub turnout_pct: f64,
    /// Set when `invalid_pct` is above the configured threshold.
    pub invalid_flagged: bool,
}

/// A zone group annotated with its metrics and joined rows.
#[derive(PartialEq, Debug, Clone)]
pub struct ZoneComparison {
    pub group: ZoneGroup,
    pub rows: Vec<JoinedRow>,
    pub metrics_a: ZoneMetrics,
    pub metrics_b: ZoneMetrics,
    pub total_vote_delta: i64,
}

impl ZoneComparison {
    pub fn metrics(&self, side: Side) -> &ZoneMetrics {
        match side {
            Side::A => &self.metrics_a,
            Side::B => &self.metrics_b,
        }
    }
}

/// A contender of a close race.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RaceCandidate {
    pub party: String,
    pub name: String,
    pub votes: u64,
}

/// A zone where the invalid votes alone could overturn the leader.
#[derive(PartialEq, Debug, Clone)]
pub struct CloseRaceRow {
    pub province: String,
    pub zone: String,
    pub zone_id: String,
    pub rank1: RaceCandidate,
    pub rank2: RaceCandidate,
    /// `rank1.votes - rank2.votes`, always positive.
    pub margin: u64,
    /// `margin / total_vote * 100`, 0 when there are no votes.
    pub margin_pct: f64,
    pub invalid_vote: u64,
    pub total_vote: u64,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
pub struct ComparisonSummary {
    pub total_votes_a: u64,
    pub total_votes_b: u64,
    pub total_votes_diff: i64,
}

/// Total votes of the constituency snapshot against those of the party-list
/// snapshot of the same version.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
pub struct VoteCrossCheck {
    pub party_list_total_votes: u64,
    pub zone_total_votes: u64,
    /// `zone_total_votes - party_list_total_votes`
    pub diff: i64,
}

/// A party that can be used as a filter.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct PartyOption {
    pub party_id: String,
    pub party: String,
}

/// Everything a renderer needs to display the comparison of two snapshots.
#[derive(PartialEq, Debug, Clone)]
pub struct Comparison {
    pub version_a: String,
    pub version_b: String,
    pub summary: ComparisonSummary,
    /// Filtered and sorted as requested.
    pub zones: Vec<ZoneComparison>,
    /// Computed on version B.
    pub close_races: Vec<CloseRaceRow>,
    pub parties: Vec<PartyOption>,
}
