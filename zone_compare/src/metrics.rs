use crate::config::*;

// A missing zone reads as all zeros. A zero denominator yields 0%, never NaN or infinity.

/// Share of invalid ballots in the total votes, in percent.
pub fn invalid_pct(info: Option<&ZoneInfo>) -> f64 {
    match info {
        Some(i) if i.total_vote > 0 => i.invalid_vote as f64 / i.total_vote as f64 * 100.0,
        _ => 0.0,
    }
}

/// Share of the eligible voters who cast a ballot, in percent.
pub fn turnout_pct(info: Option<&ZoneInfo>) -> f64 {
    match info {
        Some(i) if i.eligible > 0 => i.total_vote as f64 / i.eligible as f64 * 100.0,
        _ => 0.0,
    }
}

pub fn zone_metrics(info: Option<&ZoneInfo>, thresholds: &Thresholds) -> ZoneMetrics {
    let invalid_pct = invalid_pct(info);
    ZoneMetrics {
        invalid_pct,
        turnout_pct: turnout_pct(info),
        invalid_flagged: invalid_pct > thresholds.invalid_pct,
    }
}
