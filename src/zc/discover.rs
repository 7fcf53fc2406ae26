//! Discovery of the published versions.
//!
//! The server does not list its versions, but they are published at UTC
//! timestamps aligned on the minute. Every candidate tag of a time range is
//! probed in turn, and the outcome of each probe is saved in a state file so
//! that an interrupted run continues where it stopped.

use chrono::{Duration as ChronoDuration, NaiveDate, NaiveDateTime};

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::args::DiscoverArgs;
use crate::zc::repository::SnapshotRepository;
use crate::zc::*;

pub const TAG_FORMAT: &str = "%Y%m%dT%H%M%S";
pub const DEFAULT_STATE_PATH: &str = "zone-control-versions-state.json";
pub const DEFAULT_DELAY_MS: u64 = 200;

/// Probed versions: tag -> found.
pub type DiscoveryState = BTreeMap<String, bool>;

#[derive(PartialEq, Debug, Clone)]
pub struct DiscoverySettings {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub step_minutes: u32,
    pub delay: Duration,
    pub state_path: String,
    pub output: Option<String>,
}

/// The evening of the count, 19:00 to 23:59 in Bangkok.
fn default_range() -> ZcResult<(NaiveDateTime, NaiveDateTime)> {
    let day = NaiveDate::from_ymd_opt(2026, 2, 8).whatever_context("Invalid default date")?;
    let start = day.and_hms_opt(12, 0, 0).whatever_context("Invalid default start")?;
    let end = day.and_hms_opt(16, 59, 59).whatever_context("Invalid default end")?;
    Ok((start, end))
}

impl DiscoverySettings {
    pub fn from_args(args: &DiscoverArgs) -> ZcResult<DiscoverySettings> {
        let (default_start, default_end) = default_range()?;
        let start = match &args.start {
            Some(s) => parse_timestamp(s)?,
            None => default_start,
        };
        let end = match &args.end {
            Some(s) => parse_timestamp(s)?,
            None => default_end,
        };
        Ok(DiscoverySettings {
            start,
            end,
            step_minutes: args.step.unwrap_or(1).max(1),
            delay: Duration::from_millis(args.delay.unwrap_or(DEFAULT_DELAY_MS)),
            state_path: args
                .state
                .clone()
                .unwrap_or_else(|| DEFAULT_STATE_PATH.to_string()),
            output: args.output.clone(),
        })
    }
}

/// Reads a UTC timestamp written either as a version tag or in ISO 8601
/// (`T` or space separated, without time zone).
pub fn parse_timestamp(s: &str) -> ZcResult<NaiveDateTime> {
    let s = s.trim();
    for format in [TAG_FORMAT, "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(t) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(t);
        }
    }
    whatever!("Could not read the timestamp {:?}", s)
}

pub fn version_tag(t: &NaiveDateTime) -> String {
    t.format(TAG_FORMAT).to_string()
}

/// All the tags from `start` to `end` included, `step_minutes` apart. A step of 0 counts as 1.
pub fn version_tags(start: &NaiveDateTime, end: &NaiveDateTime, step_minutes: u32) -> Vec<String> {
    let step = ChronoDuration::minutes(step_minutes.max(1) as i64);
    let mut res: Vec<String> = Vec::new();
    let mut t = *start;
    while t <= *end {
        res.push(version_tag(&t));
        t += step;
    }
    res
}

/// A missing or unreadable state file is an empty state.
pub fn load_state(path: &str) -> DiscoveryState {
    if !Path::new(path).exists() {
        return DiscoveryState::new();
    }
    let parsed = fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|c| serde_json::from_str::<DiscoveryState>(&c).map_err(|e| e.to_string()));
    match parsed {
        Ok(state) => {
            info!("load_state: {} versions already probed in {}", state.len(), path);
            state
        }
        Err(e) => {
            warn!("load_state: ignoring the state file {}: {}", path, e);
            DiscoveryState::new()
        }
    }
}

pub fn save_state(path: &str, state: &DiscoveryState) -> ZcResult<()> {
    let js = serde_json::to_string(state).context(DecodingJsonSnafu { origin: path })?;
    fs::write(path, js).context(WritingFileSnafu { path })
}

/// Probes every tag of the range that the state file does not know yet.
///
/// Returns the found versions, sorted. A failing probe counts as not found.
pub async fn run_discovery(
    repo: &dyn SnapshotRepository,
    settings: &DiscoverySettings,
) -> ZcResult<Vec<String>> {
    let tags = version_tags(&settings.start, &settings.end, settings.step_minutes);
    let mut state = load_state(&settings.state_path);
    let mut checked = 0;
    let mut cached = 0;
    for tag in tags.iter() {
        if let Some(found) = state.get(tag) {
            cached += 1;
            debug!("run_discovery: {} found: {} (cached)", tag, found);
            continue;
        }
        let found = match repo.has_version(tag).await {
            Ok(x) => x,
            Err(e) => {
                warn!("run_discovery: probing {} failed: {}", tag, e);
                false
            }
        };
        info!("run_discovery: {} found: {}", tag, found);
        state.insert(tag.clone(), found);
        save_state(&settings.state_path, &state)?;
        checked += 1;
        tokio::time::sleep(settings.delay).await;
    }

    let mut versions: Vec<String> = tags
        .into_iter()
        .filter(|t| state.get(t).copied().unwrap_or(false))
        .collect();
    versions.sort();
    info!(
        "run_discovery: found {} versions ({} probed, {} from cache, state in {})",
        versions.len(),
        checked,
        cached,
        settings.state_path
    );

    if let Some(out) = &settings.output {
        let mut contents = versions.join("\n");
        contents.push('\n');
        fs::write(out, contents).context(WritingFileSnafu { path: out })?;
        info!("run_discovery: wrote {} versions to {}", versions.len(), out);
    }
    Ok(versions)
}
