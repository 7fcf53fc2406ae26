use crate::zc::*;

use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;

use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://election69.prd.go.th/data/live";
/// The baseline version compared when no version is requested.
pub const DEFAULT_VERSION: &str = "20260209T040828";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

// ********* Configuration file ***********

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZcConfig {
    #[serde(rename = "baseUrl")]
    pub base_url: Option<String>,
    #[serde(rename = "latestUrl")]
    pub latest_url: Option<String>,
    #[serde(rename = "dataDir")]
    pub data_dir: Option<String>,
    #[serde(rename = "defaultVersion")]
    pub default_version: Option<String>,
    #[serde(rename = "invalidThresholdPct")]
    pub invalid_threshold_pct: Option<f64>,
    #[serde(rename = "marginSignificantPct")]
    pub margin_significant_pct: Option<f64>,
    #[serde(rename = "requestTimeoutSecs")]
    pub request_timeout_secs: Option<u64>,
}

pub fn read_config(path: &str) -> ZcResult<ZcConfig> {
    let contents = fs::read_to_string(path).context(OpeningFileSnafu { path })?;
    let config: ZcConfig =
        serde_json::from_str(&contents).context(DecodingJsonSnafu { origin: path })?;
    info!("read_config: {:?}", config);
    Ok(config)
}

/// The configuration after applying the command line and the defaults.
#[derive(PartialEq, Debug, Clone)]
pub struct Settings {
    pub base_url: String,
    pub latest_url: Option<String>,
    pub data_dir: Option<String>,
    pub default_version: String,
    pub thresholds: Thresholds,
    pub request_timeout: Duration,
}

impl Settings {
    /// Command-line values win over the file, the file wins over the defaults.
    pub fn resolve(config: &ZcConfig, base_url: Option<&str>, data_dir: Option<&str>) -> Settings {
        let defaults = Thresholds::DEFAULT;
        Settings {
            base_url: base_url
                .map(|s| s.to_string())
                .or_else(|| config.base_url.clone())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            latest_url: config.latest_url.clone(),
            data_dir: data_dir
                .map(|s| s.to_string())
                .or_else(|| config.data_dir.clone()),
            default_version: config
                .default_version
                .clone()
                .unwrap_or_else(|| DEFAULT_VERSION.to_string()),
            thresholds: Thresholds {
                invalid_pct: config.invalid_threshold_pct.unwrap_or(defaults.invalid_pct),
                margin_significant_pct: config
                    .margin_significant_pct
                    .unwrap_or(defaults.margin_significant_pct),
            },
            request_timeout: Duration::from_secs(
                config.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
        }
    }
}

// ********* Published data ***********

// Ids are strings in the published files, but some exports write them as numbers.

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct InfoZone {
    #[serde(rename = "zone_id")]
    _zone_id: JSValue,
    #[serde(rename = "region_id", default)]
    pub region_id: Option<JSValue>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(rename = "province_id")]
    _province_id: JSValue,
    #[serde(default)]
    pub province: Option<String>,
    #[serde(rename = "zone")]
    _zone: JSValue,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub total_vote: Option<u64>,
    #[serde(default)]
    pub good_vote: Option<u64>,
    #[serde(default)]
    pub invalid_vote: Option<u64>,
    #[serde(default)]
    pub no_vote: Option<u64>,
    #[serde(default)]
    pub eligible: Option<u64>,
    #[serde(default)]
    pub percent_turnout: Option<f64>,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub is_winner: Option<bool>,
    #[serde(default)]
    pub is_outscored: Option<bool>,
    #[serde(default)]
    pub is_final: Option<bool>,
    #[serde(default)]
    pub total_seat: Option<u64>,
}

impl InfoZone {
    pub fn zone_id(&self) -> ZcResult<String> {
        read_js_id(&self._zone_id, "zone_id")
    }

    pub fn province_id(&self) -> ZcResult<String> {
        read_js_id(&self._province_id, "province_id")
    }

    pub fn zone(&self) -> ZcResult<String> {
        read_js_id(&self._zone, "zone")
    }
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ZoneControlDataItem {
    #[serde(rename = "rank")]
    _rank: JSValue,
    #[serde(default)]
    pub vote: Option<u64>,
    #[serde(rename = "%vote", default)]
    pub percent_vote: Option<f64>,
    #[serde(rename = "candidate_no")]
    _candidate_no: JSValue,
    #[serde(default)]
    pub people_id: Option<JSValue>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub people_image: Option<String>,
    #[serde(rename = "party_id", default)]
    _party_id: JSValue,
    #[serde(default)]
    pub party: Option<String>,
    #[serde(default)]
    pub party_color: Option<String>,
    #[serde(default)]
    pub party_short_name: Option<String>,
}

impl ZoneControlDataItem {
    pub fn rank(&self) -> ZcResult<u32> {
        read_js_u32(&self._rank, "rank")
    }

    pub fn candidate_no(&self) -> ZcResult<u32> {
        read_js_u32(&self._candidate_no, "candidate_no")
    }

    /// Empty when the candidate has no party.
    pub fn party_id(&self) -> String {
        read_js_id(&self._party_id, "party_id").unwrap_or_default()
    }
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ZoneControlItem {
    pub info_zone: InfoZone,
    #[serde(default)]
    pub data: Vec<ZoneControlDataItem>,
}

/// A party of the party-list results of a zone. There is no candidate number.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ZonePartyListDataItem {
    #[serde(default)]
    pub rank: Option<JSValue>,
    #[serde(default)]
    pub vote: Option<u64>,
    #[serde(rename = "%vote", default)]
    pub percent_vote: Option<f64>,
    #[serde(default)]
    pub party_id: Option<JSValue>,
    #[serde(default)]
    pub party: Option<String>,
    #[serde(default)]
    pub party_color: Option<String>,
    #[serde(default)]
    pub party_short_name: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub image_barchart: Option<String>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ZonePartyListControlItem {
    pub info_zone: InfoZone,
    #[serde(default)]
    pub data: Vec<ZonePartyListDataItem>,
}

fn read_js_id(x: &JSValue, field: &str) -> ZcResult<String> {
    match x {
        JSValue::String(s) => Ok(s.clone()),
        JSValue::Number(n) => Ok(n.to_string()),
        _ => whatever!("Field {} should be a string or a number, found {:?}", field, x),
    }
}

fn read_js_u32(x: &JSValue, field: &str) -> ZcResult<u32> {
    let res = match x {
        JSValue::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        JSValue::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    };
    match res {
        Some(v) => Ok(v),
        None => whatever!("Field {} should be a positive integer, found {:?}", field, x),
    }
}

fn to_zone_info(iz: &InfoZone) -> ZcResult<ZoneInfo> {
    Ok(ZoneInfo {
        zone_id: iz.zone_id()?,
        province_id: iz.province_id()?,
        province: iz.province.clone().unwrap_or_default(),
        zone: iz.zone()?,
        total_vote: iz.total_vote.unwrap_or(0),
        good_vote: iz.good_vote.unwrap_or(0),
        invalid_vote: iz.invalid_vote.unwrap_or(0),
        no_vote: iz.no_vote.unwrap_or(0),
        eligible: iz.eligible.unwrap_or(0),
    })
}

fn to_zone_record(item: &ZoneControlItem) -> ZcResult<ZoneRecord> {
    let info = to_zone_info(&item.info_zone)?;
    let mut candidates: Vec<CandidateResult> = Vec::with_capacity(item.data.len());
    for d in item.data.iter() {
        candidates.push(CandidateResult {
            candidate_no: d.candidate_no()?,
            rank: d.rank()?,
            vote: d.vote.unwrap_or(0),
            party_id: d.party_id(),
            party: d.party.clone().unwrap_or_default(),
            first_name: d.first_name.clone().unwrap_or_default(),
            last_name: d.last_name.clone().unwrap_or_default(),
        });
    }
    Ok(ZoneRecord { info, candidates })
}

/// Reads a published snapshot: a JSON array with one element per zone.
pub fn parse_snapshot(version: &str, contents: &str, origin: &str) -> ZcResult<Snapshot> {
    let items: Vec<ZoneControlItem> =
        serde_json::from_str(contents).context(DecodingJsonSnafu { origin })?;
    let mut zones: Vec<ZoneRecord> = Vec::with_capacity(items.len());
    for item in items.iter() {
        zones.push(to_zone_record(item)?);
    }
    debug!("parse_snapshot: {}: {} zones", origin, zones.len());
    Ok(Snapshot {
        version: version.to_string(),
        zones,
    })
}

/// Reads the party-list results of a version. Only the zone counters are kept.
pub fn parse_party_list_snapshot(
    version: &str,
    contents: &str,
    origin: &str,
) -> ZcResult<PartyListSnapshot> {
    let items: Vec<ZonePartyListControlItem> =
        serde_json::from_str(contents).context(DecodingJsonSnafu { origin })?;
    let mut zones: Vec<ZoneInfo> = Vec::with_capacity(items.len());
    for item in items.iter() {
        zones.push(to_zone_info(&item.info_zone)?);
    }
    let party_votes = vote_sum(items.iter().flat_map(|i| i.data.iter()).filter_map(|d| d.vote));
    debug!(
        "parse_party_list_snapshot: {}: {} zones, {} party votes",
        origin,
        zones.len(),
        party_votes
    );
    Ok(PartyListSnapshot {
        version: version.to_string(),
        zones,
    })
}

/// Reads the pointer to the latest version: either a JSON string or an
/// object with a `version` field.
pub fn parse_latest_version(contents: &str, origin: &str) -> ZcResult<String> {
    let js: JSValue = serde_json::from_str(contents).context(DecodingJsonSnafu { origin })?;
    let version = match &js {
        JSValue::String(s) => Some(s.clone()),
        JSValue::Object(m) => m.get("version").and_then(|v| v.as_str()).map(|s| s.to_string()),
        _ => None,
    };
    match version {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => whatever!("Could not find a version in {}: {}", origin, js),
    }
}
