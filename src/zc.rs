use log::{debug, info, warn};

use snafu::{prelude::*, Snafu};
use zone_compare::*;

use std::fs;

use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::{Args, Command, CompareArgs, ZonesArgs};
use crate::zc::config_reader::*;
use crate::zc::discover::*;
use crate::zc::io_files::FileRepository;
use crate::zc::io_http::HttpRepository;
use crate::zc::repository::SnapshotRepository;

pub mod config_reader;
pub mod discover;
pub mod io_files;
pub mod io_http;
pub mod repository;

/// The keyword that selects the most recent published version.
pub const LATEST: &str = "latest";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ZcError {
    #[snafu(display("Error fetching {url}"))]
    FetchingUrl { url: String, source: reqwest::Error },
    #[snafu(display("Unexpected HTTP status {status} for {url}"))]
    HttpStatus { url: String, status: u16 },
    #[snafu(display("Malformed JSON in {origin}"))]
    DecodingJson {
        origin: String,
        source: serde_json::Error,
    },
    #[snafu(display("Error opening file {path}"))]
    OpeningFile {
        path: String,
        source: std::io::Error,
    },
    #[snafu(display("Error writing file {path}"))]
    WritingFile {
        path: String,
        source: std::io::Error,
    },
    #[snafu(display("Version {version} is not available"))]
    MissingVersion { version: String },
    #[snafu(display("No version is available"))]
    NoVersions {},
    #[snafu(display("Data unavailable for version {version}"))]
    DataUnavailable {
        version: String,
        #[snafu(source(from(ZcError, Box::new)))]
        source: Box<ZcError>,
    },
    #[snafu(display("Difference detected between the output and the reference"))]
    ReferenceMismatch {},

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error + Send + Sync>, Some)))]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

pub type ZcResult<T> = Result<T, ZcError>;

/// The repository described by the settings: the local directory when one is
/// configured, the network otherwise.
pub fn open_repository(settings: &Settings) -> ZcResult<Box<dyn SnapshotRepository>> {
    match &settings.data_dir {
        Some(dir) => {
            info!("open_repository: reading snapshots from directory {}", dir);
            Ok(Box::new(FileRepository::new(dir)))
        }
        None => {
            info!("open_repository: reading snapshots from {}", settings.base_url);
            let repo = HttpRepository::new(
                &settings.base_url,
                settings.latest_url.as_deref(),
                settings.request_timeout,
            )?;
            Ok(Box::new(repo))
        }
    }
}

/// Reads the view options of a comparison from the command line.
///
/// The raw query string is applied first, then every explicit flag on top of it.
pub fn view_options(args: &CompareArgs) -> ZcResult<ViewOptions> {
    let mut options = match &args.query {
        Some(q) => {
            let mut url = reqwest::Url::parse("http://localhost/")
                .whatever_context("Cannot build the query parser")?;
            url.set_query(Some(q.trim_start_matches('?')));
            ViewOptions::from_params(url.query_pairs())
        }
        None => ViewOptions::default(),
    };
    let flags = [
        ("a", &args.version_a),
        ("b", &args.version_b),
        ("party", &args.party),
        ("sort", &args.sort),
        ("sortVer", &args.sort_ver),
        ("sortInvalid", &args.sort_invalid),
    ];
    for (key, value) in flags {
        if let Some(v) = value {
            options.apply_param(key, v);
        }
    }
    if args.sort_total {
        options.apply_param("sortTotal", "1");
    }
    debug!("view_options: {:?}", options);
    Ok(options)
}

/// Turns a requested version into a concrete tag.
///
/// No version means the `fallback` one. The keyword `latest` asks the repository.
pub async fn resolve_version(
    repo: &dyn SnapshotRepository,
    requested: Option<&str>,
    fallback: &str,
) -> ZcResult<String> {
    let version = requested.unwrap_or(fallback);
    if version != LATEST {
        return Ok(version.to_string());
    }
    let v = repo
        .fetch_latest_version()
        .await
        .context(DataUnavailableSnafu { version: LATEST })?;
    info!("resolve_version: latest version is {}", v);
    Ok(v)
}

async fn fetch_version(repo: &dyn SnapshotRepository, version: &str) -> ZcResult<Snapshot> {
    let snapshot = repo
        .fetch_snapshot(version)
        .await
        .context(DataUnavailableSnafu { version })?;
    info!(
        "fetch_version: version {}: {} zones",
        version,
        snapshot.zones.len()
    );
    Ok(snapshot)
}

/// Fetches both versions concurrently and compares them.
///
/// Any retrieval failure fails the whole comparison.
pub async fn run_compare(
    repo: &dyn SnapshotRepository,
    settings: &Settings,
    options: &ViewOptions,
) -> ZcResult<JSValue> {
    let version_a = resolve_version(
        repo,
        options.version_a.as_deref(),
        &settings.default_version,
    )
    .await?;
    let version_b = resolve_version(
        repo,
        options.version_b.as_deref(),
        &settings.default_version,
    )
    .await?;

    let (snapshot_a, snapshot_b) = tokio::try_join!(
        fetch_version(repo, &version_a),
        fetch_version(repo, &version_b)
    )?;

    let cmp = compare_snapshots(&snapshot_a, &snapshot_b, options, &settings.thresholds);
    let flagged_b = cmp
        .zones
        .iter()
        .filter(|z| z.metrics_b.invalid_flagged)
        .count();
    info!(
        "run_compare: {} -> {}: total votes {} -> {} ({:+}), {} zones, {} flagged in version B, {} close races",
        cmp.version_a,
        cmp.version_b,
        cmp.summary.total_votes_a,
        cmp.summary.total_votes_b,
        cmp.summary.total_votes_diff,
        cmp.zones.len(),
        flagged_b,
        cmp.close_races.len()
    );
    Ok(comparison_to_json(&cmp, options, &settings.thresholds))
}

/// The data-quality report of one version, the latest one by default.
pub async fn run_zones(
    repo: &dyn SnapshotRepository,
    settings: &Settings,
    version: Option<&str>,
) -> ZcResult<JSValue> {
    let version = resolve_version(repo, version, LATEST).await?;
    let (snapshot, party_list) = tokio::join!(
        fetch_version(repo, &version),
        repo.fetch_party_list_snapshot(&version)
    );
    let snapshot = snapshot?;
    // The cross-check is optional: the party-list results may be published later.
    let cross_check = match party_list {
        Ok(party_list) => Some(cross_check_totals(&snapshot, &party_list)),
        Err(e) => {
            warn!(
                "run_zones: version {}: no party-list cross-check: {}",
                version, e
            );
            None
        }
    };
    let rows = quality_report(&snapshot, &settings.thresholds);
    let close_races = close_race_rows(&snapshot, settings.thresholds.margin_significant_pct);
    info!(
        "run_zones: version {}: {} zones, {} total votes, {} close races",
        snapshot.version,
        rows.len(),
        snapshot.total_votes(),
        close_races.len()
    );
    let zones: Vec<JSValue> = rows.iter().map(quality_to_json).collect();
    let races: Vec<JSValue> = close_races.iter().map(close_race_to_json).collect();
    Ok(json!({
        "version": snapshot.version,
        "zoneCount": rows.len(),
        "totalVotes": snapshot.total_votes(),
        "partyListTotalVotes": cross_check.map(|c| c.party_list_total_votes),
        "zoneTotalVotes": cross_check.map(|c| c.zone_total_votes),
        "diff": cross_check.map(|c| c.diff),
        "thresholds": thresholds_to_json(&settings.thresholds),
        "zones": zones,
        "closeRaces": races,
    }))
}

// ******** JSON output *********

fn zone_info_to_json(info: &ZoneInfo) -> JSValue {
    json!({
        "zoneId": info.zone_id,
        "provinceId": info.province_id,
        "province": info.province,
        "zone": info.zone,
        "totalVote": info.total_vote,
        "goodVote": info.good_vote,
        "invalidVote": info.invalid_vote,
        "noVote": info.no_vote,
        "eligible": info.eligible,
    })
}

fn metrics_to_json(m: &ZoneMetrics) -> JSValue {
    json!({
        "invalidPct": m.invalid_pct,
        "turnoutPct": m.turnout_pct,
        "invalidFlagged": m.invalid_flagged,
    })
}

fn thresholds_to_json(t: &Thresholds) -> JSValue {
    json!({
        "invalidPct": t.invalid_pct,
        "marginSignificantPct": t.margin_significant_pct,
    })
}

fn row_to_json(row: &JoinedRow) -> JSValue {
    json!({
        "candidateNo": row.key.candidate_no,
        "rank": row.candidate.rank,
        "name": row.candidate.full_name(),
        "partyId": row.candidate.party_id,
        "party": row.candidate.party,
        "voteA": row.vote_a,
        "voteB": row.vote_b,
        "diff": row.diff,
    })
}

fn close_race_to_json(r: &CloseRaceRow) -> JSValue {
    let contender = |c: &RaceCandidate| json!({"party": c.party, "name": c.name, "votes": c.votes});
    json!({
        "province": r.province,
        "zone": r.zone,
        "zoneId": r.zone_id,
        "rank1": contender(&r.rank1),
        "rank2": contender(&r.rank2),
        "margin": r.margin,
        "marginPct": r.margin_pct,
        "invalidVote": r.invalid_vote,
        "totalVote": r.total_vote,
    })
}

fn quality_to_json(q: &ZoneQuality) -> JSValue {
    json!({
        "info": zone_info_to_json(&q.info),
        "ballotsSum": q.ballots_sum,
        "ballotsConsistent": q.ballots_consistent,
        "candidateVoteSum": q.candidate_vote_sum,
        "candidateVotesConsistent": q.candidate_votes_consistent,
        "metrics": metrics_to_json(&q.metrics),
    })
}

fn comparison_to_json(cmp: &Comparison, options: &ViewOptions, thresholds: &Thresholds) -> JSValue {
    let zones: Vec<JSValue> = cmp
        .zones
        .iter()
        .map(|z| {
            let rows: Vec<JSValue> = z.rows.iter().map(row_to_json).collect();
            json!({
                "provinceId": z.group.province_id,
                "province": z.group.province,
                "zone": z.group.zone,
                "zoneId": z.group.zone_id,
                "infoA": z.group.info_a.as_ref().map(zone_info_to_json),
                "infoB": z.group.info_b.as_ref().map(zone_info_to_json),
                "metricsA": metrics_to_json(&z.metrics_a),
                "metricsB": metrics_to_json(&z.metrics_b),
                "totalVoteDelta": z.total_vote_delta,
                "rows": rows,
            })
        })
        .collect();
    let close_races: Vec<JSValue> = cmp.close_races.iter().map(close_race_to_json).collect();
    let parties: Vec<JSValue> = cmp
        .parties
        .iter()
        .map(|p| json!({"partyId": p.party_id, "party": p.party}))
        .collect();
    let sort_ver = match options.sort_version {
        Side::A => "a",
        Side::B => "b",
    };
    json!({
        "versionA": cmp.version_a,
        "versionB": cmp.version_b,
        "options": {
            "party": options.party_filter,
            "sort": options.sort_mode.as_str(),
            "sortVer": sort_ver,
            "sortTotal": options.sort_by_total_delta,
            "sortInvalid": options.close_race_order.as_str(),
        },
        "thresholds": thresholds_to_json(thresholds),
        "summary": {
            "totalVotesA": cmp.summary.total_votes_a,
            "totalVotesB": cmp.summary.total_votes_b,
            "totalVotesDiff": cmp.summary.total_votes_diff,
        },
        "zones": zones,
        "closeRaces": close_races,
        "parties": parties,
    })
}

// ******** Output *********

/// Writes the document to `out`, or to the standard output when `out` is
/// absent or `stdout`. Returns the pretty-printed text.
pub fn write_output(js: &JSValue, out: Option<&str>) -> ZcResult<String> {
    let pretty = serde_json::to_string_pretty(js).context(DecodingJsonSnafu { origin: "output" })?;
    match out {
        None | Some("stdout") => println!("{}", pretty),
        Some(path) => {
            info!("write_output: writing {}", path);
            fs::write(path, format!("{}\n", pretty)).context(WritingFileSnafu { path })?;
        }
    }
    Ok(pretty)
}

/// Compares the produced document with a reference JSON file.
pub fn check_reference(pretty: &str, reference_path: &str) -> ZcResult<()> {
    let contents = fs::read_to_string(reference_path).context(OpeningFileSnafu {
        path: reference_path,
    })?;
    let reference: JSValue = serde_json::from_str(&contents).context(DecodingJsonSnafu {
        origin: reference_path,
    })?;
    let pretty_reference = serde_json::to_string_pretty(&reference).context(DecodingJsonSnafu {
        origin: reference_path,
    })?;
    if pretty_reference != pretty {
        warn!("Found differences with the reference {}", reference_path);
        print_diff(pretty_reference.as_str(), pretty, "\n");
        return ReferenceMismatchSnafu {}.fail();
    }
    info!("check_reference: output matches {}", reference_path);
    Ok(())
}

fn emit(js: &JSValue, out: Option<&str>, reference: Option<&str>) -> ZcResult<()> {
    let pretty = write_output(js, out)?;
    if let Some(r) = reference {
        check_reference(&pretty, r)?;
    }
    Ok(())
}

pub async fn run(args: &Args) -> ZcResult<()> {
    let config = match &args.config {
        Some(path) => read_config(path)?,
        None => ZcConfig::default(),
    };
    let settings = Settings::resolve(&config, args.base_url.as_deref(), args.data_dir.as_deref());
    debug!("run: settings: {:?}", settings);
    let repo = open_repository(&settings)?;

    match &args.command {
        Command::Compare(c) => {
            let options = view_options(c)?;
            let js = run_compare(repo.as_ref(), &settings, &options).await?;
            emit(&js, c.out.as_deref(), c.reference.as_deref())
        }
        Command::Zones(ZonesArgs {
            tag,
            out,
            reference,
        }) => {
            let js = run_zones(repo.as_ref(), &settings, tag.as_deref()).await?;
            emit(&js, out.as_deref(), reference.as_deref())
        }
        Command::Discover(d) => {
            let discovery = DiscoverySettings::from_args(d)?;
            let found = run_discovery(repo.as_ref(), &discovery).await?;
            for v in found.iter() {
                println!("{}", v);
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zc::repository::StaticRepository;

    fn snapshot(version: &str, extra: u64) -> Snapshot {
        SnapshotBuilder::new(version)
            .zone(
                ZoneInfo::new("1001", "10", "Bangkok", "1")
                    .with_ballots(900 + extra, 80, 20)
                    .with_eligible(2000),
                &[
                    CandidateResult::new(1, 1, 500 + extra, "10")
                        .with_party("Alpha")
                        .with_name("Ann", "A"),
                    CandidateResult::new(2, 2, 400, "11").with_party("Beta"),
                ],
            )
            .zone(
                ZoneInfo::new("2001", "2", "Chiang Mai", "1")
                    .with_ballots(1000, 60, 0)
                    .with_eligible(1500),
                &[
                    CandidateResult::new(1, 1, 530, "11").with_party("Beta"),
                    CandidateResult::new(2, 2, 470, "10").with_party("Alpha"),
                ],
            )
            .build()
    }

    fn repo() -> StaticRepository {
        StaticRepository::new()
            .with_snapshot(snapshot("20260208T120000", 0))
            .with_snapshot(snapshot("20260208T130000", 100))
    }

    fn settings() -> Settings {
        Settings::resolve(&ZcConfig::default(), None, None)
    }

    fn options(a: &str, b: &str) -> ViewOptions {
        ViewOptions::from_params([("a", a), ("b", b)])
    }

    #[tokio::test]
    async fn compare_two_versions() {
        let js = run_compare(&repo(), &settings(), &options("20260208T120000", "20260208T130000"))
            .await
            .unwrap();
        assert_eq!(js["versionA"], "20260208T120000");
        assert_eq!(js["summary"]["totalVotesDiff"], 100);
        assert_eq!(js["zones"][0]["zoneId"], "2001");
        assert_eq!(js["zones"][1]["rows"][0]["diff"], 100);
        assert_eq!(js["zones"][1]["rows"][0]["name"], "Ann A");
        // 60 invalid votes against a 60 votes margin in zone 2001.
        assert_eq!(js["closeRaces"].as_array().unwrap().len(), 1);
        assert_eq!(js["closeRaces"][0]["margin"], 60);
        assert_eq!(js["parties"][0]["partyId"], "10");
    }

    #[tokio::test]
    async fn latest_is_resolved_through_the_repository() {
        let js = run_compare(&repo(), &settings(), &options("20260208T120000", "latest"))
            .await
            .unwrap();
        assert_eq!(js["versionB"], "20260208T130000");
    }

    #[tokio::test]
    async fn missing_version_fails_the_comparison() {
        let res = run_compare(&repo(), &settings(), &options("20260208T120000", "20990101T000000")).await;
        match res {
            Err(ZcError::DataUnavailable { version, source }) => {
                assert_eq!(version, "20990101T000000");
                assert!(matches!(*source, ZcError::MissingVersion { .. }));
            }
            x => panic!("unexpected result {:?}", x),
        }
    }

    #[tokio::test]
    async fn versions_default_to_the_baseline() {
        let baseline = Settings::resolve(&ZcConfig::default(), None, None).default_version;
        let repo = StaticRepository::new().with_snapshot(snapshot(&baseline, 0));
        let js = run_compare(&repo, &settings(), &ViewOptions::default())
            .await
            .unwrap();
        assert_eq!(js["versionA"], baseline.as_str());
        assert_eq!(js["versionB"], baseline.as_str());
        assert_eq!(js["summary"]["totalVotesDiff"], 0);
    }

    #[tokio::test]
    async fn zones_report_uses_latest_version() {
        let js = run_zones(&repo(), &settings(), None).await.unwrap();
        assert_eq!(js["version"], "20260208T130000");
        assert_eq!(js["zoneCount"], 2);
        assert_eq!(js["zones"][0]["info"]["zoneId"], "2001");
        assert_eq!(js["zones"][0]["ballotsConsistent"], true);
        assert_eq!(js["zones"][0]["candidateVotesConsistent"], true);
    }

    #[tokio::test]
    async fn zones_report_cross_checks_party_list_totals() {
        let party_list = PartyListSnapshot {
            version: "20260208T130000".to_string(),
            zones: vec![
                ZoneInfo::new("1001", "10", "Bangkok", "1").with_total_vote(1100),
                ZoneInfo::new("2001", "2", "Chiang Mai", "1").with_total_vote(1000),
            ],
        };
        let repo = repo().with_party_list(party_list);
        let js = run_zones(&repo, &settings(), None).await.unwrap();
        assert_eq!(js["partyListTotalVotes"], 2100);
        assert_eq!(js["zoneTotalVotes"], 2160);
        assert_eq!(js["diff"], 60);

        // Without party-list results the report is still produced.
        let js = run_zones(&repo, &settings(), Some("20260208T120000"))
            .await
            .unwrap();
        assert_eq!(js["zoneCount"], 2);
        assert!(js["partyListTotalVotes"].is_null());
        assert!(js["zoneTotalVotes"].is_null());
        assert!(js["diff"].is_null());
    }

    #[tokio::test]
    async fn empty_repository_has_no_latest() {
        let res = run_zones(&StaticRepository::new(), &settings(), None).await;
        assert!(matches!(res, Err(ZcError::DataUnavailable { .. })));
    }

    #[test]
    fn explicit_flags_override_the_query() {
        let args = CompareArgs {
            query: Some("?a=x&b=y&sort=invalid_desc&sortVer=B&party=__all__".to_string()),
            version_b: Some("z".to_string()),
            sort_total: true,
            ..CompareArgs::default()
        };
        let options = view_options(&args).unwrap();
        assert_eq!(options.version_a.as_deref(), Some("x"));
        assert_eq!(options.version_b.as_deref(), Some("z"));
        assert_eq!(options.sort_mode, SortMode::InvalidDesc);
        assert_eq!(options.sort_version, Side::B);
        assert_eq!(options.party_filter, None);
        assert!(options.sort_by_total_delta);
    }

    #[test]
    fn reference_mismatch_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reference.json");
        fs::write(&path, "{\"a\": 1}").unwrap();
        let path = path.to_str().unwrap();

        let same = serde_json::to_string_pretty(&json!({"a": 1})).unwrap();
        assert!(check_reference(&same, path).is_ok());

        let other = serde_json::to_string_pretty(&json!({"a": 2})).unwrap();
        assert!(matches!(
            check_reference(&other, path),
            Err(ZcError::ReferenceMismatch {})
        ));
    }

    #[test]
    fn output_is_written_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let pretty = write_output(&json!({"k": [1, 2]}), path.to_str()).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(written.trim_end(), pretty);
    }
}
