use clap::{Parser, Subcommand};

/// Compares published snapshots of constituency election results.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) A JSON configuration file. For more information about the
    /// keys, read the documentation of the zone_compare::manual module.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (URL) The root of the published data. Overrides the configuration file.
    #[clap(long, value_parser)]
    pub base_url: Option<String>,

    /// (directory) If specified, the snapshots are read from <data-dir>/<version>/zone_control.json
    /// instead of the network. Overrides the configuration file.
    #[clap(long, value_parser)]
    pub data_dir: Option<String>,

    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Compares two versions candidate by candidate.
    Compare(CompareArgs),
    /// Reports the counters and the consistency of the zones of one version.
    Zones(ZonesArgs),
    /// Finds the published versions by probing every minute of a time range.
    Discover(DiscoverArgs),
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct CompareArgs {
    /// (version tag or 'latest') The older version. Defaults to the baseline version.
    #[clap(short = 'a', long, value_parser)]
    pub version_a: Option<String>,

    /// (version tag or 'latest') The newer version. Defaults to the baseline version.
    #[clap(short = 'b', long, value_parser)]
    pub version_b: Option<String>,

    /// (party id) Only keeps the zones where this party is rank 1 in version A.
    #[clap(long, value_parser)]
    pub party: Option<String>,

    /// (invalid_asc, invalid_desc, turnout_asc or turnout_desc) Orders the zones by a metric.
    #[clap(long, value_parser)]
    pub sort: Option<String>,

    /// (a or b, default a) The version whose metric is used by --sort.
    #[clap(long, value_parser)]
    pub sort_ver: Option<String>,

    /// If passed as an argument, orders the zones by the change of total votes. Overrides --sort.
    #[clap(long, takes_value = false)]
    pub sort_total: bool,

    /// (asc or desc) Orders the close races by invalid votes.
    #[clap(long, value_parser)]
    pub sort_invalid: Option<String>,

    /// (query string) All the options above at once, with the names of the dashboard
    /// parameters: a, b, party, sort, sortVer, sortTotal, sortInvalid. Explicit flags win.
    #[clap(short, long, value_parser)]
    pub query: Option<String>,

    /// (file path, 'stdout' or empty) Where the comparison is written in JSON format.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path) A reference file in JSON format. If provided, zonecmp will
    /// check that the output matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct ZonesArgs {
    /// (version tag or 'latest', default latest) The version to report on.
    #[clap(value_parser, value_name = "VERSION")]
    pub tag: Option<String>,

    /// (file path, 'stdout' or empty) Where the report is written in JSON format.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path) A reference file in JSON format to check the report against.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct DiscoverArgs {
    /// (UTC timestamp, default 2026-02-08T12:00:00) The first minute to probe.
    #[clap(long, value_parser)]
    pub start: Option<String>,

    /// (UTC timestamp, default 2026-02-08T16:59:59) The last minute to probe.
    #[clap(long, value_parser)]
    pub end: Option<String>,

    /// (minutes, default 1) The interval between two probes.
    #[clap(long, value_parser)]
    pub step: Option<u32>,

    /// (milliseconds, default 200) The pause after each network probe.
    #[clap(long, value_parser)]
    pub delay: Option<u64>,

    /// (file path) The file recording the probed versions, so that a run can be resumed.
    #[clap(long, value_parser)]
    pub state: Option<String>,

    /// (file path) If specified, the found versions are written to this file, one per line.
    #[clap(short, long, value_parser)]
    pub output: Option<String>,
}
