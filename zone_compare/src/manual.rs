/*!

This is the long-form manual for `zone_compare` and `zonecmp`.

## Data

The results are published as snapshots: every few minutes during the count,
the full list of constituencies ("zones") is exported under a version tag of
the form `YYYYMMDDTHHMMSS` (UTC). Each zone carries:
* its ballot counters: total, good, invalid and blank ballots, and the number
  of eligible voters,
* the tally of each candidate: ballot number, rank within the zone, votes and party.

The counters are displayed as published. `good + invalid + blank = total` and
`sum of candidate votes = good` are expected but not guaranteed; the `zones`
command reports the zones where they do not hold.

The party-list results of the same version (`zone_partylist_control.json`)
count the same ballots. When they are published, the `zones` command also
reports `partyListTotalVotes`, `zoneTotalVotes` and their `diff`; the three
are `null` otherwise. Sums of counters saturate and differences are clamped,
so corrupted counters never abort a run.

## Comparing two versions

```bash
zonecmp compare -a 20260208T140000 -b 20260208T160000
```

Candidates are matched across the two versions by zone id and ballot number.
A candidate missing from one version counts 0 votes there. The candidates are
ordered by province, zone and ballot number, and grouped by zone.

For each zone and each version:
* invalid % = invalid / total × 100 (0 when there are no votes). Zones above
  the invalid threshold (10% by default) are flagged.
* turnout % = total / eligible × 100 (0 when there are no eligible voters).

### Options

The view options use the same names as the query parameters of the dashboard,
and can be given all at once with `--query`:

```bash
zonecmp compare --query 'a=20260208T140000&b=20260208T160000&party=10&sort=invalid_desc&sortVer=b'
```

| parameter     | values                                                      | effect |
|---------------|-------------------------------------------------------------|--------|
| `a`, `b`      | version tag, or `latest`                                    | the versions to compare (default: the baseline version) |
| `party`       | party id                                                    | keep the zones where this party is rank 1 in version A |
| `sort`        | `invalid_asc`, `invalid_desc`, `turnout_asc`, `turnout_desc` | order the zones by a metric |
| `sortVer`     | `a`, `b`                                                    | the version whose metric is used by `sort` |
| `sortTotal`   | `1`                                                         | order by total votes B − A, largest first, unchanged zones last. Overrides `sort` |
| `sortInvalid` | `asc`, `desc`                                               | order the close races by invalid votes |

Unknown values are ignored.

## Close races

Margin = rank 1 votes − rank 2 votes. A zone is a close race when the margin
is below 10% of the total votes (configurable) and the invalid votes are at
least the margin: reassigning all the invalid ballots to rank 2 could then, in
theory, change the winner. Zones without a rank 2, or where rank 2 has at
least as many votes as rank 1, are not reported.

## Configuration file

```json
{
  "baseUrl": "https://election69.prd.go.th/data/live",
  "defaultVersion": "20260209T040828",
  "invalidThresholdPct": 10,
  "marginSignificantPct": 10,
  "requestTimeoutSecs": 30
}
```

`latestUrl` points to the document naming the latest version (by default
`<baseUrl>/version.json`, either a JSON string or `{"version": "..."}`).
`dataDir` reads the snapshots from a local directory
(`<dataDir>/<version>/zone_control.json`) instead of the network.

## Discovering versions

```bash
zonecmp discover --start 2026-02-08T12:00:00 --end 2026-02-08T16:59:59 --output versions.txt
```

Every minute between the bounds is probed. The progress is saved in a state
file, so an interrupted run continues where it stopped.

*/
