use async_trait::async_trait;

use std::path::{Path, PathBuf};

use crate::zc::config_reader::{parse_party_list_snapshot, parse_snapshot};
use crate::zc::repository::SnapshotRepository;
use crate::zc::*;

pub const SNAPSHOT_FILE: &str = "zone_control.json";
pub const PARTY_LIST_FILE: &str = "zone_partylist_control.json";

/// Snapshots stored on disk, one directory per version:
/// `<root>/<version>/zone_control.json`, with the party-list results in
/// `<root>/<version>/zone_partylist_control.json`.
#[derive(Debug, Clone)]
pub struct FileRepository {
    root: PathBuf,
}

impl FileRepository {
    pub fn new(root: &str) -> FileRepository {
        FileRepository {
            root: PathBuf::from(root),
        }
    }

    /// `None` for versions that cannot be a directory name.
    fn version_file(&self, version: &str, file_name: &str) -> Option<PathBuf> {
        let valid = !version.is_empty()
            && version != "."
            && version != ".."
            && !version.contains(['/', '\\']);
        if valid {
            Some(self.root.join(version).join(file_name))
        } else {
            None
        }
    }

    fn snapshot_path(&self, version: &str) -> Option<PathBuf> {
        self.version_file(version, SNAPSHOT_FILE)
    }

    /// The existing file of a version, as a string for the error messages.
    fn existing_file(&self, version: &str, file_name: &str) -> ZcResult<String> {
        match self.version_file(version, file_name) {
            Some(p) if p.is_file() => Ok(display(&p)),
            _ => MissingVersionSnafu { version }.fail(),
        }
    }
}

fn display(p: &Path) -> String {
    p.display().to_string()
}

#[async_trait]
impl SnapshotRepository for FileRepository {
    async fn fetch_snapshot(&self, version: &str) -> ZcResult<Snapshot> {
        let path = self.existing_file(version, SNAPSHOT_FILE)?;
        info!("fetch_snapshot: reading {}", path);
        let contents = fs::read_to_string(&path).context(OpeningFileSnafu { path: &path })?;
        parse_snapshot(version, &contents, &path)
    }

    async fn fetch_party_list_snapshot(&self, version: &str) -> ZcResult<PartyListSnapshot> {
        let path = self.existing_file(version, PARTY_LIST_FILE)?;
        info!("fetch_party_list_snapshot: reading {}", path);
        let contents = fs::read_to_string(&path).context(OpeningFileSnafu { path: &path })?;
        parse_party_list_snapshot(version, &contents, &path)
    }

    async fn fetch_latest_version(&self) -> ZcResult<String> {
        let entries = fs::read_dir(&self.root).context(OpeningFileSnafu {
            path: display(&self.root),
        })?;
        let mut latest: Option<String> = None;
        for entry in entries {
            let entry = entry.context(OpeningFileSnafu {
                path: display(&self.root),
            })?;
            let name = match entry.file_name().into_string() {
                Ok(n) => n,
                Err(n) => {
                    warn!("fetch_latest_version: skipping entry {:?}", n);
                    continue;
                }
            };
            if !entry.path().join(SNAPSHOT_FILE).is_file() {
                continue;
            }
            if latest.as_ref().map(|l| name > *l).unwrap_or(true) {
                latest = Some(name);
            }
        }
        match latest {
            Some(v) => Ok(v),
            None => NoVersionsSnafu {}.fail(),
        }
    }

    async fn has_version(&self, version: &str) -> ZcResult<bool> {
        Ok(self
            .snapshot_path(version)
            .map(|p| p.is_file())
            .unwrap_or(false))
    }
}
