//! Access to the published snapshots.
//!
//! The command runners only see the [`SnapshotRepository`] trait, so that the
//! network, a local directory or an in-memory map can be used interchangeably.

use async_trait::async_trait;

use std::collections::BTreeMap;

use crate::zc::*;

/// Retrieval of snapshots by version tag.
///
/// Implementations must be `Send + Sync`: both versions of a comparison are
/// fetched concurrently.
#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    /// The full snapshot of a version.
    ///
    /// Fails with `MissingVersion` when the version is unknown, or with the
    /// retrieval error when the data cannot be read.
    async fn fetch_snapshot(&self, version: &str) -> ZcResult<Snapshot>;

    /// The party-list results published under the same version tag.
    ///
    /// Fails with `MissingVersion` when they are not published.
    async fn fetch_party_list_snapshot(&self, version: &str) -> ZcResult<PartyListSnapshot>;

    /// The tag of the most recent version.
    async fn fetch_latest_version(&self) -> ZcResult<String>;

    /// Whether a version is published. Used when discovering versions.
    async fn has_version(&self, version: &str) -> ZcResult<bool>;
}

/// Snapshots held in memory, keyed by version.
///
/// Version tags sort chronologically, so the latest version is the greatest key.
#[derive(Debug, Clone, Default)]
pub struct StaticRepository {
    snapshots: BTreeMap<String, Snapshot>,
    party_lists: BTreeMap<String, PartyListSnapshot>,
}

impl StaticRepository {
    pub fn new() -> StaticRepository {
        StaticRepository::default()
    }

    /// Adds a snapshot under its own version tag.
    pub fn with_snapshot(mut self, snapshot: Snapshot) -> StaticRepository {
        self.snapshots.insert(snapshot.version.clone(), snapshot);
        self
    }

    /// Adds party-list results under their own version tag. They do not make
    /// a version available on their own.
    pub fn with_party_list(mut self, party_list: PartyListSnapshot) -> StaticRepository {
        self.party_lists.insert(party_list.version.clone(), party_list);
        self
    }
}

#[async_trait]
impl SnapshotRepository for StaticRepository {
    async fn fetch_snapshot(&self, version: &str) -> ZcResult<Snapshot> {
        match self.snapshots.get(version) {
            Some(s) => Ok(s.clone()),
            None => MissingVersionSnafu { version }.fail(),
        }
    }

    async fn fetch_party_list_snapshot(&self, version: &str) -> ZcResult<PartyListSnapshot> {
        match self.party_lists.get(version) {
            Some(s) => Ok(s.clone()),
            None => MissingVersionSnafu { version }.fail(),
        }
    }

    async fn fetch_latest_version(&self) -> ZcResult<String> {
        match self.snapshots.keys().next_back() {
            Some(v) => Ok(v.clone()),
            None => NoVersionsSnafu {}.fail(),
        }
    }

    async fn has_version(&self, version: &str) -> ZcResult<bool> {
        Ok(self.snapshots.contains_key(version))
    }
}
