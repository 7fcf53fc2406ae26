use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use std::time::Duration;

use crate::zc::config_reader::{parse_latest_version, parse_party_list_snapshot, parse_snapshot};
use crate::zc::repository::SnapshotRepository;
use crate::zc::*;

/// The snapshots published on the election web server.
#[derive(Debug, Clone)]
pub struct HttpRepository {
    client: Client,
    base_url: String,
    latest_url: String,
}

impl HttpRepository {
    /// `latest_url` defaults to `<base_url>/version.json`.
    pub fn new(base_url: &str, latest_url: Option<&str>, timeout: Duration) -> ZcResult<HttpRepository> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .whatever_context("Cannot build the HTTP client")?;
        let base_url = base_url.trim_end_matches('/').to_string();
        let latest_url = match latest_url {
            Some(u) => u.to_string(),
            None => format!("{}/version.json", base_url),
        };
        Ok(HttpRepository {
            client,
            base_url,
            latest_url,
        })
    }

    pub fn snapshot_url(&self, version: &str) -> String {
        format!("{}/versions/{}/zone_control.json", self.base_url, version)
    }

    pub fn party_list_url(&self, version: &str) -> String {
        format!(
            "{}/versions/{}/zone_partylist_control.json",
            self.base_url, version
        )
    }

    /// Like `get_text`, with a 404 reported as a missing version.
    async fn get_version_text(&self, url: &str, version: &str) -> ZcResult<String> {
        match self.get_text(url).await {
            Err(ZcError::HttpStatus { status: 404, .. }) => MissingVersionSnafu { version }.fail(),
            x => x,
        }
    }

    async fn get_text(&self, url: &str) -> ZcResult<String> {
        debug!("get_text: GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context(FetchingUrlSnafu { url })?;
        let status = response.status();
        if !status.is_success() {
            return HttpStatusSnafu {
                url,
                status: status.as_u16(),
            }
            .fail();
        }
        response.text().await.context(FetchingUrlSnafu { url })
    }
}

#[async_trait]
impl SnapshotRepository for HttpRepository {
    async fn fetch_snapshot(&self, version: &str) -> ZcResult<Snapshot> {
        let url = self.snapshot_url(version);
        let body = self.get_version_text(&url, version).await?;
        info!("fetch_snapshot: {}: {} bytes", url, body.len());
        parse_snapshot(version, &body, &url)
    }

    async fn fetch_party_list_snapshot(&self, version: &str) -> ZcResult<PartyListSnapshot> {
        let url = self.party_list_url(version);
        let body = self.get_version_text(&url, version).await?;
        info!("fetch_party_list_snapshot: {}: {} bytes", url, body.len());
        parse_party_list_snapshot(version, &body, &url)
    }

    async fn fetch_latest_version(&self) -> ZcResult<String> {
        let body = self.get_text(&self.latest_url).await?;
        parse_latest_version(&body, &self.latest_url)
    }

    /// Asks for the headers only. Servers that refuse `HEAD` are asked again with `GET`.
    async fn has_version(&self, version: &str) -> ZcResult<bool> {
        let url = self.snapshot_url(version);
        let mut response = self
            .client
            .head(&url)
            .send()
            .await
            .context(FetchingUrlSnafu { url: &url })?;
        if response.status() == StatusCode::METHOD_NOT_ALLOWED {
            debug!("has_version: HEAD refused for {}, retrying with GET", url);
            response = self
                .client
                .get(&url)
                .send()
                .await
                .context(FetchingUrlSnafu { url: &url })?;
        }
        Ok(response.status().is_success())
    }
}
