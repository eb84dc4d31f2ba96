//! HTTP client for the npm replication endpoints.

use crate::cancel::CancelToken;
use crate::config::DEFAULT_DOCS_PER_KILOBYTE;
use crate::registry::{DownloadProgress, FullListing, ProgressFn, Registry};
use crate::types::{ChangeRecord, NameCheckError, RemoteInfo, Result};
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::{Client, Response};
use serde::Deserialize;
use std::error::Error as StdError;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;
use tracing::{debug, info, trace};
use url::Url;

pub const DEFAULT_INFO_URL: &str = "https://replicate.npmjs.com/";
pub const DEFAULT_ALL_DOCS_URL: &str = "https://replicate.npmjs.com/_all_docs";

/// Minimum time between two progress callbacks.
const PROGRESS_THROTTLE: Duration = Duration::from_millis(100);

/// Registry summary document.
#[derive(Debug, Deserialize)]
struct InfoResponse {
    update_seq: WireSequence,
    doc_count: u64,
}

/// `_all_docs` listing. Only the ids are used.
#[derive(Debug, Deserialize)]
struct AllDocsResponse {
    rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
struct AllDocsRow {
    id: String,
}

/// One page of the `_changes` feed.
#[derive(Debug, Deserialize)]
struct ChangesResponse {
    results: Vec<ChangeRow>,
}

#[derive(Debug, Deserialize)]
struct ChangeRow {
    id: String,
    seq: Option<WireSequence>,
}

/// CouchDB sequences are plain integers, or `"<n>-<opaque>"` strings on 2.x.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireSequence {
    Number(u64),
    Text(String),
}

impl WireSequence {
    fn value(&self) -> Option<u64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(text) => text.split('-').next()?.parse().ok(),
        }
    }
}

/// URLs of the registry endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEndpoints {
    /// Summary document with `update_seq` and `doc_count`.
    pub info: Url,
    /// Full listing of document ids.
    pub all_docs: Url,
    /// Change feed.
    pub changes: Url,
}

impl RegistryEndpoints {
    /// Build endpoints from the summary and listing URLs. The change feed
    /// defaults to `<info>/_changes`.
    pub fn new(info: &str, all_docs: &str, changes: Option<&str>) -> Result<Self> {
        let info = Url::parse(info)?;
        let all_docs = Url::parse(all_docs)?;
        let changes = match changes {
            Some(url) => Url::parse(url)?,
            None => with_trailing_slash(&info).join("_changes")?,
        };
        Ok(Self {
            info,
            all_docs,
            changes,
        })
    }
}

fn with_trailing_slash(url: &Url) -> Url {
    let mut url = url.clone();
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// HTTP settings for [`RegistryClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub timeout_secs: u64,
    /// Change feed requests per second.
    pub rate_limit: u32,
    /// Documents per kilobyte of listing, used to estimate download size.
    pub docs_per_kilobyte: f64,
    pub user_agent: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_secs: 600,
            rate_limit: 10,
            docs_per_kilobyte: DEFAULT_DOCS_PER_KILOBYTE,
            user_agent: format!("npm-name-check/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Client for the npm replication API.
pub struct RegistryClient {
    client: Client,
    endpoints: RegistryEndpoints,
    docs_per_kilobyte: f64,
    rate_limiter: Arc<
        RateLimiter<
            governor::state::NotKeyed,
            governor::state::InMemoryState,
            governor::clock::DefaultClock,
        >,
    >,
    summary: OnceCell<RemoteInfo>,
}

impl RegistryClient {
    /// Create a new registry client.
    pub fn new(endpoints: RegistryEndpoints, options: &ClientOptions) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_secs))
            .user_agent(&options.user_agent)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        let quota =
            Quota::per_second(NonZeroU32::new(options.rate_limit).unwrap_or(NonZeroU32::MIN));
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        Ok(Self {
            client,
            endpoints,
            docs_per_kilobyte: options.docs_per_kilobyte,
            rate_limiter,
            summary: OnceCell::new(),
        })
    }

    /// Fetch the registry summary, bypassing the cached copy.
    pub async fn fetch_summary(&self) -> Result<RemoteInfo> {
        info!("Updating info from remote npm registry server");
        let response = self.get(self.endpoints.info.clone()).await?;
        let body: InfoResponse = response.json().await.map_err(transport_error)?;

        let update_seq = body.update_seq.value().ok_or_else(|| {
            NameCheckError::Config(format!(
                "registry summary at {} has a non-numeric update_seq",
                self.endpoints.info
            ))
        })?;
        let remote = RemoteInfo::new(update_seq, body.doc_count, self.docs_per_kilobyte);
        debug!("Remote registry: {:?}", remote);
        Ok(remote)
    }

    async fn get(&self, url: Url) -> Result<Response> {
        trace!("GET {}", url);
        let response = self.client.get(url.clone()).send().await.map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(NameCheckError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl Registry for RegistryClient {
    async fn remote_info(&self) -> Result<RemoteInfo> {
        self.summary
            .get_or_try_init(|| self.fetch_summary())
            .await
            .copied()
    }

    async fn fetch_all_names(
        &self,
        cancel: &CancelToken,
        on_progress: ProgressFn<'_>,
    ) -> Result<FullListing> {
        let (remote, mut response) = tokio::try_join!(
            self.remote_info(),
            self.get(self.endpoints.all_docs.clone())
        )?;

        let estimated = response.content_length().unwrap_or(remote.approx_size_bytes);
        info!(
            "Downloading all names (approx. {} MB)",
            estimated / (1024 * 1024)
        );

        let started = Instant::now();
        let mut last_report = started;
        let mut body = Vec::new();
        let mut received = 0u64;

        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(NameCheckError::Cancelled),
                chunk = response.chunk() => chunk.map_err(transport_error)?,
            };
            let Some(chunk) = chunk else {
                break;
            };

            received += chunk.len() as u64;
            body.extend_from_slice(&chunk);

            if last_report.elapsed() >= PROGRESS_THROTTLE {
                last_report = Instant::now();
                on_progress(DownloadProgress::new(received, estimated, started.elapsed()));
            }
        }
        on_progress(DownloadProgress::new(received, received, started.elapsed()));

        let listing: AllDocsResponse = serde_json::from_slice(&body)?;
        debug!("Listing holds {} rows", listing.rows.len());

        Ok(FullListing {
            sequence: remote.update_seq,
            names: listing.rows.into_iter().map(|row| row.id).collect(),
        })
    }

    async fn fetch_changes(&self, since: u64, limit: usize) -> Result<Vec<ChangeRecord>> {
        self.rate_limiter.until_ready().await;

        let mut url = self.endpoints.changes.clone();
        url.query_pairs_mut()
            .append_pair("since", &since.to_string())
            .append_pair("limit", &limit.to_string());

        let response = self.get(url).await?;
        let page: ChangesResponse = response.json().await.map_err(transport_error)?;
        trace!("Change page after {}: {} rows", since, page.results.len());

        page.results
            .into_iter()
            .map(|row| match row.seq.as_ref().and_then(WireSequence::value) {
                Some(sequence_after) => Ok(ChangeRecord {
                    id: row.id,
                    sequence_after,
                }),
                None => Err(NameCheckError::MissingSequence { id: row.id }),
            })
            .collect()
    }
}

/// Map a transport error, recognising a connection closed before the
/// response formally ended.
pub(crate) fn transport_error(error: reqwest::Error) -> NameCheckError {
    if is_premature_close(&error) {
        NameCheckError::StreamClosedEarly(error.to_string())
    } else {
        NameCheckError::Http(error)
    }
}

/// Whether any error in the chain reports a premature connection close.
pub(crate) fn is_premature_close(error: &(dyn StdError + 'static)) -> bool {
    const MARKERS: &[&str] = &[
        "premature close",
        "connection closed before message completed",
        "incomplete message",
        "unexpected eof",
    ];

    let mut current = Some(error);
    while let Some(err) = current {
        let message = err.to_string().to_lowercase();
        if MARKERS.iter().any(|marker| message.contains(marker)) {
            return true;
        }
        current = err.source();
    }
    false
}
