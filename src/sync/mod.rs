// Record synchronizer.
//
// Local storage is always written and always trusted; the remote service is
// an opportunistic mirror. Failed remote writes land in a pending queue that
// is replayed after the next successful write (or an explicit flush), so the
// client keeps working offline and converges when the network returns.

use anyhow::{Context, Result};
use reqwest::header::AUTHORIZATION;
use reqwest::Client;

use crate::models::{now_ms, RecordResponse, RecordsResponse, SeriesRecord, SyncAck, SyncRequest};
use crate::scanner::SeriesInfo;
use crate::store::LocalStore;

/// Local key holding the API token (set via `watchlog token`).
pub const AUTH_KEY: &str = "api_auth";

/// Local key holding the queue of records awaiting remote sync.
pub const PENDING_KEY: &str = "pending::queue";

/// Local key for one series' record.
pub fn series_key(series_url: &str) -> String {
    format!("anime::{series_url}")
}

/// Thin client for the sync server. The token is sent as the raw
/// Authorization header value; the server treats it as an opaque key.
pub struct RemoteClient {
    client: Client,
    base_url: String,
    token: String,
}

impl RemoteClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    pub async fn fetch_record(&self, series_url: &str) -> Result<Option<SeriesRecord>> {
        let response: RecordResponse = self
            .client
            .get(format!("{}/state", self.base_url))
            .query(&[("seriesUrl", series_url)])
            .header(AUTHORIZATION, &self.token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("decoding record response")?;
        Ok(response.record)
    }

    pub async fn fetch_all(&self) -> Result<Vec<SeriesRecord>> {
        let response: RecordsResponse = self
            .client
            .get(format!("{}/state", self.base_url))
            .header(AUTHORIZATION, &self.token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("decoding records response")?;
        Ok(response.records)
    }

    pub async fn put_record(&self, record: &SeriesRecord) -> Result<()> {
        self.client
            .put(format!("{}/state", self.base_url))
            .header(AUTHORIZATION, &self.token)
            .json(record)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    pub async fn push_batch(&self, records: &[SeriesRecord]) -> Result<usize> {
        let ack: SyncAck = self
            .client
            .post(format!("{}/sync", self.base_url))
            .header(AUTHORIZATION, &self.token)
            .json(&SyncRequest {
                series: records.to_vec(),
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("decoding sync ack")?;
        Ok(ack.count)
    }
}

/// Result of a pending-queue flush attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// No remote configured, nothing to do.
    NoRemote,
    /// Queue was already empty.
    Empty,
    /// Whole queue accepted; it has been cleared.
    Flushed(usize),
    /// Request failed; the queue is untouched and will be retried later.
    Failed,
}

pub struct Synchronizer {
    store: LocalStore,
    remote: Option<RemoteClient>,
}

impl Synchronizer {
    /// Configuration is explicit: callers decide where the token comes from.
    pub fn new(store: LocalStore, remote: Option<RemoteClient>) -> Self {
        Self { store, remote }
    }

    /// Build from local state: reads the `api_auth` key and pairs it with
    /// the configured base URL. Either one missing means local-only mode.
    pub async fn from_store(store: LocalStore, api_base: Option<&str>) -> Self {
        let token: Option<String> = store.get_as(AUTH_KEY).await;
        let remote = match (api_base, token) {
            (Some(base), Some(token)) if !token.is_empty() => {
                Some(RemoteClient::new(base, token))
            }
            _ => None,
        };
        Self::new(store, remote)
    }

    /// Re-read the token and rebuild the remote client. Replaces the
    /// original's implicit global token reassignment.
    pub async fn refresh_auth(&mut self, api_base: Option<&str>) {
        let refreshed = Self::from_store(self.store.clone(), api_base).await;
        self.remote = refreshed.remote;
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Load the record for a scanned series: remote first when configured,
    /// then local, then a fresh default. The scanned title and episode total
    /// overlay whatever was loaded; the stored record wins everything else.
    pub async fn load(&self, info: &SeriesInfo) -> Option<SeriesRecord> {
        let series_url = info.series_url.as_deref()?;

        if let Some(ref remote) = self.remote {
            match remote.fetch_record(series_url).await {
                Ok(Some(mut record)) => {
                    overlay_scan(&mut record, info);
                    return Some(record);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!("remote load failed for {}: {}", series_url, e);
                }
            }
        }

        let mut record = match self.store.get_as(&series_key(series_url)).await {
            Some(record) => record,
            None => SeriesRecord::new(series_url, info.title.clone().unwrap_or_default()),
        };
        overlay_scan(&mut record, info);
        Some(record)
    }

    /// Persist a record: stamp it, write it locally, then try the remote.
    /// A failed remote write is queued instead of surfaced; a successful one
    /// opportunistically flushes the queue.
    pub async fn save(&self, record: &mut SeriesRecord) {
        if record.series_url.is_empty() {
            return;
        }

        let now = now_ms();
        record.last_updated = if now > record.last_updated {
            now
        } else {
            record.last_updated + 1
        };

        self.store.set(&series_key(&record.series_url), record).await;

        let Some(ref remote) = self.remote else {
            return;
        };

        match remote.put_record(record).await {
            Ok(()) => {
                self.flush_pending().await;
            }
            Err(e) => {
                tracing::debug!("remote save failed for {}: {}", record.series_url, e);
                self.enqueue_pending(record).await;
            }
        }
    }

    /// Push the whole pending queue in one bulk request. The queue is only
    /// cleared when the server accepts the entire batch; any failure leaves
    /// it intact for the next attempt.
    pub async fn flush_pending(&self) -> FlushOutcome {
        let Some(ref remote) = self.remote else {
            return FlushOutcome::NoRemote;
        };

        let queue: Vec<SeriesRecord> = self
            .store
            .get_as(PENDING_KEY)
            .await
            .unwrap_or_default();
        if queue.is_empty() {
            return FlushOutcome::Empty;
        }

        match remote.push_batch(&queue).await {
            Ok(count) => {
                self.store.remove(PENDING_KEY).await;
                tracing::debug!("flushed {} pending record(s)", count);
                FlushOutcome::Flushed(queue.len())
            }
            Err(e) => {
                tracing::debug!("pending flush failed: {}", e);
                FlushOutcome::Failed
            }
        }
    }

    /// The locally stored record for one series, if any.
    pub async fn local_record(&self, series_url: &str) -> Option<SeriesRecord> {
        self.store.get_as(&series_key(series_url)).await
    }

    async fn enqueue_pending(&self, record: &SeriesRecord) {
        let mut queue: Vec<SeriesRecord> = self
            .store
            .get_as(PENDING_KEY)
            .await
            .unwrap_or_default();
        // Map semantics keyed by series URL: requeueing replaces the older
        // entry and moves the series to the back.
        queue.retain(|queued| queued.series_url != record.series_url);
        queue.push(record.clone());
        self.store.set(PENDING_KEY, &queue).await;
    }
}

/// Overlay freshly scanned page facts onto a loaded record. A non-empty
/// scanned title and a positive episode total are newer than anything
/// stored; everything else on the record is authoritative.
fn overlay_scan(record: &mut SeriesRecord, info: &SeriesInfo) {
    if let Some(ref title) = info.title {
        if !title.is_empty() && *title != record.title {
            record.title = title.clone();
        }
    }
    if let Some(total) = info.total_episodes {
        if total > 0 {
            record.total_episodes = Some(total);
        }
    }
}
