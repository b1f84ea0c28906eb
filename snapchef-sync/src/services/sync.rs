//! Reconciliation between the device cache and the remote store.
//!
//! Pull fetches required-but-missing items with a bounded fan-out and only
//! commits an item once both the record and its assets have arrived. Push
//! drains locally created or edited items with bounded backoff retries,
//! skipping schema fields the deployment cannot take.

use std::collections::HashSet;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;
use tracing::{info, warn};

use resilience::with_retry;

use crate::collaborators::{AssetStore, AuthProvider};
use crate::config::SyncConfig;
use crate::domain::models::{AssetPair, ContentId, ContentItem, SyncStatus};
use crate::error::{SyncError, SyncResult};
use crate::executor::StateHandle;
use crate::identity::PrincipalId;
use crate::remote::{timed, CapabilityCache, RecordType, RemoteStore};
use crate::services::ownership;

pub struct SyncService {
    state: StateHandle,
    remote: Arc<dyn RemoteStore>,
    assets: Arc<dyn AssetStore>,
    auth: Arc<dyn AuthProvider>,
    capabilities: Arc<CapabilityCache>,
    config: SyncConfig,
    // Serializes push passes so an on-trigger push and the periodic worker
    // never double-create the same record.
    push_lock: Mutex<()>,
}

#[derive(Debug, Default)]
pub struct PullReport {
    pub fetched: Vec<ContentId>,
    pub already_present: usize,
    /// Required ids with no remote record; not failures.
    pub missing_remote: Vec<ContentId>,
    /// Results that arrived after interest in the id was released.
    pub discarded: Vec<ContentId>,
    pub failed: Vec<(ContentId, SyncError)>,
}

#[derive(Debug, Default)]
pub struct PushReport {
    pub pushed: Vec<ContentId>,
    /// Fields the deployed schema rejected, skipped permanently per item.
    pub skipped_fields: Vec<(ContentId, String)>,
    /// Items that exhausted their bounded retries or hit a terminal error.
    pub failed: Vec<(ContentId, SyncError)>,
}

enum Fetched {
    Ready(ContentItem, Option<AssetPair>),
    Absent,
}

async fn send_item(
    remote: &dyn RemoteStore,
    config: &SyncConfig,
    item: &ContentItem,
    omit: &crate::remote::FieldSet,
    remote_known: bool,
) -> SyncResult<()> {
    if remote_known {
        timed(config.remote_timeout, remote.update_item(item, omit)).await
    } else {
        timed(config.remote_timeout, remote.create_item(item, omit)).await
    }
}

impl SyncService {
    pub fn new(
        state: StateHandle,
        remote: Arc<dyn RemoteStore>,
        assets: Arc<dyn AssetStore>,
        auth: Arc<dyn AuthProvider>,
        capabilities: Arc<CapabilityCache>,
        config: SyncConfig,
    ) -> Self {
        Self {
            state,
            remote,
            assets,
            auth,
            capabilities,
            config,
            push_lock: Mutex::new(()),
        }
    }

    fn principal(&self) -> SyncResult<PrincipalId> {
        self.auth
            .current_principal()
            .map(|p| p.canonical())
            .ok_or_else(|| {
                SyncError::PermissionDenied("sync requires a signed-in user".into())
            })
    }

    /// Fetch the required ids that are not resident, a bounded number at a
    /// time. An item lands in the cache only once both the record and its
    /// assets have arrived; a partial fetch leaves the cache untouched.
    pub async fn pull(&self, required: Vec<ContentId>) -> SyncResult<PullReport> {
        let (missing, already_present, have_assets) = self
            .state
            .with(move |s| {
                let mut missing = Vec::new();
                let mut present = 0usize;
                let mut seen = HashSet::new();
                for id in required {
                    if !seen.insert(id) {
                        continue;
                    }
                    s.interest.insert(id);
                    if s.cache.has(id) {
                        present += 1;
                    } else {
                        missing.push(id);
                    }
                }
                let have_assets: HashSet<ContentId> = missing
                    .iter()
                    .copied()
                    .filter(|id| s.cache.has_assets(*id))
                    .collect();
                (missing, present, have_assets)
            })
            .await?;

        let this = self;
        let fetches: Vec<(ContentId, SyncResult<Fetched>)> = stream::iter(
            missing.into_iter().map(|id| {
                let skip_assets = have_assets.contains(&id);
                async move { (id, this.fetch_one(id, skip_assets).await) }
            }),
        )
        .buffer_unordered(self.config.max_parallel_fetches)
        .collect()
        .await;

        let report = self
            .state
            .with(move |s| {
                let mut report = PullReport {
                    already_present,
                    ..Default::default()
                };
                for (id, outcome) in fetches {
                    match outcome {
                        Ok(Fetched::Ready(item, assets)) => {
                            if !s.interest.contains(&id) {
                                report.discarded.push(id);
                                continue;
                            }
                            s.cache.insert_synced(item);
                            if let Some(pair) = assets {
                                s.cache.put_assets(id, pair);
                            }
                            report.fetched.push(id);
                        }
                        Ok(Fetched::Absent) => report.missing_remote.push(id),
                        Err(err) => report.failed.push((id, err)),
                    }
                }
                report
            })
            .await?;

        info!(
            fetched = report.fetched.len(),
            already_present = report.already_present,
            failed = report.failed.len(),
            "pull finished"
        );
        Ok(report)
    }

    async fn fetch_one(&self, id: ContentId, skip_assets: bool) -> SyncResult<Fetched> {
        let item = with_retry(self.config.retry.clone(), SyncError::is_transient, || {
            timed(self.config.remote_timeout, self.remote.fetch_item(id))
        })
        .await
        .map_err(SyncError::from)?;
        let Some(item) = item else {
            return Ok(Fetched::Absent);
        };

        let assets = if skip_assets {
            None
        } else {
            let pair = with_retry(self.config.retry.clone(), SyncError::is_transient, || {
                timed(self.config.remote_timeout, self.assets.fetch_assets(id))
            })
            .await
            .map_err(SyncError::from)?;
            Some(pair)
        };
        Ok(Fetched::Ready(item, assets))
    }

    /// Push locally created or edited items. Transient failures back off and
    /// retry; schema-rejected fields are skipped permanently for this
    /// deployment; items that exhaust their attempts are marked failed and
    /// surfaced instead of retried forever.
    pub async fn push(&self) -> SyncResult<PushReport> {
        let _guard = self.push_lock.lock().await;

        let pending = self.state.with(|s| s.cache.pending_push()).await?;
        let mut report = PushReport::default();
        for (item, remote_known) in pending {
            let id = item.id;
            match self.push_item(&item, remote_known, &mut report).await {
                Ok(()) => {
                    self.state.with(move |s| s.cache.mark_pushed(id)).await?;
                    report.pushed.push(id);
                }
                Err(err) => {
                    let reason = err.to_string();
                    self.state
                        .with(move |s| s.cache.mark_push_failed(id, reason))
                        .await?;
                    report.failed.push((id, err));
                }
            }
        }

        if !report.pushed.is_empty() || !report.failed.is_empty() {
            info!(
                pushed = report.pushed.len(),
                failed = report.failed.len(),
                "push finished"
            );
        }
        Ok(report)
    }

    async fn push_item(
        &self,
        item: &ContentItem,
        remote_known: bool,
        report: &mut PushReport,
    ) -> SyncResult<()> {
        loop {
            let omit = self.capabilities.omitted_fields(RecordType::Content);
            let result = with_retry(self.config.retry.clone(), SyncError::is_transient, || {
                send_item(self.remote.as_ref(), &self.config, item, &omit, remote_known)
            })
            .await
            .map_err(SyncError::from);

            match result {
                Ok(()) => return Ok(()),
                Err(SyncError::SchemaUnsupported { record_type, field }) => {
                    // Skip just this field; the rest of the record proceeds.
                    self.capabilities.mark_unsupported(record_type, &field);
                    report.skipped_fields.push((item.id, field));
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Background worker that drains pending pushes on a fixed cadence. Runs
    /// until aborted; errors are logged and the loop continues.
    pub fn spawn_periodic(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(service.config.push_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match service.push().await {
                    Ok(report) if !report.failed.is_empty() => {
                        warn!(
                            failed = report.failed.len(),
                            "periodic push completed with failures"
                        );
                    }
                    Ok(_) => {}
                    Err(err) => warn!(%err, "periodic push failed"),
                }
            }
        })
    }

    /// Seed the cache with the principal's own content, plus public items
    /// when requested. The scoped query yields the required id set; the pull
    /// path then applies its usual item-and-assets atomicity.
    pub async fn pull_owned(&self, include_public: bool) -> SyncResult<PullReport> {
        let principal = self.principal()?;
        let scope = ownership::scope_query(&principal, include_public);
        let items = with_retry(self.config.retry.clone(), SyncError::is_transient, || {
            timed(self.config.remote_timeout, self.remote.fetch_items(&scope))
        })
        .await
        .map_err(SyncError::from)?;

        let ids: Vec<ContentId> = items.into_iter().map(|item| item.id).collect();
        self.pull(ids).await
    }

    /// Push status of a resident item.
    pub async fn status(&self, id: ContentId) -> SyncResult<Option<SyncStatus>> {
        self.state.with(move |s| s.cache.status(id).cloned()).await
    }

    /// Drop interest in an id: in-flight pull results for it are discarded
    /// when they arrive.
    pub async fn release_interest(&self, id: ContentId) -> SyncResult<()> {
        self.state
            .with(move |s| {
                s.interest.remove(&id);
            })
            .await
    }
}
