//! Content creation, local edits, and read-through fetch.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::warn;

use resilience::with_retry;

use crate::collaborators::{AssetStore, AuthProvider};
use crate::config::SyncConfig;
use crate::domain::models::{AssetPair, ContentId, ContentItem, Visibility};
use crate::error::{SyncError, SyncResult};
use crate::executor::StateHandle;
use crate::identity::PrincipalId;
use crate::remote::timed;
use crate::services::ownership;
use crate::services::sync::SyncService;

pub struct ContentService {
    state: StateHandle,
    sync: Arc<SyncService>,
    assets: Arc<dyn AssetStore>,
    auth: Arc<dyn AuthProvider>,
    config: SyncConfig,
}

impl ContentService {
    pub fn new(
        state: StateHandle,
        sync: Arc<SyncService>,
        assets: Arc<dyn AssetStore>,
        auth: Arc<dyn AuthProvider>,
        config: SyncConfig,
    ) -> Self {
        Self {
            state,
            sync,
            assets,
            auth,
            config,
        }
    }

    fn principal(&self) -> SyncResult<PrincipalId> {
        self.auth
            .current_principal()
            .map(|p| p.canonical())
            .ok_or_else(|| {
                SyncError::PermissionDenied("content operations require a signed-in user".into())
            })
    }

    /// Create content: stamped with the acting principal, stored locally at
    /// once, pushed to the remote store in the background.
    pub async fn create(
        &self,
        payload: JsonValue,
        visibility: Visibility,
    ) -> SyncResult<ContentItem> {
        let principal = self.principal()?;
        let mut item = ContentItem::draft(payload, visibility);
        ownership::stamp_owner(&mut item, &principal)?;

        let stored = item.clone();
        self.state
            .with(move |s| {
                s.interest.insert(stored.id);
                s.cache.insert_local(stored);
            })
            .await?;
        self.nudge_push();
        Ok(item)
    }

    /// Apply a local edit. Ownership is validated here, before any dispatch:
    /// a foreign item never reaches the remote store and the cache is left
    /// unchanged.
    pub async fn update(&self, updated: ContentItem) -> SyncResult<ContentItem> {
        let principal = self.principal()?;
        let applied = self
            .state
            .with(move |s| {
                let Some(existing) = s.cache.get(updated.id) else {
                    return Err(SyncError::Validation(format!(
                        "unknown item {}",
                        updated.id
                    )));
                };
                ownership::ensure_owned(existing, &principal)?;
                if updated.owner_id != existing.owner_id {
                    return Err(SyncError::Validation(format!(
                        "owner of item {} is immutable",
                        updated.id
                    )));
                }
                let mut next = updated;
                next.created_at = existing.created_at;
                s.cache.apply_local_edit(next.clone());
                Ok(next)
            })
            .await??;
        self.nudge_push();
        Ok(applied)
    }

    /// Cache-first read; on a miss the item is pulled from the remote store.
    pub async fn get(&self, id: ContentId) -> SyncResult<Option<ContentItem>> {
        let cached = self
            .state
            .with(move |s| {
                s.interest.insert(id);
                s.cache.get(id).cloned()
            })
            .await?;
        if cached.is_some() {
            return Ok(cached);
        }

        let report = self.sync.pull(vec![id]).await?;
        if let Some((_, err)) = report.failed.into_iter().find(|(fid, _)| *fid == id) {
            return Err(err);
        }
        self.state.with(move |s| s.cache.get(id).cloned()).await
    }

    /// Asset pair for a resident item, fetched lazily on first access and
    /// cached afterwards.
    pub async fn assets(&self, id: ContentId) -> SyncResult<Option<AssetPair>> {
        if let Some(pair) = self.state.with(move |s| s.cache.assets(id)).await? {
            return Ok(Some(pair));
        }
        let known = self.state.with(move |s| s.cache.has(id)).await?;
        if !known {
            return Ok(None);
        }

        let pair = with_retry(self.config.retry.clone(), SyncError::is_transient, || {
            timed(self.config.remote_timeout, self.assets.fetch_assets(id))
        })
        .await
        .map_err(SyncError::from)?;

        let stored = pair.clone();
        self.state
            .with(move |s| s.cache.put_assets(id, stored))
            .await?;
        Ok(Some(pair))
    }

    /// Attach before/after photos to an owned item: cached immediately, then
    /// stored durably.
    pub async fn attach_assets(&self, id: ContentId, pair: AssetPair) -> SyncResult<()> {
        let principal = self.principal()?;
        self.state
            .with(move |s| match s.cache.get(id) {
                Some(item) => ownership::ensure_owned(item, &principal),
                None => Err(SyncError::Validation(format!("unknown item {id}"))),
            })
            .await??;

        let cached = pair.clone();
        self.state
            .with(move |s| s.cache.put_assets(id, cached))
            .await?;

        with_retry(self.config.retry.clone(), SyncError::is_transient, || {
            timed(self.config.remote_timeout, self.assets.store_assets(id, &pair))
        })
        .await
        .map_err(SyncError::from)
    }

    fn nudge_push(&self) {
        let sync = Arc::clone(&self.sync);
        tokio::spawn(async move {
            if let Err(err) = sync.push().await {
                warn!(%err, "background push failed");
            }
        });
    }
}
