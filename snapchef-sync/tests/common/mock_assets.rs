//! Mock asset storage collaborator.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use snapchef_sync::collaborators::AssetStore;
use snapchef_sync::domain::models::{AssetPair, ContentId};
use snapchef_sync::error::{SyncError, SyncResult};

#[derive(Default)]
struct Inner {
    pairs: HashMap<ContentId, AssetPair>,
    fail_always: Option<SyncError>,
    fetch_calls: usize,
    store_calls: usize,
}

#[derive(Clone, Default)]
pub struct MockAssets {
    inner: Arc<Mutex<Inner>>,
}

impl MockAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, id: ContentId, pair: AssetPair) {
        self.inner.lock().unwrap().pairs.insert(id, pair);
    }

    pub fn fail_always(&self, err: SyncError) {
        self.inner.lock().unwrap().fail_always = Some(err);
    }

    pub fn clear_failures(&self) {
        self.inner.lock().unwrap().fail_always = None;
    }

    pub fn fetch_calls(&self) -> usize {
        self.inner.lock().unwrap().fetch_calls
    }

    pub fn store_calls(&self) -> usize {
        self.inner.lock().unwrap().store_calls
    }

    pub fn stored(&self, id: ContentId) -> Option<AssetPair> {
        self.inner.lock().unwrap().pairs.get(&id).cloned()
    }
}

#[async_trait]
impl AssetStore for MockAssets {
    async fn fetch_assets(&self, id: ContentId) -> SyncResult<AssetPair> {
        let mut inner = self.inner.lock().unwrap();
        inner.fetch_calls += 1;
        if let Some(err) = inner.fail_always.clone() {
            return Err(err);
        }
        Ok(inner.pairs.get(&id).cloned().unwrap_or_default())
    }

    async fn store_assets(&self, id: ContentId, assets: &AssetPair) -> SyncResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.store_calls += 1;
        if let Some(err) = inner.fail_always.clone() {
            return Err(err);
        }
        inner.pairs.insert(id, assets.clone());
        Ok(())
    }
}
