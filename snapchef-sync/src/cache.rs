//! Device-authoritative cache of content items and their binary assets.
//!
//! Item metadata is never evicted; the working set is bounded by the signed-in
//! user's content. Binary asset pairs are capped and evicted
//! least-recently-used. All mutation goes through the single-writer executor
//! (`executor::StateHandle`), so no interior locking is needed here.

use std::collections::{HashMap, HashSet};

use crate::domain::models::{AssetPair, ContentId, ContentItem, SyncStatus};

struct CachedItem {
    item: ContentItem,
    status: SyncStatus,
    /// Whether a remote record is known to exist for this id (pushed at
    /// least once, or the item arrived via pull).
    remote_known: bool,
}

struct CachedAssets {
    pair: AssetPair,
    last_used: u64,
}

pub struct ContentCache {
    items: HashMap<ContentId, CachedItem>,
    assets: HashMap<ContentId, CachedAssets>,
    max_asset_pairs: usize,
    // Monotonic use counter backing the LRU order.
    clock: u64,
}

impl ContentCache {
    pub fn new(max_asset_pairs: usize) -> Self {
        Self {
            items: HashMap::new(),
            assets: HashMap::new(),
            max_asset_pairs,
            clock: 0,
        }
    }

    pub fn get(&self, id: ContentId) -> Option<&ContentItem> {
        self.items.get(&id).map(|cached| &cached.item)
    }

    pub fn has(&self, id: ContentId) -> bool {
        self.items.contains_key(&id)
    }

    pub fn all_ids(&self) -> HashSet<ContentId> {
        self.items.keys().copied().collect()
    }

    pub fn status(&self, id: ContentId) -> Option<&SyncStatus> {
        self.items.get(&id).map(|cached| &cached.status)
    }

    /// Store an item created on this device; it awaits push.
    pub fn insert_local(&mut self, item: ContentItem) {
        self.items.insert(
            item.id,
            CachedItem {
                item,
                status: SyncStatus::PendingPush,
                remote_known: false,
            },
        );
    }

    /// Store an item fetched from the remote store.
    pub fn insert_synced(&mut self, item: ContentItem) {
        self.items.insert(
            item.id,
            CachedItem {
                item,
                status: SyncStatus::Synced,
                remote_known: true,
            },
        );
    }

    /// Replace an item's content after a local edit; it awaits push again.
    pub fn apply_local_edit(&mut self, item: ContentItem) {
        if let Some(cached) = self.items.get_mut(&item.id) {
            cached.item = item;
            cached.status = SyncStatus::PendingPush;
        }
    }

    pub fn mark_pushed(&mut self, id: ContentId) {
        if let Some(cached) = self.items.get_mut(&id) {
            cached.status = SyncStatus::Synced;
            cached.remote_known = true;
        }
    }

    pub fn mark_push_failed(&mut self, id: ContentId, reason: String) {
        if let Some(cached) = self.items.get_mut(&id) {
            cached.status = SyncStatus::Failed(reason);
        }
    }

    /// Items awaiting push, with whether the remote record already exists
    /// (update) or not (create). Items marked failed are excluded; they are
    /// surfaced to the caller instead of retried forever.
    pub fn pending_push(&self) -> Vec<(ContentItem, bool)> {
        self.items
            .values()
            .filter(|cached| cached.status == SyncStatus::PendingPush)
            .map(|cached| (cached.item.clone(), cached.remote_known))
            .collect()
    }

    pub fn set_like_count(&mut self, id: ContentId, count: i64) {
        if let Some(cached) = self.items.get_mut(&id) {
            cached.item.like_count = count.max(0);
        }
    }

    pub fn put_assets(&mut self, id: ContentId, pair: AssetPair) {
        self.clock += 1;
        self.assets.insert(
            id,
            CachedAssets {
                pair,
                last_used: self.clock,
            },
        );
        while self.assets.len() > self.max_asset_pairs {
            let oldest = self
                .assets
                .iter()
                .min_by_key(|(_, cached)| cached.last_used)
                .map(|(id, _)| *id);
            match oldest {
                Some(id) => {
                    self.assets.remove(&id);
                }
                None => break,
            }
        }
    }

    pub fn assets(&mut self, id: ContentId) -> Option<AssetPair> {
        self.clock += 1;
        let clock = self.clock;
        self.assets.get_mut(&id).map(|cached| {
            cached.last_used = clock;
            cached.pair.clone()
        })
    }

    pub fn has_assets(&self, id: ContentId) -> bool {
        self.assets.contains_key(&id)
    }
}
