//! In-memory remote document store for integration tests.
//!
//! Mirrors the production store's constraints: equality predicates only,
//! per-field schema capability, and writes permitted only for records the
//! acting principal owns. Supports per-operation fault injection, call
//! counting, an in-flight high-water mark for fan-out assertions, and
//! optional server-side maintenance of item like counts.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use snapchef_sync::domain::models::{
    ContentId, ContentItem, FollowRecord, LikeRecord, UserProfile, Visibility,
};
use snapchef_sync::error::{SyncError, SyncResult};
use snapchef_sync::identity::PrincipalId;
use snapchef_sync::remote::{FieldSet, Predicate, QueryScope, RecordType, RemoteStore};

const CONTENT_FIELDS: &[&str] = &["owner_id", "visibility", "payload", "like_count", "created_at"];
const PROFILE_FIELDS: &[&str] = &["display_name", "follower_count", "following_count"];

#[derive(Default)]
struct Inner {
    items: HashMap<ContentId, ContentItem>,
    likes: HashSet<LikeRecord>,
    follows: Vec<FollowRecord>,
    profiles: HashMap<PrincipalId, UserProfile>,
    acting: Option<PrincipalId>,
    unsupported: HashSet<(RecordType, String)>,
    fail_next: HashMap<String, VecDeque<SyncError>>,
    fail_always: HashMap<String, SyncError>,
    calls: HashMap<String, usize>,
    maintains_counts: bool,
    in_flight: usize,
    max_in_flight: usize,
    op_delay: Option<Duration>,
    last_profile_predicate: Option<Predicate>,
}

#[derive(Clone, Default)]
pub struct MockRemote {
    inner: Arc<Mutex<Inner>>,
}

impl MockRemote {
    pub fn new() -> Self {
        Self::default()
    }

    // ----- test configuration -----

    /// The principal the store sees as the caller of every operation.
    pub fn set_acting(&self, principal: &str) {
        self.inner.lock().unwrap().acting = Some(PrincipalId::new(principal).canonical());
    }

    /// Maintain `like_count` on item records server-side as like records
    /// come and go.
    pub fn maintain_counts(&self, on: bool) {
        self.inner.lock().unwrap().maintains_counts = on;
    }

    pub fn set_unsupported(&self, record_type: RecordType, field: &str) {
        self.inner
            .lock()
            .unwrap()
            .unsupported
            .insert((record_type, field.to_string()));
    }

    pub fn set_op_delay(&self, delay: Duration) {
        self.inner.lock().unwrap().op_delay = Some(delay);
    }

    /// Queue a one-shot failure for the named operation.
    pub fn inject_failure(&self, op: &str, err: SyncError) {
        self.inner
            .lock()
            .unwrap()
            .fail_next
            .entry(op.to_string())
            .or_default()
            .push_back(err);
    }

    /// Fail every call of the named operation until cleared.
    pub fn fail_always(&self, op: &str, err: SyncError) {
        self.inner
            .lock()
            .unwrap()
            .fail_always
            .insert(op.to_string(), err);
    }

    pub fn clear_failures(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next.clear();
        inner.fail_always.clear();
    }

    // ----- seeding -----

    pub fn seed_item(&self, item: ContentItem) {
        self.inner.lock().unwrap().items.insert(item.id, item);
    }

    pub fn seed_like(&self, user: &str, content_id: ContentId) {
        let mut inner = self.inner.lock().unwrap();
        let newly = inner.likes.insert(LikeRecord {
            user_id: PrincipalId::new(user),
            content_id,
        });
        if newly && inner.maintains_counts {
            if let Some(item) = inner.items.get_mut(&content_id) {
                item.like_count += 1;
            }
        }
    }

    pub fn seed_follow(&self, follower: &str, following: &str) {
        self.inner.lock().unwrap().follows.push(FollowRecord {
            follower_id: PrincipalId::new(follower),
            following_id: PrincipalId::new(following),
        });
    }

    pub fn seed_profile(&self, profile: UserProfile) {
        self.inner
            .lock()
            .unwrap()
            .profiles
            .insert(profile.id.clone(), profile);
    }

    // ----- inspection -----

    pub fn calls(&self, op: &str) -> usize {
        self.inner.lock().unwrap().calls.get(op).copied().unwrap_or(0)
    }

    pub fn max_in_flight(&self) -> usize {
        self.inner.lock().unwrap().max_in_flight
    }

    pub fn item(&self, id: ContentId) -> Option<ContentItem> {
        self.inner.lock().unwrap().items.get(&id).cloned()
    }

    pub fn like_records(&self) -> Vec<LikeRecord> {
        self.inner.lock().unwrap().likes.iter().cloned().collect()
    }

    pub fn follow_records(&self) -> Vec<FollowRecord> {
        self.inner.lock().unwrap().follows.clone()
    }

    pub fn profile(&self, id: &str) -> Option<UserProfile> {
        self.inner
            .lock()
            .unwrap()
            .profiles
            .get(&PrincipalId::new(id))
            .cloned()
    }

    pub fn last_profile_predicate(&self) -> Option<Predicate> {
        self.inner.lock().unwrap().last_profile_predicate.clone()
    }

    // ----- shared op plumbing -----

    async fn enter(&self, op: &str) -> SyncResult<()> {
        let (delay, fail) = {
            let mut inner = self.inner.lock().unwrap();
            *inner.calls.entry(op.to_string()).or_insert(0) += 1;
            inner.in_flight += 1;
            if inner.in_flight > inner.max_in_flight {
                inner.max_in_flight = inner.in_flight;
            }
            let fail = inner
                .fail_next
                .get_mut(op)
                .and_then(|queue| queue.pop_front())
                .or_else(|| inner.fail_always.get(op).cloned());
            (inner.op_delay, fail)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = fail {
            self.leave();
            return Err(err);
        }
        Ok(())
    }

    fn leave(&self) {
        self.inner.lock().unwrap().in_flight -= 1;
    }

    fn acting_of(inner: &Inner) -> SyncResult<PrincipalId> {
        inner
            .acting
            .clone()
            .ok_or_else(|| SyncError::PermissionDenied("store has no acting principal".into()))
    }

    fn check_unsupported(
        inner: &Inner,
        record_type: RecordType,
        fields: &[&str],
        omit: &FieldSet,
    ) -> SyncResult<()> {
        for field in fields {
            if omit.contains(*field) {
                continue;
            }
            if inner.unsupported.contains(&(record_type, field.to_string())) {
                return Err(SyncError::SchemaUnsupported {
                    record_type,
                    field: field.to_string(),
                });
            }
        }
        Ok(())
    }

    fn follow_matches(record: &FollowRecord, predicate: &Predicate) -> SyncResult<bool> {
        match predicate {
            Predicate::All => Ok(true),
            Predicate::Eq { field, value } => {
                let wanted = match value {
                    JsonValue::String(s) => s.as_str(),
                    _ => return Err(SyncError::Validation("non-string id predicate".into())),
                };
                Ok(match field.as_str() {
                    "follower_id" => record.follower_id.as_str() == wanted,
                    "following_id" => record.following_id.as_str() == wanted,
                    _ => false,
                })
            }
            Predicate::Range { .. } => Err(SyncError::Validation(
                "range predicates are not defined for follow records".into(),
            )),
        }
    }
}

#[async_trait]
impl RemoteStore for MockRemote {
    async fn create_item(&self, item: &ContentItem, omit: &FieldSet) -> SyncResult<()> {
        self.enter("create_item").await?;
        let result = (|| {
            let mut inner = self.inner.lock().unwrap();
            let acting = Self::acting_of(&inner)?;
            if item.owner_id != acting {
                return Err(SyncError::PermissionDenied(format!(
                    "cannot create item owned by {}",
                    item.owner_id
                )));
            }
            Self::check_unsupported(&inner, RecordType::Content, CONTENT_FIELDS, omit)?;
            let mut stored = item.clone();
            if omit.contains("like_count") {
                stored.like_count = 0;
            }
            inner.items.insert(stored.id, stored);
            Ok(())
        })();
        self.leave();
        result
    }

    async fn update_item(&self, item: &ContentItem, omit: &FieldSet) -> SyncResult<()> {
        self.enter("update_item").await?;
        let result = (|| {
            let mut inner = self.inner.lock().unwrap();
            let acting = Self::acting_of(&inner)?;
            let Some(existing) = inner.items.get(&item.id).cloned() else {
                return Err(SyncError::Conflict(format!("item {} vanished", item.id)));
            };
            if existing.owner_id != acting {
                return Err(SyncError::PermissionDenied(format!(
                    "item {} belongs to {}",
                    item.id, existing.owner_id
                )));
            }
            Self::check_unsupported(&inner, RecordType::Content, CONTENT_FIELDS, omit)?;
            let mut stored = item.clone();
            stored.owner_id = existing.owner_id;
            if omit.contains("like_count") {
                stored.like_count = existing.like_count;
            }
            if omit.contains("payload") {
                stored.payload = existing.payload;
            }
            inner.items.insert(stored.id, stored);
            Ok(())
        })();
        self.leave();
        result
    }

    async fn fetch_item(&self, id: ContentId) -> SyncResult<Option<ContentItem>> {
        self.enter("fetch_item").await?;
        let result = Ok(self.inner.lock().unwrap().items.get(&id).cloned());
        self.leave();
        result
    }

    async fn fetch_items(&self, scope: &QueryScope) -> SyncResult<Vec<ContentItem>> {
        self.enter("fetch_items").await?;
        let result = {
            let inner = self.inner.lock().unwrap();
            Ok(inner
                .items
                .values()
                .filter(|item| {
                    item.owner_id == scope.owner
                        || (scope.include_public && item.visibility == Visibility::Public)
                })
                .cloned()
                .collect())
        };
        self.leave();
        result
    }

    async fn create_like(&self, like: &LikeRecord) -> SyncResult<()> {
        self.enter("create_like").await?;
        let result = (|| {
            let mut inner = self.inner.lock().unwrap();
            let acting = Self::acting_of(&inner)?;
            if like.user_id != acting {
                return Err(SyncError::PermissionDenied(
                    "like records are scoped to the acting principal".into(),
                ));
            }
            let newly = inner.likes.insert(like.clone());
            if newly && inner.maintains_counts {
                if let Some(item) = inner.items.get_mut(&like.content_id) {
                    item.like_count += 1;
                }
            }
            Ok(())
        })();
        self.leave();
        result
    }

    async fn delete_like(&self, like: &LikeRecord) -> SyncResult<()> {
        self.enter("delete_like").await?;
        let result = (|| {
            let mut inner = self.inner.lock().unwrap();
            let acting = Self::acting_of(&inner)?;
            if like.user_id != acting {
                return Err(SyncError::PermissionDenied(
                    "like records are scoped to the acting principal".into(),
                ));
            }
            let removed = inner.likes.remove(like);
            if removed && inner.maintains_counts {
                if let Some(item) = inner.items.get_mut(&like.content_id) {
                    item.like_count = (item.like_count - 1).max(0);
                }
            }
            Ok(())
        })();
        self.leave();
        result
    }

    async fn likes_for_user(&self, user: &PrincipalId) -> SyncResult<Vec<LikeRecord>> {
        self.enter("likes_for_user").await?;
        let result = {
            let inner = self.inner.lock().unwrap();
            Ok(inner
                .likes
                .iter()
                .filter(|like| like.user_id == *user)
                .cloned()
                .collect())
        };
        self.leave();
        result
    }

    async fn create_follow(&self, follow: &FollowRecord) -> SyncResult<bool> {
        self.enter("create_follow").await?;
        let result = (|| {
            let mut inner = self.inner.lock().unwrap();
            let acting = Self::acting_of(&inner)?;
            if follow.follower_id != acting {
                return Err(SyncError::PermissionDenied(
                    "follow records are scoped to the acting principal".into(),
                ));
            }
            if inner.follows.contains(follow) {
                return Ok(false);
            }
            inner.follows.push(follow.clone());
            Ok(true)
        })();
        self.leave();
        result
    }

    async fn delete_follow(&self, follow: &FollowRecord) -> SyncResult<bool> {
        self.enter("delete_follow").await?;
        let result = (|| {
            let mut inner = self.inner.lock().unwrap();
            let acting = Self::acting_of(&inner)?;
            if follow.follower_id != acting {
                return Err(SyncError::PermissionDenied(
                    "follow records are scoped to the acting principal".into(),
                ));
            }
            let before = inner.follows.len();
            inner.follows.retain(|record| record != follow);
            Ok(inner.follows.len() < before)
        })();
        self.leave();
        result
    }

    async fn fetch_follows(&self, predicate: &Predicate) -> SyncResult<Vec<FollowRecord>> {
        self.enter("fetch_follows").await?;
        let result = (|| {
            let inner = self.inner.lock().unwrap();
            let mut out = Vec::new();
            for record in &inner.follows {
                if Self::follow_matches(record, predicate)? {
                    out.push(record.clone());
                }
            }
            Ok(out)
        })();
        self.leave();
        result
    }

    async fn rewrite_follow(&self, from: &FollowRecord, to: &FollowRecord) -> SyncResult<()> {
        self.enter("rewrite_follow").await?;
        let result = (|| {
            let mut inner = self.inner.lock().unwrap();
            let acting = Self::acting_of(&inner)?;
            if from.follower_id.canonical() != acting {
                return Err(SyncError::PermissionDenied(format!(
                    "follow record of {} is not writable by {}",
                    from.follower_id, acting
                )));
            }
            let Some(slot) = inner.follows.iter_mut().find(|record| *record == from) else {
                return Err(SyncError::Conflict("follow record vanished".into()));
            };
            *slot = to.clone();
            Ok(())
        })();
        self.leave();
        result
    }

    async fn fetch_profiles(&self, predicate: &Predicate) -> SyncResult<Vec<UserProfile>> {
        self.enter("fetch_profiles").await?;
        let result = (|| {
            let mut inner = self.inner.lock().unwrap();
            inner.last_profile_predicate = Some(predicate.clone());
            match predicate {
                Predicate::All => Ok(inner.profiles.values().cloned().collect()),
                Predicate::Eq { field, value } if field == "id" => {
                    let wanted = match value {
                        JsonValue::String(s) => s.as_str(),
                        _ => return Err(SyncError::Validation("non-string id predicate".into())),
                    };
                    Ok(inner
                        .profiles
                        .values()
                        .filter(|profile| profile.id.as_str() == wanted)
                        .cloned()
                        .collect())
                }
                _ => Err(SyncError::Validation(
                    "unsupported profile predicate".into(),
                )),
            }
        })();
        self.leave();
        result
    }

    async fn save_profile(&self, profile: &UserProfile, omit: &FieldSet) -> SyncResult<()> {
        self.enter("save_profile").await?;
        let result = (|| {
            let mut inner = self.inner.lock().unwrap();
            let acting = Self::acting_of(&inner)?;
            if profile.id != acting {
                return Err(SyncError::PermissionDenied(
                    "profiles are scoped to the acting principal".into(),
                ));
            }
            Self::check_unsupported(&inner, RecordType::Profile, PROFILE_FIELDS, omit)?;
            let existing = inner.profiles.get(&profile.id).cloned();
            let mut stored = profile.clone();
            if omit.contains("display_name") {
                stored.display_name = existing.as_ref().and_then(|p| p.display_name.clone());
            }
            if omit.contains("follower_count") {
                stored.follower_count = existing.as_ref().and_then(|p| p.follower_count);
            }
            if omit.contains("following_count") {
                stored.following_count = existing.as_ref().and_then(|p| p.following_count);
            }
            inner.profiles.insert(stored.id.clone(), stored);
            Ok(())
        })();
        self.leave();
        result
    }
}
