//! Abstraction over the remote document store.
//!
//! The store is eventually consistent, evaluates equality and range
//! predicates only, and accepts writes solely for records the acting
//! principal owns. Deployed schemas differ: a write may be rejected per field
//! with [`SyncError::SchemaUnsupported`], which callers record in the
//! [`CapabilityCache`] and omit from subsequent writes.

pub mod capabilities;

pub use capabilities::CapabilityCache;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use crate::domain::models::{ContentId, ContentItem, FollowRecord, LikeRecord, UserProfile};
use crate::error::{SyncError, SyncResult};
use crate::identity::PrincipalId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    Content,
    Like,
    Follow,
    Profile,
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordType::Content => "content",
            RecordType::Like => "like",
            RecordType::Follow => "follow",
            RecordType::Profile => "profile",
        };
        f.write_str(name)
    }
}

/// Predicates the remote store can evaluate.
///
/// Absent-field semantics ("display name is unset") are deliberately not
/// expressible: queries that need them fetch a superset and filter locally.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    All,
    Eq { field: String, value: JsonValue },
    Range { field: String, min: JsonValue, max: JsonValue },
}

impl Predicate {
    pub fn eq(field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Predicate::Eq {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// Ownership scoping applied to content queries: records owned by the
/// principal, plus public ones when requested.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryScope {
    pub owner: PrincipalId,
    pub include_public: bool,
}

/// Fields to omit from a write because the deployed schema rejected them.
pub type FieldSet = HashSet<String>;

#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn create_item(&self, item: &ContentItem, omit: &FieldSet) -> SyncResult<()>;
    async fn update_item(&self, item: &ContentItem, omit: &FieldSet) -> SyncResult<()>;
    async fn fetch_item(&self, id: ContentId) -> SyncResult<Option<ContentItem>>;
    async fn fetch_items(&self, scope: &QueryScope) -> SyncResult<Vec<ContentItem>>;

    async fn create_like(&self, like: &LikeRecord) -> SyncResult<()>;
    async fn delete_like(&self, like: &LikeRecord) -> SyncResult<()>;
    /// The full like set of one user. This is the startup hydration query;
    /// it never scans content records.
    async fn likes_for_user(&self, user: &PrincipalId) -> SyncResult<Vec<LikeRecord>>;

    /// Create-if-absent; returns true when a new record was written.
    async fn create_follow(&self, follow: &FollowRecord) -> SyncResult<bool>;
    /// Delete-if-present; returns true when a record was removed.
    async fn delete_follow(&self, follow: &FollowRecord) -> SyncResult<bool>;
    async fn fetch_follows(&self, predicate: &Predicate) -> SyncResult<Vec<FollowRecord>>;
    /// Rewrite an existing relationship record's identifier fields in place.
    async fn rewrite_follow(&self, from: &FollowRecord, to: &FollowRecord) -> SyncResult<()>;

    async fn fetch_profiles(&self, predicate: &Predicate) -> SyncResult<Vec<UserProfile>>;
    async fn save_profile(&self, profile: &UserProfile, omit: &FieldSet) -> SyncResult<()>;
}

/// Run a remote call with the configured time limit; an elapsed timeout
/// classifies as a transient failure.
pub(crate) async fn timed<T>(
    limit: Duration,
    fut: impl Future<Output = SyncResult<T>>,
) -> SyncResult<T> {
    match resilience::with_timeout(limit, fut).await {
        Ok(result) => result,
        Err(elapsed) => Err(SyncError::Transient(elapsed.to_string())),
    }
}
