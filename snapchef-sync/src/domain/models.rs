use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::identity::PrincipalId;

pub type ContentId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

/// A shared recipe as the engine sees it.
///
/// The payload (title, structured text blocks, numeric fields) passes through
/// the engine untouched. `like_count` is remote-authoritative; the local copy
/// may be stale between reconciliations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: ContentId,
    pub owner_id: PrincipalId,
    pub visibility: Visibility,
    pub payload: JsonValue,
    pub like_count: i64,
    pub created_at: DateTime<Utc>,
}

impl ContentItem {
    /// A freshly created, not-yet-owned item. The owner is stamped exactly
    /// once before the item is stored (see `services::ownership`).
    pub fn draft(payload: JsonValue, visibility: Visibility) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id: PrincipalId::new(""),
            visibility,
            payload,
            like_count: 0,
            created_at: Utc::now(),
        }
    }
}

/// Lazily fetched before/after photo pair for a content item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssetPair {
    pub before: Option<Vec<u8>>,
    pub after: Option<Vec<u8>>,
}

/// Existence of this record is the definitional truth for "user likes item".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LikeRecord {
    pub user_id: PrincipalId,
    pub content_id: ContentId,
}

/// Follow relationship. At most one record per ordered pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FollowRecord {
    pub follower_id: PrincipalId,
    pub following_id: PrincipalId,
}

impl FollowRecord {
    /// True when either identifier still carries the deprecated prefix.
    pub fn is_legacy(&self) -> bool {
        self.follower_id.is_legacy() || self.following_id.is_legacy()
    }

    pub fn canonical(&self) -> FollowRecord {
        FollowRecord {
            follower_id: self.follower_id.canonical(),
            following_id: self.following_id.canonical(),
        }
    }
}

/// User profile with locally cached approximate aggregate counts. The counts
/// are advisory and not guaranteed remotely durable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: PrincipalId,
    pub display_name: Option<String>,
    pub follower_count: Option<i64>,
    pub following_count: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Like,
    Unlike,
}

/// In-flight marker for per-item operation deduplication. Lives only for the
/// duration of the operation, never persisted.
#[derive(Debug, Clone)]
pub struct PendingOperation {
    pub content_id: ContentId,
    pub kind: OperationKind,
    pub started_at: DateTime<Utc>,
}

/// Push status of a locally resident item.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncStatus {
    /// Created or changed locally; not yet confirmed remote.
    PendingPush,
    Synced,
    /// Push gave up after bounded retries; kept locally and surfaced.
    Failed(String),
}
