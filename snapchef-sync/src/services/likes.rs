//! Liked-state bookkeeping: optimistic toggles behind a per-item pending
//! gate, with rollback when the remote commit fails.
//!
//! The lifecycle per item is Idle -> Pending -> Committed or RolledBack ->
//! Idle. While a toggle is pending, further toggles of the same item are
//! rejected; independent items toggle concurrently.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use resilience::with_retry;

use crate::collaborators::AuthProvider;
use crate::config::SyncConfig;
use crate::domain::models::{ContentId, LikeRecord, OperationKind, PendingOperation};
use crate::error::{SyncError, SyncResult};
use crate::executor::{EngineState, StateHandle};
use crate::identity::PrincipalId;
use crate::remote::{timed, RemoteStore};

/// Authoritative in-memory view of the current principal's likes. Owned by
/// the single-writer executor.
#[derive(Default)]
pub struct LikeState {
    pub(crate) liked: HashSet<ContentId>,
    pub(crate) counts: HashMap<ContentId, i64>,
    pub(crate) pending: HashMap<ContentId, PendingOperation>,
}

impl LikeState {
    pub fn hydrate(&mut self, likes: Vec<LikeRecord>) {
        for like in likes {
            self.liked.insert(like.content_id);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleOutcome {
    pub liked: bool,
    pub count: i64,
}

#[derive(Debug, Clone, Copy)]
struct ToggleIntent {
    kind: OperationKind,
    was_liked: bool,
    prior_count: i64,
}

fn current_count(state: &EngineState, id: ContentId) -> i64 {
    if let Some(count) = state.likes.counts.get(&id) {
        return *count;
    }
    state.cache.get(id).map(|item| item.like_count).unwrap_or(0)
}

pub(crate) fn is_liked(state: &EngineState, id: ContentId) -> bool {
    state.likes.liked.contains(&id)
}

pub(crate) fn like_count(state: &EngineState, id: ContentId) -> i64 {
    current_count(state, id)
}

/// Gate check plus optimistic flip. The count moves by one, clamped at zero.
fn begin_toggle(state: &mut EngineState, id: ContentId) -> SyncResult<ToggleIntent> {
    if state.likes.pending.contains_key(&id) {
        return Err(SyncError::Validation(format!(
            "a like toggle for {id} is already in flight"
        )));
    }
    let was_liked = state.likes.liked.contains(&id);
    let prior_count = current_count(state, id);
    let kind = if was_liked {
        OperationKind::Unlike
    } else {
        OperationKind::Like
    };

    if was_liked {
        state.likes.liked.remove(&id);
    } else {
        state.likes.liked.insert(id);
    }
    let next = if was_liked {
        (prior_count - 1).max(0)
    } else {
        prior_count + 1
    };
    state.likes.counts.insert(id, next);
    state.likes.pending.insert(
        id,
        PendingOperation {
            content_id: id,
            kind,
            started_at: Utc::now(),
        },
    );
    Ok(ToggleIntent {
        kind,
        was_liked,
        prior_count,
    })
}

fn commit_toggle(state: &mut EngineState, id: ContentId, refreshed: Option<i64>) -> ToggleOutcome {
    state.likes.pending.remove(&id);
    if let Some(count) = refreshed {
        let count = count.max(0);
        state.likes.counts.insert(id, count);
        state.cache.set_like_count(id, count);
    }
    ToggleOutcome {
        liked: state.likes.liked.contains(&id),
        count: current_count(state, id),
    }
}

fn rollback_toggle(state: &mut EngineState, id: ContentId, intent: ToggleIntent) {
    state.likes.pending.remove(&id);
    if intent.was_liked {
        state.likes.liked.insert(id);
    } else {
        state.likes.liked.remove(&id);
    }
    state.likes.counts.insert(id, intent.prior_count);
}

pub struct LikeService {
    state: StateHandle,
    remote: Arc<dyn RemoteStore>,
    auth: Arc<dyn AuthProvider>,
    config: SyncConfig,
}

impl LikeService {
    pub fn new(
        state: StateHandle,
        remote: Arc<dyn RemoteStore>,
        auth: Arc<dyn AuthProvider>,
        config: SyncConfig,
    ) -> Self {
        Self {
            state,
            remote,
            auth,
            config,
        }
    }

    fn principal(&self) -> SyncResult<PrincipalId> {
        self.auth
            .current_principal()
            .map(|p| p.canonical())
            .ok_or_else(|| {
                SyncError::PermissionDenied("like operations require a signed-in user".into())
            })
    }

    /// Load the principal's full like set once at startup, then prime counts
    /// from resident item metadata. Never derived by scanning all content.
    pub async fn load_initial(&self) -> SyncResult<usize> {
        let principal = self.principal()?;
        let likes = with_retry(self.config.retry.clone(), SyncError::is_transient, || {
            timed(
                self.config.remote_timeout,
                self.remote.likes_for_user(&principal),
            )
        })
        .await
        .map_err(SyncError::from)?;

        let loaded = likes.len();
        self.state
            .with(move |s| {
                s.likes.hydrate(likes);
                let ids: Vec<ContentId> = s.cache.all_ids().into_iter().collect();
                for id in ids {
                    let count = s.cache.get(id).map(|item| item.like_count);
                    if let Some(count) = count {
                        s.likes.counts.entry(id).or_insert(count);
                    }
                }
            })
            .await?;
        debug!(loaded, "hydrated like set");
        Ok(loaded)
    }

    pub async fn is_liked(&self, id: ContentId) -> SyncResult<bool> {
        self.state.with(move |s| is_liked(s, id)).await
    }

    pub async fn count(&self, id: ContentId) -> SyncResult<i64> {
        self.state.with(move |s| like_count(s, id)).await
    }

    /// Toggle the like state of one item: optimistic flip now, durable commit
    /// in the background, rollback if the commit fails.
    ///
    /// The commit task is detached so the pending gate is released on every
    /// path, even when the caller stops waiting for the outcome.
    pub async fn toggle(&self, id: ContentId) -> SyncResult<ToggleOutcome> {
        let principal = self.principal()?;
        let intent = self.state.with(move |s| begin_toggle(s, id)).await??;
        debug!(%id, kind = ?intent.kind, "like toggle accepted");

        let record = LikeRecord {
            user_id: principal,
            content_id: id,
        };
        let state = self.state.clone();
        let remote = Arc::clone(&self.remote);
        let config = self.config.clone();
        let (done_tx, done_rx) = oneshot::channel();

        tokio::spawn(async move {
            let committed = commit_remote(remote.as_ref(), &config, &record, intent.kind).await;
            let settled = match committed {
                Ok(refreshed) => state.with(move |s| commit_toggle(s, id, refreshed)).await,
                Err(err) => {
                    warn!(%id, %err, "like commit failed; rolling back");
                    // On a conflict the optimistic delta is discarded and the
                    // authoritative count reloaded.
                    let authoritative = if matches!(err, SyncError::Conflict(_)) {
                        match timed(config.remote_timeout, remote.fetch_item(id)).await {
                            Ok(Some(item)) => Some(item.like_count),
                            _ => None,
                        }
                    } else {
                        None
                    };
                    let rolled_back = state
                        .with(move |s| {
                            rollback_toggle(s, id, intent);
                            if let Some(count) = authoritative {
                                let count = count.max(0);
                                s.likes.counts.insert(id, count);
                                s.cache.set_like_count(id, count);
                            }
                        })
                        .await;
                    match rolled_back {
                        Ok(()) => Err(err),
                        Err(executor_err) => Err(executor_err),
                    }
                }
            };
            let _ = done_tx.send(settled);
        });

        done_rx.await.map_err(|_| SyncError::executor_gone())?
    }
}

async fn send_like_op(
    remote: &dyn RemoteStore,
    config: &SyncConfig,
    record: &LikeRecord,
    kind: OperationKind,
) -> SyncResult<()> {
    match kind {
        OperationKind::Like => timed(config.remote_timeout, remote.create_like(record)).await,
        OperationKind::Unlike => timed(config.remote_timeout, remote.delete_like(record)).await,
    }
}

async fn commit_remote(
    remote: &dyn RemoteStore,
    config: &SyncConfig,
    record: &LikeRecord,
    kind: OperationKind,
) -> SyncResult<Option<i64>> {
    with_retry(config.retry.clone(), SyncError::is_transient, || {
        send_like_op(remote, config, record, kind)
    })
    .await
    .map_err(SyncError::from)?;

    if !config.refresh_counts_on_commit {
        return Ok(None);
    }
    // Re-read the item record's count field so concurrent likes by other
    // principals show up. A failed refresh is not a failed toggle.
    match timed(
        config.remote_timeout,
        remote.fetch_item(record.content_id),
    )
    .await
    {
        Ok(Some(item)) => Ok(Some(item.like_count)),
        Ok(None) => Ok(None),
        Err(err) => {
            warn!(id = %record.content_id, %err, "count refresh failed after commit");
            Ok(None)
        }
    }
}
