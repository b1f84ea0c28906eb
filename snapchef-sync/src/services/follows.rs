//! Follow relationships: optimistic, idempotent follow/unfollow.
//!
//! At most one record exists per ordered (follower, following) pair. Both
//! directions converge on presence/absence, so repeated calls are no-ops
//! rather than duplicates.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use resilience::with_retry;

use crate::collaborators::AuthProvider;
use crate::config::SyncConfig;
use crate::domain::models::FollowRecord;
use crate::error::{SyncError, SyncResult};
use crate::executor::StateHandle;
use crate::identity::PrincipalId;
use crate::remote::{timed, Predicate, RemoteStore};

/// Locally cached outbound follow set of the current principal. Owned by the
/// single-writer executor.
#[derive(Default)]
pub struct FollowState {
    pub(crate) following: HashSet<PrincipalId>,
}

pub struct FollowService {
    state: StateHandle,
    remote: Arc<dyn RemoteStore>,
    auth: Arc<dyn AuthProvider>,
    config: SyncConfig,
}

impl FollowService {
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
                SyncError::PermissionDenied("follow operations require a signed-in user".into())
            })
    }

    /// Hydrate the outbound follow set from one equality query.
    pub async fn load_initial(&self) -> SyncResult<usize> {
        let principal = self.principal()?;
        let predicate = Predicate::eq("follower_id", principal.as_str());
        let follows = with_retry(self.config.retry.clone(), SyncError::is_transient, || {
            timed(self.config.remote_timeout, self.remote.fetch_follows(&predicate))
        })
        .await
        .map_err(SyncError::from)?;

        let loaded = follows.len();
        self.state
            .with(move |s| {
                s.follows.following.clear();
                for record in follows {
                    s.follows.following.insert(record.following_id.canonical());
                }
            })
            .await?;
        debug!(loaded, "hydrated follow set");
        Ok(loaded)
    }

    /// Follow a user. Returns true when a new relationship was created;
    /// following an already-followed user is a no-op.
    pub async fn follow(&self, target: &PrincipalId) -> SyncResult<bool> {
        let principal = self.principal()?;
        let target = target.canonical();
        target.validate()?;
        if target == principal {
            return Err(SyncError::Validation("cannot follow yourself".into()));
        }

        let optimistic = target.clone();
        let already = self
            .state
            .with(move |s| !s.follows.following.insert(optimistic))
            .await?;
        if already {
            return Ok(false);
        }

        let record = FollowRecord {
            follower_id: principal,
            following_id: target.clone(),
        };
        let result = with_retry(self.config.retry.clone(), SyncError::is_transient, || {
            timed(self.config.remote_timeout, self.remote.create_follow(&record))
        })
        .await
        .map_err(SyncError::from);

        match result {
            Ok(newly) => Ok(newly),
            Err(err) => {
                let revert = target;
                self.state
                    .with(move |s| {
                        s.follows.following.remove(&revert);
                    })
                    .await?;
                Err(err)
            }
        }
    }

    /// Unfollow a user. Returns true when a relationship was removed.
    pub async fn unfollow(&self, target: &PrincipalId) -> SyncResult<bool> {
        let principal = self.principal()?;
        let target = target.canonical();
        target.validate()?;

        let optimistic = target.clone();
        let was_following = self
            .state
            .with(move |s| s.follows.following.remove(&optimistic))
            .await?;
        if !was_following {
            return Ok(false);
        }

        let record = FollowRecord {
            follower_id: principal,
            following_id: target.clone(),
        };
        let result = with_retry(self.config.retry.clone(), SyncError::is_transient, || {
            timed(self.config.remote_timeout, self.remote.delete_follow(&record))
        })
        .await
        .map_err(SyncError::from);

        match result {
            Ok(removed) => Ok(removed),
            Err(err) => {
                let revert = target;
                self.state
                    .with(move |s| {
                        s.follows.following.insert(revert);
                    })
                    .await?;
                Err(err)
            }
        }
    }

    pub async fn is_following(&self, target: &PrincipalId) -> SyncResult<bool> {
        let target = target.canonical();
        self.state
            .with(move |s| s.follows.following.contains(&target))
            .await
    }

    /// The principal's outbound follows, from the local set.
    pub async fn following(&self) -> SyncResult<Vec<PrincipalId>> {
        self.state
            .with(|s| {
                let mut out: Vec<PrincipalId> = s.follows.following.iter().cloned().collect();
                out.sort_by(|a, b| a.as_str().cmp(b.as_str()));
                out
            })
            .await
    }

    /// Users following the principal, via one equality query.
    pub async fn followers(&self) -> SyncResult<Vec<PrincipalId>> {
        let principal = self.principal()?;
        let predicate = Predicate::eq("following_id", principal.as_str());
        let records = with_retry(self.config.retry.clone(), SyncError::is_transient, || {
            timed(self.config.remote_timeout, self.remote.fetch_follows(&predicate))
        })
        .await
        .map_err(SyncError::from)?;

        let mut out: Vec<PrincipalId> = records
            .into_iter()
            .map(|record| record.follower_id.canonical())
            .collect();
        out.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        out.dedup();
        Ok(out)
    }
}
