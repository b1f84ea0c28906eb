//! Single-writer executor for shared engine state.
//!
//! Every read and mutation of the local cache and the relationship maps runs
//! as a closure on one task that owns [`EngineState`]. Concurrent callers
//! serialize onto its command queue instead of racing on shared memory, and
//! readers only ever observe fully committed state.

use std::collections::HashSet;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::cache::ContentCache;
use crate::config::SyncConfig;
use crate::domain::models::ContentId;
use crate::error::{SyncError, SyncResult};
use crate::services::follows::FollowState;
use crate::services::likes::LikeState;

pub struct EngineState {
    pub cache: ContentCache,
    pub likes: LikeState,
    pub follows: FollowState,
    /// Content ids some caller still wants; results for ids outside this set
    /// are discarded when they arrive (stale-result guard).
    pub interest: HashSet<ContentId>,
}

impl EngineState {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            cache: ContentCache::new(config.max_cached_asset_pairs),
            likes: LikeState::default(),
            follows: FollowState::default(),
            interest: HashSet::new(),
        }
    }
}

type Command = Box<dyn FnOnce(&mut EngineState) + Send>;

/// Cloneable handle onto the executor task.
#[derive(Clone)]
pub struct StateHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl StateHandle {
    /// Spawn the executor task that owns the engine state. Requires a running
    /// tokio runtime.
    pub fn spawn(state: EngineState) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Command>();
        tokio::spawn(async move {
            let mut state = state;
            while let Some(cmd) = rx.recv().await {
                cmd(&mut state);
            }
            debug!("state executor stopped");
        });
        Self { tx }
    }

    /// Run a closure against the engine state and await its result.
    pub async fn with<R, F>(&self, f: F) -> SyncResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut EngineState) -> R + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let cmd: Command = Box::new(move |state| {
            let _ = reply_tx.send(f(state));
        });
        self.tx
            .send(cmd)
            .map_err(|_| SyncError::executor_gone())?;
        reply_rx.await.map_err(|_| SyncError::executor_gone())
    }
}
