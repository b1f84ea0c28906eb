//! Narrow interfaces onto subsystems outside the engine.

use async_trait::async_trait;

use crate::domain::models::{AssetPair, ContentId};
use crate::error::SyncResult;
use crate::identity::PrincipalId;

/// Supplies the acting principal. Implemented by the authentication
/// subsystem; the engine has no other coupling to it.
pub trait AuthProvider: Send + Sync {
    fn current_principal(&self) -> Option<PrincipalId>;
    fn is_authenticated(&self) -> bool;
}

/// Binary storage for before/after photo pairs, keyed by content id.
#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn fetch_assets(&self, id: ContentId) -> SyncResult<AssetPair>;
    async fn store_assets(&self, id: ContentId, assets: &AssetPair) -> SyncResult<()>;
}
