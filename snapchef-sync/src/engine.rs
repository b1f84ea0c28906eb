//! Engine assembly.
//!
//! Services are explicit, constructor-injected instances over shared
//! collaborators and the single-writer state executor; nothing lives in
//! process-wide globals.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::info;

use crate::collaborators::{AssetStore, AuthProvider};
use crate::config::SyncConfig;
use crate::domain::models::{AssetPair, ContentId, ContentItem, SyncStatus, UserProfile, Visibility};
use crate::error::SyncResult;
use crate::executor::{EngineState, StateHandle};
use crate::identity::PrincipalId;
use crate::remote::{CapabilityCache, RemoteStore};
use crate::services::content::ContentService;
use crate::services::follows::FollowService;
use crate::services::likes::{LikeService, ToggleOutcome};
use crate::services::migration::{IdentifierMigration, MigrationReport};
use crate::services::profiles::ProfileService;
use crate::services::sync::{PullReport, PushReport, SyncService};

pub struct SyncEngine {
    sync: Arc<SyncService>,
    content: ContentService,
    likes: LikeService,
    follows: FollowService,
    profiles: ProfileService,
    migration: IdentifierMigration,
}

impl SyncEngine {
    /// Assemble the engine. Requires a running tokio runtime.
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        assets: Arc<dyn AssetStore>,
        auth: Arc<dyn AuthProvider>,
        config: SyncConfig,
    ) -> Self {
        let state = StateHandle::spawn(EngineState::new(&config));
        let capabilities = Arc::new(CapabilityCache::new());

        let sync = Arc::new(SyncService::new(
            state.clone(),
            Arc::clone(&remote),
            Arc::clone(&assets),
            Arc::clone(&auth),
            Arc::clone(&capabilities),
            config.clone(),
        ));
        let content = ContentService::new(
            state.clone(),
            Arc::clone(&sync),
            Arc::clone(&assets),
            Arc::clone(&auth),
            config.clone(),
        );
        let likes = LikeService::new(
            state.clone(),
            Arc::clone(&remote),
            Arc::clone(&auth),
            config.clone(),
        );
        let follows = FollowService::new(
            state.clone(),
            Arc::clone(&remote),
            Arc::clone(&auth),
            config.clone(),
        );
        let profiles = ProfileService::new(
            Arc::clone(&remote),
            Arc::clone(&auth),
            Arc::clone(&capabilities),
            config.clone(),
        );
        let migration = IdentifierMigration::new(remote, config);

        Self {
            sync,
            content,
            likes,
            follows,
            profiles,
            migration,
        }
    }

    /// Hydrate relationship state for the signed-in principal. Called once
    /// after sign-in.
    pub async fn load_initial(&self) -> SyncResult<()> {
        let likes = self.likes.load_initial().await?;
        let follows = self.follows.load_initial().await?;
        info!(likes, follows, "initial relationship state loaded");
        Ok(())
    }

    // Content

    pub async fn create_content(
        &self,
        payload: JsonValue,
        visibility: Visibility,
    ) -> SyncResult<ContentItem> {
        self.content.create(payload, visibility).await
    }

    pub async fn update_content(&self, item: ContentItem) -> SyncResult<ContentItem> {
        self.content.update(item).await
    }

    pub async fn get_content(&self, id: ContentId) -> SyncResult<Option<ContentItem>> {
        self.content.get(id).await
    }

    pub async fn content_assets(&self, id: ContentId) -> SyncResult<Option<AssetPair>> {
        self.content.assets(id).await
    }

    pub async fn attach_assets(&self, id: ContentId, pair: AssetPair) -> SyncResult<()> {
        self.content.attach_assets(id, pair).await
    }

    // Likes

    pub async fn toggle_like(&self, id: ContentId) -> SyncResult<ToggleOutcome> {
        self.likes.toggle(id).await
    }

    pub async fn is_liked(&self, id: ContentId) -> SyncResult<bool> {
        self.likes.is_liked(id).await
    }

    pub async fn like_count(&self, id: ContentId) -> SyncResult<i64> {
        self.likes.count(id).await
    }

    // Follows

    pub async fn follow(&self, target: &PrincipalId) -> SyncResult<bool> {
        self.follows.follow(target).await
    }

    pub async fn unfollow(&self, target: &PrincipalId) -> SyncResult<bool> {
        self.follows.unfollow(target).await
    }

    pub async fn is_following(&self, target: &PrincipalId) -> SyncResult<bool> {
        self.follows.is_following(target).await
    }

    pub async fn following(&self) -> SyncResult<Vec<PrincipalId>> {
        self.follows.following().await
    }

    pub async fn followers(&self) -> SyncResult<Vec<PrincipalId>> {
        self.follows.followers().await
    }

    // Profiles

    pub async fn profile(&self, id: &PrincipalId) -> SyncResult<Option<UserProfile>> {
        self.profiles.profile(id).await
    }

    pub async fn refresh_own_counts(&self) -> SyncResult<UserProfile> {
        self.profiles.refresh_own_counts().await
    }

    pub async fn profiles_missing_display_name(&self) -> SyncResult<Vec<UserProfile>> {
        self.profiles.profiles_missing_display_name().await
    }

    // Reconciliation

    pub async fn pull(&self, required: Vec<ContentId>) -> SyncResult<PullReport> {
        self.sync.pull(required).await
    }

    pub async fn push(&self) -> SyncResult<PushReport> {
        self.sync.push().await
    }

    /// Make the principal's own content (plus public items when requested)
    /// resident.
    pub async fn sync_owned(&self, include_public: bool) -> SyncResult<PullReport> {
        self.sync.pull_owned(include_public).await
    }

    pub async fn sync_status(&self, id: ContentId) -> SyncResult<Option<SyncStatus>> {
        self.sync.status(id).await
    }

    pub fn spawn_periodic_push(&self) -> tokio::task::JoinHandle<()> {
        self.sync.spawn_periodic()
    }

    pub async fn release_interest(&self, id: ContentId) -> SyncResult<()> {
        self.sync.release_interest(id).await
    }

    // Maintenance

    pub async fn run_identifier_normalization(&self) -> SyncResult<MigrationReport> {
        self.migration.run().await
    }
}
