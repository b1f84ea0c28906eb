//! Profile directory: read-through fetch, absent-field filtering, and
//! best-effort self-reported aggregate counts.

use std::sync::Arc;

use tracing::warn;

use resilience::with_retry;

use crate::collaborators::AuthProvider;
use crate::config::SyncConfig;
use crate::domain::models::UserProfile;
use crate::error::{SyncError, SyncResult};
use crate::identity::PrincipalId;
use crate::remote::{timed, CapabilityCache, Predicate, RecordType, RemoteStore};

pub struct ProfileService {
    remote: Arc<dyn RemoteStore>,
    auth: Arc<dyn AuthProvider>,
    capabilities: Arc<CapabilityCache>,
    config: SyncConfig,
}

impl ProfileService {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        auth: Arc<dyn AuthProvider>,
        capabilities: Arc<CapabilityCache>,
        config: SyncConfig,
    ) -> Self {
        Self {
            remote,
            auth,
            capabilities,
            config,
        }
    }

    fn principal(&self) -> SyncResult<PrincipalId> {
        self.auth
            .current_principal()
            .map(|p| p.canonical())
            .ok_or_else(|| {
                SyncError::PermissionDenied("profile operations require a signed-in user".into())
            })
    }

    async fn fetch_profiles(&self, predicate: &Predicate) -> SyncResult<Vec<UserProfile>> {
        with_retry(self.config.retry.clone(), SyncError::is_transient, || {
            timed(self.config.remote_timeout, self.remote.fetch_profiles(predicate))
        })
        .await
        .map_err(SyncError::from)
    }

    async fn fetch_follow_count(&self, field: &str, principal: &PrincipalId) -> SyncResult<i64> {
        let predicate = Predicate::eq(field, principal.as_str());
        let records = with_retry(self.config.retry.clone(), SyncError::is_transient, || {
            timed(self.config.remote_timeout, self.remote.fetch_follows(&predicate))
        })
        .await
        .map_err(SyncError::from)?;
        Ok(records.len() as i64)
    }

    pub async fn profile(&self, id: &PrincipalId) -> SyncResult<Option<UserProfile>> {
        let id = id.canonical();
        let predicate = Predicate::eq("id", id.as_str());
        let mut found = self.fetch_profiles(&predicate).await?;
        Ok(if found.is_empty() {
            None
        } else {
            Some(found.swap_remove(0))
        })
    }

    /// Profiles whose display name was never set. The remote store cannot
    /// evaluate absent-field predicates, so this fetches every profile and
    /// filters locally.
    pub async fn profiles_missing_display_name(&self) -> SyncResult<Vec<UserProfile>> {
        let all = self.fetch_profiles(&Predicate::All).await?;
        Ok(all
            .into_iter()
            .filter(|p| p.display_name.as_deref().map_or(true, str::is_empty))
            .collect())
    }

    /// Recompute the principal's aggregate counts from relationship records
    /// and self-report them. The write-back is advisory: a deployment whose
    /// schema lacks the counter fields degrades to locally cached counts.
    pub async fn refresh_own_counts(&self) -> SyncResult<UserProfile> {
        let principal = self.principal()?;
        let follower_count = self.fetch_follow_count("following_id", &principal).await?;
        let following_count = self.fetch_follow_count("follower_id", &principal).await?;

        let existing = self.profile(&principal).await?;
        let profile = UserProfile {
            id: principal,
            display_name: existing.and_then(|p| p.display_name),
            follower_count: Some(follower_count),
            following_count: Some(following_count),
        };

        loop {
            let omit = self.capabilities.omitted_fields(RecordType::Profile);
            let result = with_retry(self.config.retry.clone(), SyncError::is_transient, || {
                timed(self.config.remote_timeout, self.remote.save_profile(&profile, &omit))
            })
            .await
            .map_err(SyncError::from);

            match result {
                Ok(()) => break,
                Err(SyncError::SchemaUnsupported { record_type, field }) => {
                    self.capabilities.mark_unsupported(record_type, &field);
                }
                Err(err) => {
                    warn!(%err, "profile count write-back skipped");
                    break;
                }
            }
        }
        Ok(profile)
    }
}
