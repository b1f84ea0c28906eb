//! One-shot normalization of legacy relationship identifiers.
//!
//! Scans every follow record; records carrying the deprecated prefix are
//! rewritten to canonical form, already-canonical records are counted as
//! skipped and left byte-identical. Re-running after a clean pass performs
//! zero writes.

use std::sync::Arc;

use tracing::{info, warn};

use resilience::with_retry;

use crate::config::SyncConfig;
use crate::domain::models::FollowRecord;
use crate::error::{SyncError, SyncResult};
use crate::remote::{timed, Predicate, RemoteStore};

#[derive(Debug, Default)]
pub struct MigrationReport {
    pub fixed: usize,
    pub skipped: usize,
    /// Rejected rewrites (e.g. records the acting principal does not own).
    /// Not retried automatically; surfaced for operator follow-up.
    pub failed: Vec<(FollowRecord, SyncError)>,
}

impl MigrationReport {
    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }
}

pub struct IdentifierMigration {
    remote: Arc<dyn RemoteStore>,
    config: SyncConfig,
}

impl IdentifierMigration {
    pub fn new(remote: Arc<dyn RemoteStore>, config: SyncConfig) -> Self {
        Self { remote, config }
    }

    pub async fn run(&self) -> SyncResult<MigrationReport> {
        let records = with_retry(self.config.retry.clone(), SyncError::is_transient, || {
            timed(
                self.config.remote_timeout,
                self.remote.fetch_follows(&Predicate::All),
            )
        })
        .await
        .map_err(SyncError::from)?;

        let mut report = MigrationReport::default();
        for record in records {
            if !record.is_legacy() {
                report.skipped += 1;
                continue;
            }
            let canonical = record.canonical();
            let result = with_retry(self.config.retry.clone(), SyncError::is_transient, || {
                timed(
                    self.config.remote_timeout,
                    self.remote.rewrite_follow(&record, &canonical),
                )
            })
            .await
            .map_err(SyncError::from);

            match result {
                Ok(()) => report.fixed += 1,
                Err(err) => {
                    warn!(
                        follower = %record.follower_id,
                        following = %record.following_id,
                        %err,
                        "identifier rewrite rejected; left for operator follow-up"
                    );
                    report.failed.push((record, err));
                }
            }
        }

        info!(
            fixed = report.fixed,
            skipped = report.skipped,
            failed = report.failed.len(),
            "identifier normalization finished"
        );
        Ok(report)
    }
}
