//! Ownership stamping and scoping rules.
//!
//! These checks run locally, before any dispatch to the remote store, so
//! callers get a precise fast failure instead of relying on remote
//! enforcement alone.

use crate::domain::models::ContentItem;
use crate::error::{SyncError, SyncResult};
use crate::identity::PrincipalId;
use crate::remote::QueryScope;

/// Stamp newly created content with the acting principal. The owner is set
/// exactly once; a later attempt to change it fails validation.
pub fn stamp_owner(item: &mut ContentItem, principal: &PrincipalId) -> SyncResult<()> {
    let canonical = principal.canonical();
    canonical.validate()?;
    if item.owner_id.as_str().is_empty() {
        item.owner_id = canonical;
        Ok(())
    } else if item.owner_id == canonical {
        Ok(())
    } else {
        Err(SyncError::Validation(format!(
            "owner of item {} is immutable",
            item.id
        )))
    }
}

/// Reject mutations of records the acting principal does not own.
pub fn ensure_owned(item: &ContentItem, principal: &PrincipalId) -> SyncResult<()> {
    if item.owner_id == principal.canonical() {
        Ok(())
    } else {
        Err(SyncError::PermissionDenied(format!(
            "item {} belongs to {}",
            item.id, item.owner_id
        )))
    }
}

/// Restrict a content query to the principal's records, plus public ones
/// when requested.
pub fn scope_query(principal: &PrincipalId, include_public: bool) -> QueryScope {
    QueryScope {
        owner: principal.canonical(),
        include_public,
    }
}
