//! Principal identifiers and legacy-format normalization.
//!
//! Early builds stamped relationship records with a `user__`-prefixed copy of
//! the principal identifier. The canonical form drops that prefix and keeps
//! the leading underscore: `user__d4b8…` becomes `_d4b8…`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{SyncError, SyncResult};

/// Deprecated identifier prefix still present on old relationship records.
pub const LEGACY_PREFIX: &str = "user__";

/// The acting user identity, authenticated or anonymous.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(String);

impl PrincipalId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the identifier still carries the deprecated prefix.
    pub fn is_legacy(&self) -> bool {
        self.0.starts_with(LEGACY_PREFIX)
    }

    /// Canonical form of this identifier. Already-canonical ids are returned
    /// unchanged, so the mapping is idempotent.
    pub fn canonical(&self) -> PrincipalId {
        match self.0.strip_prefix(LEGACY_PREFIX) {
            Some(rest) => PrincipalId(format!("_{rest}")),
            None => self.clone(),
        }
    }

    pub fn validate(&self) -> SyncResult<()> {
        if self.0.is_empty() || self.0.chars().any(char::is_whitespace) {
            return Err(SyncError::Validation(format!(
                "malformed principal identifier `{}`",
                self.0
            )));
        }
        Ok(())
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PrincipalId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}
