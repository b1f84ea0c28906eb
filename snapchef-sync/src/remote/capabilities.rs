//! First-failure cache of remote schema capability.

use parking_lot::RwLock;
use std::collections::HashSet;
use tracing::warn;

use crate::remote::{FieldSet, RecordType};

/// Remembers which (record type, field) writes the deployed schema rejected,
/// so later writes omit them instead of failing the same way again.
#[derive(Debug, Default)]
pub struct CapabilityCache {
    unsupported: RwLock<HashSet<(RecordType, String)>>,
}

impl CapabilityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_unsupported(&self, record_type: RecordType, field: &str) {
        let newly = self
            .unsupported
            .write()
            .insert((record_type, field.to_string()));
        if newly {
            warn!(%record_type, field, "remote schema rejected field; writes will omit it");
        }
    }

    pub fn is_supported(&self, record_type: RecordType, field: &str) -> bool {
        !self
            .unsupported
            .read()
            .contains(&(record_type, field.to_string()))
    }

    /// Omit-set for writes of the given record type.
    pub fn omitted_fields(&self, record_type: RecordType) -> FieldSet {
        self.unsupported
            .read()
            .iter()
            .filter(|(rt, _)| *rt == record_type)
            .map(|(_, field)| field.clone())
            .collect()
    }
}
