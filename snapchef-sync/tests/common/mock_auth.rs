//! Mock authentication collaborator.

use std::sync::{Arc, Mutex};

use snapchef_sync::collaborators::AuthProvider;
use snapchef_sync::identity::PrincipalId;

#[derive(Clone, Default)]
pub struct MockAuth {
    principal: Arc<Mutex<Option<PrincipalId>>>,
}

impl MockAuth {
    pub fn signed_in(id: &str) -> Self {
        Self {
            principal: Arc::new(Mutex::new(Some(PrincipalId::new(id)))),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn set_principal(&self, id: Option<&str>) {
        *self.principal.lock().unwrap() = id.map(PrincipalId::new);
    }
}

impl AuthProvider for MockAuth {
    fn current_principal(&self) -> Option<PrincipalId> {
        self.principal.lock().unwrap().clone()
    }

    fn is_authenticated(&self) -> bool {
        self.principal.lock().unwrap().is_some()
    }
}
