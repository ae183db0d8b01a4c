//! The caller principal consumed from the (out-of-scope) auth collaborator.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::ids::{SubjectId, TenantId};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CallerPrincipal {
    pub subject_id: SubjectId,
    pub tenant_id: TenantId,
    pub role: String,
    pub capabilities: HashSet<String>,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

impl CallerPrincipal {
    pub fn has_capability(&self, cap: &str) -> bool {
        self.capabilities.contains(cap)
    }

    /// A trusted internal caller identified only by `x-tenant-id`, accepted
    /// on an allow-listed set of paths (§6). Carries no subject identity.
    pub fn service_call(tenant_id: TenantId) -> Self {
        CallerPrincipal {
            subject_id: SubjectId::new(),
            tenant_id,
            role: "service".to_string(),
            capabilities: HashSet::new(),
            email: None,
            display_name: None,
        }
    }
}
