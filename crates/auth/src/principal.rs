use serde::{Deserialize, Serialize};

use growledger_core::{TenantId, UserId};

use crate::Role;

/// The authenticated caller, as supplied by the identity provider.
///
/// Taken as-is: no credential verification happens in this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
    /// Absent for freshly registered users that have not joined a tenant yet.
    pub organization_id: Option<TenantId>,
}

impl Actor {
    pub fn new(user_id: UserId, role: Role, organization_id: Option<TenantId>) -> Self {
        Self {
            user_id,
            role,
            organization_id,
        }
    }

    /// Convenience for the common case: a member of `tenant_id`.
    pub fn member(tenant_id: TenantId, role: Role) -> Self {
        Self::new(UserId::new(), role, Some(tenant_id))
    }

    pub fn belongs_to(&self, tenant_id: TenantId) -> bool {
        self.organization_id == Some(tenant_id)
    }
}
