//! Per-request tenant scoping.
//!
//! The tenant is carried as an explicit value through every call instead of
//! living in ambient state, so a context cannot outlive the request that
//! created it.

use serde::Serialize;

use growledger_core::TenantId;

use crate::{Actor, AuthzError, Role};

/// Holder for the tenant id resolved during authentication.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: Option<TenantId>,
}

impl TenantContext {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn for_tenant(tenant_id: TenantId) -> Self {
        Self {
            tenant_id: Some(tenant_id),
        }
    }

    /// The actor's own organization, if they have one.
    pub fn from_actor(actor: &Actor) -> Self {
        Self {
            tenant_id: actor.organization_id,
        }
    }

    pub fn set(&mut self, tenant_id: TenantId) {
        self.tenant_id = Some(tenant_id);
    }

    pub fn get(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn clear(&mut self) {
        self.tenant_id = None;
    }

    /// A missing tenant is an authentication failure, never "no data".
    pub fn require(&self) -> Result<TenantId, AuthzError> {
        self.tenant_id
            .ok_or_else(|| AuthzError::Unauthenticated("no tenant in request context".to_string()))
    }
}

/// Authenticated actor bound to the tenant they are acting in.
///
/// Only constructible through [`RequestContext::resolve`], so holding one
/// means the precondition checks already passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestContext {
    actor: Actor,
    tenant_id: TenantId,
}

impl RequestContext {
    /// Bind `actor` to the tenant in `tenant`.
    ///
    /// Fails when there is no actor, when a non SUPER_ADMIN actor has no
    /// organization, when no tenant was resolved, or when the tenant is not the
    /// actor's own organization. SUPER_ADMIN may act in any tenant.
    pub fn resolve(actor: Option<&Actor>, tenant: &TenantContext) -> Result<Self, AuthzError> {
        let actor = crate::authorize::require_actor(actor)?;
        let tenant_id = tenant.require()?;

        if !actor.role.is_super_admin() && !actor.belongs_to(tenant_id) {
            tracing::warn!(
                user_id = %actor.user_id,
                tenant_id = %tenant_id,
                "actor attempted to act outside their organization"
            );
            return Err(AuthzError::TenantMismatch);
        }

        Ok(Self {
            actor: actor.clone(),
            tenant_id,
        })
    }

    /// Resolve against the actor's own organization.
    pub fn for_actor(actor: &Actor) -> Result<Self, AuthzError> {
        Self::resolve(Some(actor), &TenantContext::from_actor(actor))
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn role(&self) -> Role {
        self.actor.role
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use growledger_core::UserId;

    #[test]
    fn tenant_context_set_get_clear() {
        let mut ctx = TenantContext::empty();
        assert!(ctx.get().is_none());
        assert!(matches!(ctx.require(), Err(AuthzError::Unauthenticated(_))));

        let tenant = TenantId::new();
        ctx.set(tenant);
        assert_eq!(ctx.get(), Some(tenant));
        assert_eq!(ctx.require().unwrap(), tenant);

        ctx.clear();
        assert!(ctx.get().is_none());
    }

    #[test]
    fn resolve_requires_actor() {
        let tenant = TenantContext::for_tenant(TenantId::new());
        let err = RequestContext::resolve(None, &tenant).unwrap_err();
        assert!(matches!(err, AuthzError::Unauthenticated(_)));
    }

    #[test]
    fn resolve_rejects_actor_without_organization() {
        let actor = Actor::new(UserId::new(), Role::Owner, None);
        let tenant = TenantContext::for_tenant(TenantId::new());
        let err = RequestContext::resolve(Some(&actor), &tenant).unwrap_err();
        assert!(matches!(err, AuthzError::Unauthenticated(_)));
    }

    #[test]
    fn resolve_requires_tenant() {
        let actor = Actor::member(TenantId::new(), Role::Manager);
        let err = RequestContext::resolve(Some(&actor), &TenantContext::empty()).unwrap_err();
        assert!(matches!(err, AuthzError::Unauthenticated(_)));
    }

    #[test]
    fn resolve_rejects_foreign_tenant() {
        let actor = Actor::member(TenantId::new(), Role::Admin);
        let other = TenantContext::for_tenant(TenantId::new());
        let err = RequestContext::resolve(Some(&actor), &other).unwrap_err();
        assert_eq!(err, AuthzError::TenantMismatch);
    }

    #[test]
    fn super_admin_may_act_in_any_tenant() {
        let actor = Actor::new(UserId::new(), Role::SuperAdmin, None);
        let tenant = TenantId::new();
        let ctx = RequestContext::resolve(Some(&actor), &TenantContext::for_tenant(tenant)).unwrap();
        assert_eq!(ctx.tenant_id(), tenant);
        assert_eq!(ctx.role(), Role::SuperAdmin);
    }

    #[test]
    fn for_actor_binds_own_organization() {
        let tenant = TenantId::new();
        let actor = Actor::member(tenant, Role::Viewer);
        let ctx = RequestContext::for_actor(&actor).unwrap();
        assert_eq!(ctx.tenant_id(), tenant);
        assert_eq!(ctx.actor(), &actor);
    }
}
