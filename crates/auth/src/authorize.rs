//! Fail-fast authorization checks.
//!
//! The boolean capability table lives in [`crate::permissions`]; this module
//! turns it into typed errors and logs every decision.

use thiserror::Error;

use crate::{Action, Actor, Feature, Organization, RequestContext, Role, can_access_pro_feature, permissions};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("tenant mismatch")]
    TenantMismatch,

    #[error("forbidden: role {role} may not {action}")]
    Forbidden { role: Role, action: Action },

    #[error("forbidden: role {role} is not one of [{}]", display_roles(.allowed))]
    RoleRequired { role: Role, allowed: Vec<Role> },

    #[error("plan upgrade required for {0}")]
    PlanUpgradeRequired(Feature),

    #[error("organization is inactive")]
    OrganizationInactive,

    #[error("role {assigner} may not assign role {target}")]
    RoleNotAssignable { assigner: Role, target: Role },

    #[error("target belongs to another organization")]
    CrossTenant,

    #[error("rejected: {0}")]
    Rejected(String),
}

impl AuthzError {
    pub fn unauthenticated(msg: impl Into<String>) -> Self {
        Self::Unauthenticated(msg.into())
    }

    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }
}

fn display_roles(roles: &[Role]) -> String {
    roles.iter().map(|r| r.as_str()).collect::<Vec<_>>().join(", ")
}

/// The "is there anyone acting at all" precondition.
///
/// Fails when no actor is present, or when the actor has no organization and
/// is not SUPER_ADMIN.
pub fn require_actor(actor: Option<&Actor>) -> Result<&Actor, AuthzError> {
    let Some(actor) = actor else {
        tracing::warn!("request without an authenticated actor");
        return Err(AuthzError::unauthenticated("no authenticated actor"));
    };

    if actor.organization_id.is_none() && !actor.role.is_super_admin() {
        tracing::warn!(user_id = %actor.user_id, "actor does not belong to any organization");
        return Err(AuthzError::unauthenticated("actor does not belong to any organization"));
    }

    Ok(actor)
}

/// Precondition plus capability check for `action`.
pub fn require_permission(actor: Option<&Actor>, action: Action) -> Result<&Actor, AuthzError> {
    let actor = require_actor(actor)?;
    decide(actor, action)?;
    Ok(actor)
}

/// Capability check for an already resolved request.
pub fn check(ctx: &RequestContext, action: Action) -> Result<(), AuthzError> {
    decide(ctx.actor(), action).inspect_err(|_| {
        tracing::warn!(tenant_id = %ctx.tenant_id(), "request denied");
    })
}

fn decide(actor: &Actor, action: Action) -> Result<(), AuthzError> {
    if permissions::authorize(actor.role, action) {
        tracing::debug!(user_id = %actor.user_id, role = %actor.role, action = %action, "permission granted");
        Ok(())
    } else {
        tracing::warn!(user_id = %actor.user_id, role = %actor.role, action = %action, "permission denied");
        Err(AuthzError::Forbidden {
            role: actor.role,
            action,
        })
    }
}

/// Precondition plus an explicit allow-list of roles.
pub fn require_role<'a>(actor: Option<&'a Actor>, allowed: &[Role]) -> Result<&'a Actor, AuthzError> {
    let actor = require_actor(actor)?;
    if allowed.contains(&actor.role) {
        return Ok(actor);
    }

    tracing::warn!(user_id = %actor.user_id, role = %actor.role, "role not in allow-list");
    Err(AuthzError::RoleRequired {
        role: actor.role,
        allowed: allowed.to_vec(),
    })
}

/// Plan gate for `feature`. Inactive organizations fail every gate.
pub fn require_feature(org: &Organization, feature: Feature) -> Result<(), AuthzError> {
    if !org.active {
        tracing::warn!(organization = %org.id, "organization is inactive");
        return Err(AuthzError::OrganizationInactive);
    }

    if can_access_pro_feature(org) {
        return Ok(());
    }

    tracing::info!(organization = %org.id, plan = %org.plan, feature = %feature, "feature requires plan upgrade");
    Err(AuthzError::PlanUpgradeRequired(feature))
}

/// Role first, plan second: a Forbidden caller never learns about plan gating.
pub fn check_gated(
    ctx: &RequestContext,
    org: &Organization,
    action: Action,
    feature: Feature,
) -> Result<(), AuthzError> {
    check(ctx, action)?;
    if org.id != ctx.tenant_id() {
        return Err(AuthzError::CrossTenant);
    }
    require_feature(org, feature)
}

#[cfg(test)]
mod tests {
    use super::*;

    use growledger_core::{TenantId, UserId};

    use crate::{PlanTier, TenantContext};

    fn ctx(role: Role) -> RequestContext {
        RequestContext::for_actor(&Actor::member(TenantId::new(), role)).unwrap()
    }

    #[test]
    fn require_permission_rejects_missing_actor() {
        let err = require_permission(None, Action::ViewInventory).unwrap_err();
        assert!(matches!(err, AuthzError::Unauthenticated(_)));
    }

    #[test]
    fn require_permission_rejects_orphan_actor() {
        let actor = Actor::new(UserId::new(), Role::Manager, None);
        let err = require_permission(Some(&actor), Action::ViewInventory).unwrap_err();
        assert!(matches!(err, AuthzError::Unauthenticated(_)));
    }

    #[test]
    fn super_admin_without_organization_passes_precondition() {
        let actor = Actor::new(UserId::new(), Role::SuperAdmin, None);
        assert!(require_permission(Some(&actor), Action::ManageOrganization).is_ok());
    }

    #[test]
    fn require_permission_checks_capability() {
        let viewer = Actor::member(TenantId::new(), Role::Viewer);
        let err = require_permission(Some(&viewer), Action::ManageInventory).unwrap_err();
        assert_eq!(
            err,
            AuthzError::Forbidden {
                role: Role::Viewer,
                action: Action::ManageInventory
            }
        );
    }

    #[test]
    fn check_grants_and_denies() {
        assert!(check(&ctx(Role::Operator), Action::ManageInventory).is_ok());
        assert!(check(&ctx(Role::Viewer), Action::ViewInventory).is_ok());
        assert!(check(&ctx(Role::Manager), Action::InviteUsers).is_err());
    }

    #[test]
    fn require_role_uses_allow_list() {
        let admin = Actor::member(TenantId::new(), Role::Admin);
        assert!(require_role(Some(&admin), &[Role::Owner, Role::Admin]).is_ok());

        let err = require_role(Some(&admin), &[Role::Owner]).unwrap_err();
        assert_eq!(err.to_string(), "forbidden: role ADMIN is not one of [OWNER]");
    }

    #[test]
    fn require_feature_follows_plan_and_activity() {
        let tenant = TenantId::new();
        let mut org = Organization::new(tenant, "Acme", PlanTier::Free);
        assert_eq!(
            require_feature(&org, Feature::InventoryManagement),
            Err(AuthzError::PlanUpgradeRequired(Feature::InventoryManagement))
        );

        org.change_plan(PlanTier::Pro);
        assert!(require_feature(&org, Feature::InventoryManagement).is_ok());

        org.active = false;
        assert_eq!(
            require_feature(&org, Feature::InventoryManagement),
            Err(AuthzError::OrganizationInactive)
        );
    }

    #[test]
    fn gated_check_reports_role_before_plan() {
        let tenant = TenantId::new();
        let org = Organization::new(tenant, "Acme", PlanTier::Free);

        let viewer = RequestContext::for_actor(&Actor::member(tenant, Role::Viewer)).unwrap();
        let err = check_gated(&viewer, &org, Action::ManageInventory, Feature::InventoryManagement).unwrap_err();
        assert!(matches!(err, AuthzError::Forbidden { .. }));

        let manager = RequestContext::for_actor(&Actor::member(tenant, Role::Manager)).unwrap();
        let err = check_gated(&manager, &org, Action::ManageInventory, Feature::InventoryManagement).unwrap_err();
        assert!(matches!(err, AuthzError::PlanUpgradeRequired(_)));
    }

    #[test]
    fn gated_check_rejects_other_tenants_organization() {
        let super_admin = Actor::new(UserId::new(), Role::SuperAdmin, None);
        let ctx = RequestContext::resolve(Some(&super_admin), &TenantContext::for_tenant(TenantId::new())).unwrap();
        let other = Organization::new(TenantId::new(), "Other", PlanTier::Enterprise);
        assert_eq!(
            check_gated(&ctx, &other, Action::ManageInventory, Feature::InventoryManagement),
            Err(AuthzError::CrossTenant)
        );
    }
}
