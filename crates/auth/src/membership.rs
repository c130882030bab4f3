//! Team management rules.
//!
//! Pure decisions only: persisting the membership change is the caller's job.

use serde::{Deserialize, Serialize};

use growledger_core::{TenantId, UserId};

use crate::{Action, AuthzError, Feature, Organization, RequestContext, Role, authorize::check, can_assign_role};

/// A user's membership in an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub user_id: UserId,
    pub tenant_id: TenantId,
    pub role: Role,
    /// `false` once the user has been removed from the organization.
    pub active: bool,
}

impl Member {
    pub fn new(user_id: UserId, tenant_id: TenantId, role: Role) -> Self {
        Self {
            user_id,
            tenant_id,
            role,
            active: true,
        }
    }
}

fn ensure_assignable(ctx: &RequestContext, target: Role) -> Result<(), AuthzError> {
    if can_assign_role(ctx.role(), target) {
        Ok(())
    } else {
        tracing::warn!(
            user_id = %ctx.actor().user_id,
            assigner = %ctx.role(),
            target = %target,
            "role assignment refused"
        );
        Err(AuthzError::RoleNotAssignable {
            assigner: ctx.role(),
            target,
        })
    }
}

fn ensure_same_tenant(ctx: &RequestContext, tenant_id: TenantId) -> Result<(), AuthzError> {
    if ctx.tenant_id() == tenant_id {
        Ok(())
    } else {
        Err(AuthzError::CrossTenant)
    }
}

/// Inviting a new member with `role` into `org`, which has `current_members`.
pub fn ensure_can_invite(
    ctx: &RequestContext,
    org: &Organization,
    current_members: u64,
    role: Role,
) -> Result<(), AuthzError> {
    check(ctx, Action::InviteUsers)?;
    ensure_same_tenant(ctx, org.id)?;
    ensure_assignable(ctx, role)?;

    if !org.active {
        return Err(AuthzError::OrganizationInactive);
    }
    if !org.can_add_user(current_members) {
        tracing::info!(organization = %org.id, current_members, "user limit reached");
        return Err(AuthzError::PlanUpgradeRequired(Feature::TeamManagement));
    }
    Ok(())
}

pub fn ensure_can_change_role(ctx: &RequestContext, target: &Member, new_role: Role) -> Result<(), AuthzError> {
    check(ctx, Action::AssignRoles)?;
    ensure_same_tenant(ctx, target.tenant_id)?;

    if target.role == Role::Owner {
        return Err(AuthzError::rejected("the owner's role cannot be changed"));
    }
    ensure_assignable(ctx, new_role)
}

pub fn ensure_can_remove(ctx: &RequestContext, target: &Member) -> Result<(), AuthzError> {
    check(ctx, Action::RemoveUsers)?;
    ensure_same_tenant(ctx, target.tenant_id)?;

    if target.role == Role::Owner {
        return Err(AuthzError::rejected("the owner cannot be removed"));
    }
    if target.user_id == ctx.actor().user_id {
        return Err(AuthzError::rejected("users cannot remove themselves"));
    }
    if !target.active {
        return Err(AuthzError::rejected("user was already removed"));
    }
    Ok(())
}

/// Only the owner (or SUPER_ADMIN) may change the subscription.
pub fn ensure_can_change_plan(ctx: &RequestContext) -> Result<(), AuthzError> {
    check(ctx, Action::ManageOrganization)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{Actor, PlanTier};

    struct Fixture {
        org: Organization,
    }

    impl Fixture {
        fn new(plan: PlanTier) -> Self {
            Self {
                org: Organization::new(TenantId::new(), "Greenhouse", plan),
            }
        }

        fn ctx(&self, role: Role) -> RequestContext {
            RequestContext::for_actor(&Actor::member(self.org.id, role)).unwrap()
        }

        fn member(&self, role: Role) -> Member {
            Member::new(UserId::new(), self.org.id, role)
        }
    }

    #[test]
    fn admin_invites_within_limits() {
        let f = Fixture::new(PlanTier::Pro);
        let admin = f.ctx(Role::Admin);
        assert!(ensure_can_invite(&admin, &f.org, 3, Role::Operator).is_ok());
        assert_eq!(
            ensure_can_invite(&admin, &f.org, 3, Role::Owner),
            Err(AuthzError::RoleNotAssignable {
                assigner: Role::Admin,
                target: Role::Owner
            })
        );
        assert_eq!(
            ensure_can_invite(&admin, &f.org, 10, Role::Viewer),
            Err(AuthzError::PlanUpgradeRequired(Feature::TeamManagement))
        );
    }

    #[test]
    fn free_plan_cannot_invite_second_user() {
        let f = Fixture::new(PlanTier::Free);
        let owner = f.ctx(Role::Owner);
        assert!(matches!(
            ensure_can_invite(&owner, &f.org, 1, Role::Viewer),
            Err(AuthzError::PlanUpgradeRequired(_))
        ));
    }

    #[test]
    fn manager_cannot_invite() {
        let f = Fixture::new(PlanTier::Enterprise);
        assert!(matches!(
            ensure_can_invite(&f.ctx(Role::Manager), &f.org, 0, Role::Viewer),
            Err(AuthzError::Forbidden { .. })
        ));
    }

    #[test]
    fn owner_role_is_immutable() {
        let f = Fixture::new(PlanTier::Pro);
        let owner_member = f.member(Role::Owner);
        let err = ensure_can_change_role(&f.ctx(Role::Owner), &owner_member, Role::Admin).unwrap_err();
        assert!(matches!(err, AuthzError::Rejected(_)));
    }

    #[test]
    fn role_change_in_other_tenant_is_cross_tenant() {
        let f = Fixture::new(PlanTier::Pro);
        let foreign = Member::new(UserId::new(), TenantId::new(), Role::Viewer);
        assert_eq!(
            ensure_can_change_role(&f.ctx(Role::Admin), &foreign, Role::Operator),
            Err(AuthzError::CrossTenant)
        );
    }

    #[test]
    fn admin_promotes_operator_to_manager() {
        let f = Fixture::new(PlanTier::Pro);
        let op = f.member(Role::Operator);
        assert!(ensure_can_change_role(&f.ctx(Role::Admin), &op, Role::Manager).is_ok());
        assert!(ensure_can_change_role(&f.ctx(Role::Admin), &op, Role::Admin).is_err());
    }

    #[test]
    fn removal_rules() {
        let f = Fixture::new(PlanTier::Pro);
        let admin_ctx = f.ctx(Role::Admin);

        assert!(ensure_can_remove(&admin_ctx, &f.member(Role::Viewer)).is_ok());
        assert!(ensure_can_remove(&admin_ctx, &f.member(Role::Owner)).is_err());

        let myself = Member::new(admin_ctx.actor().user_id, f.org.id, Role::Admin);
        assert!(ensure_can_remove(&admin_ctx, &myself).is_err());

        let mut gone = f.member(Role::Operator);
        gone.active = false;
        assert!(ensure_can_remove(&admin_ctx, &gone).is_err());
    }

    #[test]
    fn only_owner_changes_plan() {
        let f = Fixture::new(PlanTier::Free);
        assert!(ensure_can_change_plan(&f.ctx(Role::Owner)).is_ok());
        assert!(ensure_can_change_plan(&f.ctx(Role::Admin)).is_err());
    }
}
