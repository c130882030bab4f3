//! `growledger-auth`: pure role/tenant authorization boundary.
//!
//! Decoupled from HTTP and storage: callers hand in the identity tuple
//! supplied by the authentication layer and get deterministic decisions back.

pub mod authorize;
pub mod context;
pub mod membership;
pub mod permissions;
pub mod plan;
pub mod principal;
pub mod roles;

pub use authorize::{AuthzError, check, check_gated, require_actor, require_feature, require_permission, require_role};
pub use context::{RequestContext, TenantContext};
pub use membership::{Member, ensure_can_change_plan, ensure_can_change_role, ensure_can_invite, ensure_can_remove};
pub use permissions::{Action, authorize, authorize_named, can_assign_role, granting_roles};
pub use plan::{
    FREE_TIER_BATCH_LIMIT, Feature, Organization, PlanLimits, PlanTier, can_access_pro_feature, can_add_batch,
};
pub use principal::Actor;
pub use roles::Role;
