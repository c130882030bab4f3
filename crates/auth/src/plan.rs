//! Subscription tiers and the organizations (tenants) that hold them.
//!
//! Plan gating is independent of role gating: a role may be allowed to do
//! something the tenant's plan does not include.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use growledger_core::TenantId;

/// Hard ceiling on batches for tenants without a pro-tier plan.
pub const FREE_TIER_BATCH_LIMIT: u64 = 5;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanTier {
    #[default]
    Free,
    Pro,
    Enterprise,
}

/// Quantity limits attached to a plan. `None` means unlimited.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanLimits {
    pub max_users: Option<u32>,
    pub max_batches: Option<u32>,
}

impl PlanTier {
    pub fn as_str(self) -> &'static str {
        match self {
            PlanTier::Free => "FREE",
            PlanTier::Pro => "PRO",
            PlanTier::Enterprise => "ENTERPRISE",
        }
    }

    pub fn is_pro_tier(self) -> bool {
        matches!(self, PlanTier::Pro | PlanTier::Enterprise)
    }

    pub fn default_limits(self) -> PlanLimits {
        match self {
            PlanTier::Free => PlanLimits {
                max_users: Some(1),
                max_batches: Some(FREE_TIER_BATCH_LIMIT as u32),
            },
            PlanTier::Pro => PlanLimits {
                max_users: Some(10),
                max_batches: None,
            },
            PlanTier::Enterprise => PlanLimits {
                max_users: None,
                max_batches: None,
            },
        }
    }
}

impl core::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FREE" => Ok(PlanTier::Free),
            "PRO" => Ok(PlanTier::Pro),
            "ENTERPRISE" => Ok(PlanTier::Enterprise),
            other => Err(format!("unknown plan tier '{other}'")),
        }
    }
}

/// Features only available on pro-tier plans.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Feature {
    InventoryManagement,
    TeamManagement,
    Reports,
}

impl core::fmt::Display for Feature {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Feature::InventoryManagement => "inventory-management",
            Feature::TeamManagement => "team-management",
            Feature::Reports => "reports",
        })
    }
}

/// A tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: TenantId,
    pub name: String,
    pub plan: PlanTier,
    pub max_users: Option<u32>,
    pub max_batches: Option<u32>,
    pub active: bool,
}

impl Organization {
    /// A new, active organization with the plan's default limits.
    pub fn new(id: TenantId, name: impl Into<String>, plan: PlanTier) -> Self {
        let limits = plan.default_limits();
        Self {
            id,
            name: name.into(),
            plan,
            max_users: limits.max_users,
            max_batches: limits.max_batches,
            active: true,
        }
    }

    pub fn can_add_user(&self, current_users: u64) -> bool {
        match self.max_users {
            None => true,
            Some(max) => current_users < u64::from(max),
        }
    }

    pub fn can_upgrade(&self) -> bool {
        self.plan != PlanTier::Enterprise
    }

    /// Switch plans; limits are reset to the new tier's defaults.
    pub fn change_plan(&mut self, plan: PlanTier) {
        let limits = plan.default_limits();
        self.plan = plan;
        self.max_users = limits.max_users;
        self.max_batches = limits.max_batches;
        tracing::info!(organization = %self.id, plan = %plan, "organization plan changed");
    }
}

pub fn can_access_pro_feature(org: &Organization) -> bool {
    org.plan.is_pro_tier()
}

/// Pro tiers are unlimited; everyone else stops at [`FREE_TIER_BATCH_LIMIT`].
pub fn can_add_batch(org: &Organization, current_batches: u64) -> bool {
    if can_access_pro_feature(org) {
        return true;
    }
    current_batches < FREE_TIER_BATCH_LIMIT
}

#[cfg(test)]
mod tests {
    use super::*;

    fn org(plan: PlanTier) -> Organization {
        Organization::new(TenantId::new(), "Green Acres", plan)
    }

    #[test]
    fn pro_features_need_pro_or_enterprise() {
        assert!(!can_access_pro_feature(&org(PlanTier::Free)));
        assert!(can_access_pro_feature(&org(PlanTier::Pro)));
        assert!(can_access_pro_feature(&org(PlanTier::Enterprise)));
    }

    #[test]
    fn free_tier_batch_ceiling_is_five() {
        let free = org(PlanTier::Free);
        assert!(can_add_batch(&free, 4));
        assert!(!can_add_batch(&free, 5));
        assert!(!can_add_batch(&free, 50));

        let pro = org(PlanTier::Pro);
        assert!(can_add_batch(&pro, 10_000));
    }

    #[test]
    fn user_limit_follows_plan() {
        let free = org(PlanTier::Free);
        assert!(free.can_add_user(0));
        assert!(!free.can_add_user(1));

        let enterprise = org(PlanTier::Enterprise);
        assert!(enterprise.can_add_user(u64::MAX - 1));
    }

    #[test]
    fn changing_plan_resets_limits() {
        let mut o = org(PlanTier::Free);
        o.change_plan(PlanTier::Pro);
        assert_eq!(o.max_users, Some(10));
        assert_eq!(o.max_batches, None);
        assert!(o.can_upgrade());

        o.change_plan(PlanTier::Enterprise);
        assert_eq!(o.max_users, None);
        assert!(!o.can_upgrade());
    }

    #[test]
    fn plan_names_parse() {
        assert_eq!("PRO".parse::<PlanTier>().unwrap(), PlanTier::Pro);
        assert!("GOLD".parse::<PlanTier>().is_err());
    }
}
