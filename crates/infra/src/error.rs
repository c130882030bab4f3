//! Error taxonomy of the stock mutation service.

use serde::Serialize;
use thiserror::Error;

use growledger_auth::{AuthzError, Feature};
use growledger_core::DomainError;

use crate::store::StoreError;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ServiceError {
    /// No resolvable actor or tenant. Ends the request.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error(transparent)]
    Forbidden(AuthzError),

    #[error("plan upgrade required for {0}")]
    PlanUpgradeRequired(Feature),

    #[error("{0} not found")]
    NotFound(&'static str),

    /// The item exists in another tenant. Displays exactly like a missing item.
    #[error("item not found")]
    CrossTenantAccess,

    #[error("insufficient stock (current: {current}, requested: {requested})")]
    InsufficientStock { current: f64, requested: f64 },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// The optimistic commit kept losing against concurrent writers.
    #[error("item is busy: gave up after {attempts} conflicting attempts")]
    Contention { attempts: u32 },

    #[error(transparent)]
    Infrastructure(StoreError),
}

impl ServiceError {
    /// Business-rule failures the caller can act on. Everything else aborts.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ServiceError::Forbidden(_)
                | ServiceError::PlanUpgradeRequired(_)
                | ServiceError::NotFound(_)
                | ServiceError::CrossTenantAccess
                | ServiceError::InsufficientStock { .. }
                | ServiceError::Validation(_)
                | ServiceError::Contention { .. }
        )
    }

    /// What may be shown to the caller.
    pub fn outward(&self) -> OutwardError {
        match self {
            ServiceError::Unauthenticated(_) => OutwardError::Unauthenticated,
            ServiceError::Forbidden(_) => OutwardError::Forbidden,
            ServiceError::PlanUpgradeRequired(feature) => OutwardError::PlanUpgradeRequired { feature: *feature },
            ServiceError::NotFound(what) => OutwardError::NotFound { what: *what },
            ServiceError::CrossTenantAccess => OutwardError::NotFound { what: "item" },
            ServiceError::InsufficientStock { current, requested } => OutwardError::InsufficientStock {
                current: *current,
                requested: *requested,
            },
            ServiceError::Validation(msg) => OutwardError::Validation { message: msg.clone() },
            ServiceError::Contention { .. } => OutwardError::Contention,
            ServiceError::InvariantViolation(_) | ServiceError::Infrastructure(_) => OutwardError::Internal,
        }
    }
}

impl From<AuthzError> for ServiceError {
    fn from(value: AuthzError) -> Self {
        match value {
            AuthzError::Unauthenticated(msg) => ServiceError::Unauthenticated(msg),
            AuthzError::PlanUpgradeRequired(feature) => ServiceError::PlanUpgradeRequired(feature),
            other => ServiceError::Forbidden(other),
        }
    }
}

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) | DomainError::Conflict(msg) => {
                ServiceError::Validation(msg)
            }
            DomainError::InvariantViolation(msg) => ServiceError::InvariantViolation(msg),
            DomainError::NotFound => ServiceError::NotFound("item"),
            DomainError::Unauthorized => ServiceError::Forbidden(AuthzError::rejected("unauthorized")),
            DomainError::InsufficientStock { current, requested } => {
                ServiceError::InsufficientStock { current, requested }
            }
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Invariant(msg) => ServiceError::InvariantViolation(msg),
            other => ServiceError::Infrastructure(other),
        }
    }
}

/// Caller-facing error. Never distinguishes another tenant's item from a
/// missing one.
#[derive(Debug, Error, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutwardError {
    #[error("authentication required")]
    Unauthenticated,

    #[error("forbidden")]
    Forbidden,

    #[error("your plan does not include {feature}; upgrade to use it")]
    PlanUpgradeRequired { feature: Feature },

    #[error("{what} not found")]
    NotFound { what: &'static str },

    #[error("insufficient stock (current: {current}, requested: {requested})")]
    InsufficientStock { current: f64, requested: f64 },

    #[error("{message}")]
    Validation { message: String },

    #[error("the item is busy, try again")]
    Contention,

    #[error("internal error")]
    Internal,
}

#[cfg(test)]
mod tests {
    use super::*;

    use growledger_auth::{Action, Role};

    #[test]
    fn cross_tenant_is_indistinguishable_outside() {
        let hidden = ServiceError::CrossTenantAccess;
        let missing = ServiceError::NotFound("item");
        assert_eq!(hidden.outward(), missing.outward());
        assert_eq!(hidden.to_string(), missing.to_string());
    }

    #[test]
    fn authz_errors_keep_their_class() {
        assert!(matches!(
            ServiceError::from(AuthzError::unauthenticated("no actor")),
            ServiceError::Unauthenticated(_)
        ));
        assert_eq!(
            ServiceError::from(AuthzError::PlanUpgradeRequired(Feature::InventoryManagement)).outward(),
            OutwardError::PlanUpgradeRequired {
                feature: Feature::InventoryManagement
            }
        );
        let forbidden = ServiceError::from(AuthzError::Forbidden {
            role: Role::Viewer,
            action: Action::ManageInventory,
        });
        assert_eq!(forbidden.outward(), OutwardError::Forbidden);
        assert!(forbidden.is_recoverable());
    }

    #[test]
    fn fatal_errors_are_not_recoverable() {
        assert!(!ServiceError::InvariantViolation("drift".into()).is_recoverable());
        assert!(!ServiceError::from(StoreError::Timeout("pool".into())).is_recoverable());
        assert!(!ServiceError::Unauthenticated("no tenant".into()).is_recoverable());
        assert_eq!(
            ServiceError::from(StoreError::Backend("boom".into())).outward(),
            OutwardError::Internal
        );
    }

    #[test]
    fn outward_errors_serialize_with_a_kind_tag() {
        let json = serde_json::to_value(ServiceError::CrossTenantAccess.outward()).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "not_found", "what": "item" }));

        let json = serde_json::to_value(ServiceError::PlanUpgradeRequired(Feature::InventoryManagement).outward()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "kind": "plan_upgrade_required", "feature": "inventory-management" })
        );
    }

    #[test]
    fn insufficient_stock_carries_quantities() {
        let err = ServiceError::from(DomainError::insufficient_stock(70.0, 80.0));
        assert_eq!(
            err.outward(),
            OutwardError::InsufficientStock {
                current: 70.0,
                requested: 80.0
            }
        );
        assert!(err.is_recoverable());
    }
}
