//! Role × action permission matrix.
//!
//! The matrix is a static table computed at compile time from [`GRANTS`]; any
//! pair not listed there is denied.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Role;
use crate::Role::{Admin, Manager, Operator, Owner, SuperAdmin, Viewer};

/// Capability a caller may request.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    ManageOrganization,
    UpdateOrgSettings,
    InviteUsers,
    AssignRoles,
    RemoveUsers,
    GenerateReports,
    ViewReports,
    ViewFinancialReports,
    CreateBatches,
    UpdateBatches,
    DeleteBatches,
    CreateDiagnosis,
    ManageInventory,
    CreateBatchLogs,
    ViewBatchLogs,
    ViewInventory,
}

impl Action {
    pub const COUNT: usize = 16;

    pub const ALL: [Action; Action::COUNT] = [
        Action::ManageOrganization,
        Action::UpdateOrgSettings,
        Action::InviteUsers,
        Action::AssignRoles,
        Action::RemoveUsers,
        Action::GenerateReports,
        Action::ViewReports,
        Action::ViewFinancialReports,
        Action::CreateBatches,
        Action::UpdateBatches,
        Action::DeleteBatches,
        Action::CreateDiagnosis,
        Action::ManageInventory,
        Action::CreateBatchLogs,
        Action::ViewBatchLogs,
        Action::ViewInventory,
    ];

    /// Column of this action in the permission matrix.
    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Action::ManageOrganization => "manage-organization",
            Action::UpdateOrgSettings => "update-org-settings",
            Action::InviteUsers => "invite-users",
            Action::AssignRoles => "assign-roles",
            Action::RemoveUsers => "remove-users",
            Action::GenerateReports => "generate-reports",
            Action::ViewReports => "view-reports",
            Action::ViewFinancialReports => "view-financial-reports",
            Action::CreateBatches => "create-batches",
            Action::UpdateBatches => "update-batches",
            Action::DeleteBatches => "delete-batches",
            Action::CreateDiagnosis => "create-diagnosis",
            Action::ManageInventory => "manage-inventory",
            Action::CreateBatchLogs => "create-batch-logs",
            Action::ViewBatchLogs => "view-batch-logs",
            Action::ViewInventory => "view-inventory",
        }
    }
}

impl core::fmt::Display for Action {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown action '{0}'")]
pub struct UnknownAction(pub String);

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| UnknownAction(s.to_string()))
    }
}

const ORG_ADMINS: &[Role] = &[Owner, Admin, SuperAdmin];
const NON_VIEWERS: &[Role] = &[Owner, Admin, Manager, Operator, SuperAdmin];
const EVERYONE: &[Role] = &Role::ALL;

/// Explicit grants. Everything else is denied.
const GRANTS: &[(Action, &[Role])] = &[
    (Action::ManageOrganization, &[Owner, SuperAdmin]),
    (Action::UpdateOrgSettings, ORG_ADMINS),
    (Action::InviteUsers, ORG_ADMINS),
    (Action::AssignRoles, ORG_ADMINS),
    (Action::RemoveUsers, ORG_ADMINS),
    (Action::GenerateReports, &[Owner, Admin, Manager, SuperAdmin]),
    (Action::ViewReports, &[Owner, Admin, Manager, Viewer, SuperAdmin]),
    (Action::ViewFinancialReports, ORG_ADMINS),
    (Action::CreateBatches, NON_VIEWERS),
    (Action::UpdateBatches, NON_VIEWERS),
    (Action::DeleteBatches, &[Owner, Admin, Manager, SuperAdmin]),
    (Action::CreateDiagnosis, NON_VIEWERS),
    (Action::ManageInventory, NON_VIEWERS),
    (Action::CreateBatchLogs, NON_VIEWERS),
    (Action::ViewBatchLogs, EVERYONE),
    (Action::ViewInventory, EVERYONE),
];

type Matrix = [[bool; Action::COUNT]; Role::COUNT];

const fn build_matrix(grants: &[(Action, &[Role])]) -> Matrix {
    let mut table = [[false; Action::COUNT]; Role::COUNT];
    let mut i = 0;
    while i < grants.len() {
        let (action, roles) = grants[i];
        let mut j = 0;
        while j < roles.len() {
            table[roles[j].index()][action.index()] = true;
            j += 1;
        }
        i += 1;
    }
    table
}

static MATRIX: Matrix = build_matrix(GRANTS);

/// Whether `role` may perform `action`. Total, side-effect free.
pub fn authorize(role: Role, action: Action) -> bool {
    MATRIX[role.index()][action.index()]
}

/// String-keyed variant for callers holding raw names (tokens, config).
///
/// Unrecognized roles or actions are denied.
pub fn authorize_named(role: &str, action: &str) -> bool {
    match (role.parse::<Role>(), action.parse::<Action>()) {
        (Ok(role), Ok(action)) => authorize(role, action),
        _ => false,
    }
}

/// Roles that hold `action`, in declaration order.
pub fn granting_roles(action: Action) -> Vec<Role> {
    Role::ALL
        .into_iter()
        .filter(|r| authorize(*r, action))
        .collect()
}

/// Whether `assigner` may give `target` to someone.
///
/// This is the only privilege-escalation guard: OWNER can hand out anything
/// but SUPER_ADMIN, ADMIN only operational roles, SUPER_ADMIN anything.
pub fn can_assign_role(assigner: Role, target: Role) -> bool {
    match assigner {
        Role::Owner => target != Role::SuperAdmin,
        Role::Admin => matches!(target, Role::Manager | Role::Operator | Role::Viewer),
        Role::SuperAdmin => true,
        Role::Manager | Role::Operator | Role::Viewer => false,
    }
}
