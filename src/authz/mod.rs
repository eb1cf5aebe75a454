//! Authorization module - roles, the landing-route registry and the
//! per-entity access policy.
//!
//! Roles form a closed set; everything downstream matches on the enum
//! exhaustively so there is no untyped fallthrough.

mod policy;

pub use policy::{
    capabilities, scope, step_up_for_mutation, Capabilities, EntityKind, MfaWindow, RowScope, Verb,
};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Owner,
    Admin,
    Staff,
    Customer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "OWNER",
            Role::Admin => "ADMIN",
            Role::Staff => "STAFF",
            Role::Customer => "CUSTOMER",
        }
    }

    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "OWNER" => Some(Role::Owner),
            "ADMIN" => Some(Role::Admin),
            "STAFF" => Some(Role::Staff),
            "CUSTOMER" => Some(Role::Customer),
            _ => None,
        }
    }

    /// Roles allowed to issue override tokens.
    pub fn can_issue_overrides(&self) -> bool {
        matches!(self, Role::Owner | Role::Admin)
    }

    pub fn is_administrative(&self) -> bool {
        matches!(self, Role::Owner | Role::Admin)
    }
}

/// Static role -> landing route registry. Pure lookup, no state; the
/// frontend routes authenticated users here after login.
pub fn landing_route(role: Role) -> &'static str {
    match role {
        Role::Owner => "/dashboard/owner",
        Role::Admin => "/dashboard/admin",
        Role::Staff => "/dashboard/staff",
        Role::Customer => "/portal",
    }
}

/// MFA step-up recency windows. "Fresh" gates override issuance,
/// "recent" gates sensitive entity mutations.
pub fn mfa_window(window: MfaWindow) -> Duration {
    match window {
        MfaWindow::Fresh => Duration::minutes(5),
        MfaWindow::Recent => Duration::hours(12),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_role_has_a_landing_route() {
        for role in [Role::Owner, Role::Admin, Role::Staff, Role::Customer] {
            assert!(landing_route(role).starts_with('/'));
        }
    }

    #[test]
    fn role_round_trips_through_storage_form() {
        for role in [Role::Owner, Role::Admin, Role::Staff, Role::Customer] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("superuser"), None);
    }

    #[test]
    fn only_admin_tier_issues_overrides() {
        assert!(Role::Owner.can_issue_overrides());
        assert!(Role::Admin.can_issue_overrides());
        assert!(!Role::Staff.can_issue_overrides());
        assert!(!Role::Customer.can_issue_overrides());
    }
}
