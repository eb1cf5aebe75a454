use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::Role;

/// Entity types managed by the CRUD engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Pet,
    Booking,
    Kennel,
    User,
    CareLog,
    Notification,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Pet => "pet",
            EntityKind::Booking => "booking",
            EntityKind::Kennel => "kennel",
            EntityKind::User => "user",
            EntityKind::CareLog => "care_log",
            EntityKind::Notification => "notification",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Create,
    Read,
    Update,
    Delete,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Create => "create",
            Verb::Read => "read",
            Verb::Update => "update",
            Verb::Delete => "delete",
        }
    }
}

/// What a role may do to an entity type, before row scoping is applied.
#[derive(Debug, Clone, Copy, Default)]
pub struct Capabilities {
    pub create: bool,
    pub read: bool,
    pub update: bool,
    pub delete: bool,
}

impl Capabilities {
    const FULL: Capabilities = Capabilities {
        create: true,
        read: true,
        update: true,
        delete: true,
    };

    const READ_ONLY: Capabilities = Capabilities {
        create: false,
        read: true,
        update: false,
        delete: false,
    };

    pub fn allows(&self, verb: Verb) -> bool {
        match verb {
            Verb::Create => self.create,
            Verb::Read => self.read,
            Verb::Update => self.update,
            Verb::Delete => self.delete,
        }
    }
}

/// Row visibility for list/read and the ownership requirement for
/// mutations. `Mine` carries the caller's user id so entity queries can
/// bind it directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowScope {
    All,
    Mine(Uuid),
}

/// MFA recency tiers; durations live in `super::mfa_window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MfaWindow {
    Fresh,
    Recent,
}

/// Capability table. Exhaustive over (entity, role) so adding a role or
/// an entity forces this table to be revisited; unmatched combinations
/// cannot exist.
pub fn capabilities(kind: EntityKind, role: Role) -> Capabilities {
    match (kind, role) {
        (EntityKind::Pet, Role::Owner | Role::Admin) => Capabilities::FULL,
        (EntityKind::Pet, Role::Staff) => Capabilities {
            create: false,
            read: true,
            update: true,
            delete: false,
        },
        (EntityKind::Pet, Role::Customer) => Capabilities::FULL,

        (EntityKind::Booking, Role::Owner | Role::Admin) => Capabilities::FULL,
        (EntityKind::Booking, Role::Staff) => Capabilities {
            create: true,
            read: true,
            update: true,
            delete: false,
        },
        (EntityKind::Booking, Role::Customer) => Capabilities {
            create: true,
            read: true,
            update: true,
            delete: false,
        },

        (EntityKind::Kennel, Role::Owner | Role::Admin) => Capabilities::FULL,
        (EntityKind::Kennel, Role::Staff | Role::Customer) => Capabilities::READ_ONLY,

        (EntityKind::User, Role::Owner | Role::Admin) => Capabilities::FULL,
        (EntityKind::User, Role::Staff) => Capabilities::READ_ONLY,
        (EntityKind::User, Role::Customer) => Capabilities {
            create: false,
            read: true,
            update: true,
            delete: false,
        },

        (EntityKind::CareLog, Role::Owner | Role::Admin) => Capabilities::FULL,
        (EntityKind::CareLog, Role::Staff) => Capabilities {
            create: true,
            read: true,
            update: true,
            delete: false,
        },
        (EntityKind::CareLog, Role::Customer) => Capabilities::READ_ONLY,

        (EntityKind::Notification, Role::Owner | Role::Admin) => Capabilities::FULL,
        (EntityKind::Notification, Role::Staff) => Capabilities {
            create: true,
            read: true,
            update: false,
            delete: false,
        },
        (EntityKind::Notification, Role::Customer) => Capabilities {
            create: false,
            read: true,
            update: true,
            delete: true,
        },
    }
}

/// Row scope per (entity, role). Applied to list/read queries
/// unconditionally; callers cannot widen visibility by omitting filters.
pub fn scope(kind: EntityKind, role: Role, user_id: Uuid) -> RowScope {
    match (kind, role) {
        (_, Role::Owner | Role::Admin) => RowScope::All,
        (EntityKind::Kennel, Role::Staff | Role::Customer) => RowScope::All,
        (_, Role::Staff) => RowScope::All,
        (_, Role::Customer) => RowScope::Mine(user_id),
    }
}

/// Step-up requirement for mutations of an entity type, if any.
/// User records carry credentials and roles, so administrative edits
/// require a recent MFA verification.
pub fn step_up_for_mutation(kind: EntityKind, role: Role) -> Option<MfaWindow> {
    match (kind, role) {
        (EntityKind::User, Role::Owner | Role::Admin) => Some(MfaWindow::Recent),
        _ => None,
    }
}
