//! Role based access to the desktop shell's navigation tabs.
//!
//! Roles are administrator defined bundles of tab identifiers. Every user either points at a role or, for accounts
//! that predate the roles table, carries a legacy role string that maps onto a fixed tab set. [`AccessControl`]
//! owns both paths: role CRUD, assigning roles to users and resolving the tabs a user may see.
//!
//! Nothing here is cached. Every call goes back to storage so that revoking a role takes effect on the very next
//! permission check.

pub mod legacy;
mod resolve;
mod roles;
pub mod tabs;

use crate::storage::{self, Db};
use serde::Serialize;

pub use legacy::LegacyRole;
pub use tabs::{AllowedTabs, Tab};

/// Represents the different ways an access control operation can fail. None of these are fatal; they are meant to
/// be shown to whoever is administering roles.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    #[error("a role named '{0}' already exists")]
    DuplicateName(String),

    #[error("name must not be empty")]
    InvalidName,

    #[error("no changes given")]
    NoChanges,

    #[error("role {role_id} is assigned to {users} user(s)")]
    RoleInUse { role_id: i64, users: i64 },

    #[error("role {0} not found")]
    RoleNotFound(i64),

    #[error("user {0} not found")]
    UserNotFound(i64),

    #[error("could not create role; {0}")]
    CreateFailed(String),

    #[error("could not update role; {0}")]
    UpdateFailed(String),

    #[error("could not delete role; {0}")]
    DeleteFailed(String),

    #[error("could not assign role; {0}")]
    AssignFailed(String),

    #[error("could not read from storage; {0}")]
    ReadFailed(String),
}

/// The outcome of a mutating call in the shape the shell displays: a flag plus a message it can show verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationResult {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> From<Result<T, AccessError>> for OperationResult {
    fn from(result: Result<T, AccessError>) -> Self {
        match result {
            Ok(_) => OperationResult {
                success: true,
                message: None,
            },
            Err(e) => OperationResult {
                success: false,
                message: Some(e.to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub allowed_tabs: AllowedTabs,
}

impl From<storage::roles::Role> for Role {
    fn from(value: storage::roles::Role) -> Self {
        Role {
            id: value.id,
            name: value.name,
            description: value.description,
            allowed_tabs: AllowedTabs::decode(&value.allowed_tabs),
        }
    }
}

/// A partial role update. Only fields that are `Some` are touched.
#[derive(Debug, Clone, Default)]
pub struct RoleUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub allowed_tabs: Option<AllowedTabs>,
}

impl RoleUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.allowed_tabs.is_none()
    }
}

/// A user as far as access control is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserAssignment {
    pub id: i64,
    pub username: String,
    pub role_id: Option<i64>,

    #[serde(serialize_with = "serialize_legacy_role")]
    pub legacy_role: Option<LegacyRole>,
}

fn serialize_legacy_role<S>(value: &Option<LegacyRole>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match value {
        Some(role) => serializer.serialize_some(role.as_str()),
        None => serializer.serialize_none(),
    }
}

impl From<storage::users::User> for UserAssignment {
    fn from(value: storage::users::User) -> Self {
        UserAssignment {
            id: value.id,
            username: value.username,
            role_id: value.role_id,
            legacy_role: value.role.as_deref().map(LegacyRole::parse),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AccessControl {
    storage: Db,
}

impl AccessControl {
    pub fn new(storage: Db) -> Self {
        AccessControl { storage }
    }
}
