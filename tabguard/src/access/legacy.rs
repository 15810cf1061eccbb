use super::tabs::{AllowedTabs, Tab};
use std::str::FromStr;
use strum::EnumString;

/// Tabs granted to a legacy administrator.
pub const LEGACY_ADMIN_TABS: [Tab; 8] = [
    Tab::Manager,
    Tab::Reports,
    Tab::Backups,
    Tab::Tables,
    Tab::ImportUsers,
    Tab::Shtatni,
    Tab::Instructions,
    Tab::Admin,
];

/// Tabs granted to a legacy regular user.
pub const LEGACY_USER_TABS: [Tab; 2] = [Tab::Manager, Tab::Instructions];

/// What a user gets when there is nothing to resolve against.
pub const MINIMAL_TABS: [Tab; 1] = [Tab::Manager];

/// The role string users carried before the roles table existed.
///
/// Only two values were ever handed out. Anything else is kept verbatim in [`LegacyRole::Unknown`] so it can be
/// written back untouched, but it grants nothing beyond the minimal tab set.
#[derive(Debug, Clone, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum LegacyRole {
    Admin,
    User,
    #[strum(default)]
    Unknown(String),
}

impl LegacyRole {
    pub fn parse(raw: &str) -> Self {
        Self::from_str(raw).unwrap_or_else(|_| LegacyRole::Unknown(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        match self {
            LegacyRole::Admin => "admin",
            LegacyRole::User => "user",
            LegacyRole::Unknown(raw) => raw,
        }
    }
}

/// Tabs for a user without a role assignment, decided by their legacy role alone.
pub fn fallback_tabs(legacy_role: Option<&LegacyRole>) -> AllowedTabs {
    match legacy_role {
        Some(LegacyRole::Admin) => LEGACY_ADMIN_TABS.into(),
        Some(LegacyRole::User) => LEGACY_USER_TABS.into(),
        Some(LegacyRole::Unknown(_)) | None => MINIMAL_TABS.into(),
    }
}
