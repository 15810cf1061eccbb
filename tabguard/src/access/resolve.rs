use super::{legacy, AccessControl, AccessError, AllowedTabs, LegacyRole, UserAssignment};
use crate::storage::{self, StorageError};
use tracing::{debug, error, instrument, warn};

impl AccessControl {
    /// Resolves the tabs a user may see. Never fails: storage trouble and missing records degrade to an empty set,
    /// and users without a role fall back on their legacy role string.
    ///
    /// Resolution order:
    /// 1. Unknown user: no tabs.
    /// 2. User with a role: exactly that role's tabs (none if the role has since vanished or its tabs are corrupt).
    /// 3. Otherwise the legacy role decides, see [`legacy::fallback_tabs`].
    #[instrument(skip(self))]
    pub async fn get_allowed_tabs(&self, user_id: i64) -> AllowedTabs {
        let mut conn = match self.storage.read_conn().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(error = %e, "Could not open connection to database while resolving tabs");
                return AllowedTabs::default();
            }
        };

        let user = match storage::users::get(&mut conn, user_id).await {
            Ok(user) => user,
            Err(StorageError::NotFound) => {
                debug!("User not found; resolving to no tabs");
                return AllowedTabs::default();
            }
            Err(e) => {
                warn!(error = %e, "Could not read user while resolving tabs");
                return AllowedTabs::default();
            }
        };

        if let Some(role_id) = user.role_id {
            return match storage::roles::get(&mut conn, role_id).await {
                Ok(role) => AllowedTabs::decode(&role.allowed_tabs),
                Err(StorageError::NotFound) => {
                    warn!(role_id, "User references a role that no longer exists");
                    AllowedTabs::default()
                }
                Err(e) => {
                    warn!(error = %e, role_id, "Could not read role while resolving tabs");
                    AllowedTabs::default()
                }
            };
        }

        let legacy_role = user.role.as_deref().map(LegacyRole::parse);
        legacy::fallback_tabs(legacy_role.as_ref())
    }

    /// Points a user at a role and copies the role's name into the legacy role column so that code reading only
    /// the legacy column keeps seeing something sensible.
    ///
    /// The copy is taken at assignment time only; renaming the role later does not touch users already holding it.
    #[instrument(skip(self))]
    pub async fn assign_role(&self, user_id: i64, role_id: i64) -> Result<(), AccessError> {
        let mut conn = self
            .storage
            .write_conn()
            .await
            .map_err(|e| AccessError::AssignFailed(e.to_string()))?;

        let role = match storage::roles::get(&mut conn, role_id).await {
            Ok(role) => role,
            Err(StorageError::NotFound) => return Err(AccessError::RoleNotFound(role_id)),
            Err(e) => return Err(AccessError::AssignFailed(e.to_string())),
        };

        match storage::users::update_role(&mut conn, user_id, role.id, &role.name).await {
            Ok(_) => {
                debug!(role_name = %role.name, "Assigned role to user");
                Ok(())
            }
            Err(StorageError::NotFound) => Err(AccessError::UserNotFound(user_id)),
            Err(StorageError::ForeignKey) => Err(AccessError::RoleNotFound(role_id)),
            Err(e) => {
                error!(error = %e, "Could not assign role to user");
                Err(AccessError::AssignFailed(e.to_string()))
            }
        }
    }

    /// Moves users that only carry a recognized legacy role onto the role of the same name. Returns how many users
    /// were moved.
    ///
    /// Users whose legacy role is missing or unrecognized are left alone and keep resolving to the minimal tab set;
    /// so are users whose matching role does not exist (see [`AccessControl::ensure_default_roles`]).
    #[instrument(skip(self))]
    pub async fn migrate_legacy_users(&self) -> Result<usize, AccessError> {
        let mut tx = self
            .storage
            .open_tx()
            .await
            .map_err(|e| AccessError::AssignFailed(e.to_string()))?;

        let unassigned = storage::users::list_unassigned(&mut tx)
            .await
            .map_err(|e| AccessError::AssignFailed(e.to_string()))?;

        let mut migrated = 0;

        for user in unassigned {
            let legacy_role = match user.role.as_deref().map(LegacyRole::parse) {
                Some(role @ (LegacyRole::Admin | LegacyRole::User)) => role,
                _ => continue,
            };

            let role = match storage::roles::get_by_name(&mut tx, legacy_role.as_str()).await {
                Ok(role) => role,
                Err(StorageError::NotFound) => {
                    warn!(
                        user_id = user.id,
                        legacy_role = legacy_role.as_str(),
                        "No role matches legacy role; leaving user unmigrated"
                    );
                    continue;
                }
                Err(e) => return Err(AccessError::AssignFailed(e.to_string())),
            };

            storage::users::update_role(&mut tx, user.id, role.id, &role.name)
                .await
                .map_err(|e| AccessError::AssignFailed(e.to_string()))?;

            migrated += 1;
        }

        tx.commit()
            .await
            .map_err(|e| AccessError::AssignFailed(e.to_string()))?;

        debug!(migrated, "Migrated legacy users");
        Ok(migrated)
    }

    /// Registers a user, optionally with a legacy role string. Full user management lives elsewhere; this exists so
    /// that accounts can be brought under role management.
    #[instrument(skip(self))]
    pub async fn create_user(
        &self,
        username: &str,
        legacy_role: Option<LegacyRole>,
    ) -> Result<i64, AccessError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AccessError::InvalidName);
        }

        let mut conn = self
            .storage
            .write_conn()
            .await
            .map_err(|e| AccessError::CreateFailed(e.to_string()))?;

        let new_user = storage::users::NewUser {
            username: username.to_string(),
            role: legacy_role.map(|role| role.as_str().to_string()),
        };

        storage::users::insert(&mut conn, &new_user)
            .await
            .map_err(|e| match e {
                StorageError::Exists => {
                    AccessError::CreateFailed(format!("user '{}' already exists", new_user.username))
                }
                _ => AccessError::CreateFailed(e.to_string()),
            })
    }

    pub async fn list_users(&self) -> Result<Vec<UserAssignment>, AccessError> {
        let mut conn = self
            .storage
            .read_conn()
            .await
            .map_err(|e| AccessError::ReadFailed(e.to_string()))?;

        let users = storage::users::list(&mut conn)
            .await
            .map_err(|e| AccessError::ReadFailed(e.to_string()))?;

        Ok(users.into_iter().map(UserAssignment::from).collect())
    }

    pub async fn get_user(&self, user_id: i64) -> Result<UserAssignment, AccessError> {
        let mut conn = self
            .storage
            .read_conn()
            .await
            .map_err(|e| AccessError::ReadFailed(e.to_string()))?;

        match storage::users::get(&mut conn, user_id).await {
            Ok(user) => Ok(user.into()),
            Err(StorageError::NotFound) => Err(AccessError::UserNotFound(user_id)),
            Err(e) => Err(AccessError::ReadFailed(e.to_string())),
        }
    }
}
