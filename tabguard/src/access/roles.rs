use super::{AccessControl, AccessError, AllowedTabs, Role, RoleUpdate, Tab};
use crate::storage::{self, StorageError};
use tracing::{debug, error, instrument};

/// Roles every installation starts with. The names line up with the two legacy role strings so that legacy users
/// can be migrated onto them.
fn default_roles() -> Vec<storage::roles::NewRole> {
    let admin_tabs = AllowedTabs::from([
        Tab::Manager,
        Tab::Backups,
        Tab::Reports,
        Tab::Tables,
        Tab::ImportUsers,
        Tab::Shtatni,
        Tab::Instructions,
        Tab::Admin,
    ]);

    let user_tabs = AllowedTabs::from([Tab::Manager, Tab::Reports, Tab::Tables, Tab::Instructions]);

    vec![
        storage::roles::NewRole {
            name: "admin".into(),
            description: "Full access".into(),
            allowed_tabs: admin_tabs.encode(),
        },
        storage::roles::NewRole {
            name: "user".into(),
            description: "Limited access".into(),
            allowed_tabs: user_tabs.encode(),
        },
    ]
}

impl AccessControl {
    /// All roles sorted by name. A role whose stored tabs are corrupt is listed with no tabs rather than failing
    /// the listing.
    #[instrument(skip(self))]
    pub async fn list_roles(&self) -> Result<Vec<Role>, AccessError> {
        let mut conn = self
            .storage
            .read_conn()
            .await
            .map_err(|e| AccessError::ReadFailed(e.to_string()))?;

        let roles = storage::roles::list(&mut conn)
            .await
            .map_err(|e| AccessError::ReadFailed(e.to_string()))?;

        Ok(roles.into_iter().map(Role::from).collect())
    }

    #[instrument(skip(self))]
    pub async fn get_role(&self, id: i64) -> Result<Role, AccessError> {
        let mut conn = self
            .storage
            .read_conn()
            .await
            .map_err(|e| AccessError::ReadFailed(e.to_string()))?;

        match storage::roles::get(&mut conn, id).await {
            Ok(role) => Ok(role.into()),
            Err(StorageError::NotFound) => Err(AccessError::RoleNotFound(id)),
            Err(e) => Err(AccessError::ReadFailed(e.to_string())),
        }
    }

    /// Creates a role and returns its id. The name is trimmed before it is stored or compared.
    #[instrument(skip(self, allowed_tabs))]
    pub async fn create_role(
        &self,
        name: &str,
        description: Option<&str>,
        allowed_tabs: Option<AllowedTabs>,
    ) -> Result<i64, AccessError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AccessError::InvalidName);
        }

        let new_role = storage::roles::NewRole {
            name: name.to_string(),
            description: description.unwrap_or_default().to_string(),
            allowed_tabs: allowed_tabs.unwrap_or_default().encode(),
        };

        let mut conn = self
            .storage
            .write_conn()
            .await
            .map_err(|e| AccessError::CreateFailed(e.to_string()))?;

        match storage::roles::insert(&mut conn, &new_role).await {
            Ok(id) => {
                debug!(role_id = id, role_name = name, "Created role");
                Ok(id)
            }
            Err(StorageError::Exists) => Err(AccessError::DuplicateName(name.to_string())),
            Err(e) => {
                error!(error = %e, role_name = name, "Could not insert role");
                Err(AccessError::CreateFailed(e.to_string()))
            }
        }
    }

    /// Applies a partial update. A name that trims down to nothing is ignored rather than written; an update that
    /// names no fields at all is refused with [`AccessError::NoChanges`].
    #[instrument(skip(self, update))]
    pub async fn update_role(&self, id: i64, update: RoleUpdate) -> Result<(), AccessError> {
        if update.is_empty() {
            return Err(AccessError::NoChanges);
        }

        let name = update
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string);

        let fields = storage::roles::UpdatableFields {
            name: name.clone(),
            description: update.description,
            allowed_tabs: update.allowed_tabs.map(|tabs| tabs.encode()),
        };

        let mut conn = self
            .storage
            .write_conn()
            .await
            .map_err(|e| AccessError::UpdateFailed(e.to_string()))?;

        match storage::roles::update(&mut conn, id, fields).await {
            Ok(_) => {
                debug!(role_id = id, "Updated role");
                Ok(())
            }
            // Only a blank name was given; there is nothing to write but the role still has to exist.
            Err(StorageError::NoFieldsUpdated) => match storage::roles::get(&mut conn, id).await {
                Ok(_) => Ok(()),
                Err(StorageError::NotFound) => Err(AccessError::RoleNotFound(id)),
                Err(e) => Err(AccessError::UpdateFailed(e.to_string())),
            },
            Err(StorageError::NotFound) => Err(AccessError::RoleNotFound(id)),
            Err(StorageError::Exists) => Err(AccessError::DuplicateName(name.unwrap_or_default())),
            Err(e) => {
                error!(error = %e, role_id = id, "Could not update role");
                Err(AccessError::UpdateFailed(e.to_string()))
            }
        }
    }

    /// Deletes a role nobody is using.
    #[instrument(skip(self))]
    pub async fn delete_role(&self, id: i64) -> Result<(), AccessError> {
        // The write pool holds a single connection, so no other writer can assign this role between the usage
        // check and the delete.
        let mut conn = self
            .storage
            .write_conn()
            .await
            .map_err(|e| AccessError::DeleteFailed(e.to_string()))?;

        let users = storage::users::count_by_role(&mut conn, id)
            .await
            .map_err(|e| AccessError::DeleteFailed(e.to_string()))?;

        if users > 0 {
            return Err(AccessError::RoleInUse { role_id: id, users });
        }

        match storage::roles::delete(&mut conn, id).await {
            Ok(_) => {
                debug!(role_id = id, "Deleted role");
                Ok(())
            }
            Err(StorageError::NotFound) => Err(AccessError::RoleNotFound(id)),
            Err(StorageError::ForeignKey) => Err(AccessError::RoleInUse { role_id: id, users }),
            Err(e) => {
                error!(error = %e, role_id = id, "Could not delete role");
                Err(AccessError::DeleteFailed(e.to_string()))
            }
        }
    }

    /// Creates the built-in `admin` and `user` roles if they are missing and returns how many were created. Safe
    /// to call on every startup; roles that already exist are left as the administrator last edited them.
    #[instrument(skip(self))]
    pub async fn ensure_default_roles(&self) -> Result<usize, AccessError> {
        let mut conn = self
            .storage
            .write_conn()
            .await
            .map_err(|e| AccessError::CreateFailed(e.to_string()))?;

        let mut created = 0;

        for role in default_roles() {
            match storage::roles::insert(&mut conn, &role).await {
                Ok(id) => {
                    debug!(role_id = id, role_name = %role.name, "Created default role");
                    created += 1;
                }
                Err(StorageError::Exists) => continue,
                Err(e) => return Err(AccessError::CreateFailed(e.to_string())),
            }
        }

        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::tests::TestHarness;
    use pretty_assertions::assert_eq;

    async fn setup() -> (TestHarness, AccessControl) {
        let harness = TestHarness::new().await;
        let access = AccessControl::new(harness.db.clone());

        (harness, access)
    }

    #[tokio::test]
    async fn create_then_list() {
        let (_harness, access) = setup().await;

        access
            .create_role("Ops", Some("desc"), Some(AllowedTabs::new(["a", "b"])))
            .await
            .unwrap();
        access.create_role("Clerks", None, None).await.unwrap();

        let roles = access.list_roles().await.unwrap();
        assert_eq!(roles.len(), 2);

        assert_eq!(roles[0].name, "Clerks");
        assert_eq!(roles[0].description, "");
        assert!(roles[0].allowed_tabs.is_empty());

        assert_eq!(roles[1].name, "Ops");
        assert_eq!(roles[1].description, "desc");
        assert_eq!(roles[1].allowed_tabs, AllowedTabs::new(["b", "a"]));
    }

    #[tokio::test]
    async fn create_trims_and_rejects_duplicates() {
        let (_harness, access) = setup().await;

        let id = access.create_role("  Ops  ", None, None).await.unwrap();
        assert_eq!(access.get_role(id).await.unwrap().name, "Ops");

        assert_eq!(
            access.create_role("Ops ", None, None).await,
            Err(AccessError::DuplicateName("Ops".into()))
        );

        // Storage compares names exactly.
        assert!(access.create_role("ops", None, None).await.is_ok());

        assert_eq!(
            access.create_role("   ", None, None).await,
            Err(AccessError::InvalidName)
        );
    }

    #[tokio::test]
    async fn update_applies_only_present_fields() {
        let (_harness, access) = setup().await;

        let id = access
            .create_role("Ops", Some("desc"), Some(AllowedTabs::new(["manager"])))
            .await
            .unwrap();

        access
            .update_role(
                id,
                RoleUpdate {
                    allowed_tabs: Some(AllowedTabs::new(["manager", "reports"])),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let role = access.get_role(id).await.unwrap();
        assert_eq!(role.name, "Ops");
        assert_eq!(role.description, "desc");
        assert_eq!(role.allowed_tabs, AllowedTabs::new(["manager", "reports"]));

        access
            .update_role(
                id,
                RoleUpdate {
                    name: Some(" Operations ".into()),
                    description: Some(String::new()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let role = access.get_role(id).await.unwrap();
        assert_eq!(role.name, "Operations");
        assert_eq!(role.description, "");
        assert_eq!(role.allowed_tabs, AllowedTabs::new(["manager", "reports"]));
    }

    #[tokio::test]
    async fn update_guards() {
        let (_harness, access) = setup().await;

        let id = access.create_role("Ops", None, None).await.unwrap();
        access.create_role("Clerks", None, None).await.unwrap();

        assert_eq!(
            access.update_role(id, RoleUpdate::default()).await,
            Err(AccessError::NoChanges)
        );

        // A blank name is dropped, not written and not an error.
        assert_eq!(
            access
                .update_role(
                    id,
                    RoleUpdate {
                        name: Some("   ".into()),
                        ..Default::default()
                    }
                )
                .await,
            Ok(())
        );
        assert_eq!(access.get_role(id).await.unwrap().name, "Ops");

        assert_eq!(
            access
                .update_role(
                    id,
                    RoleUpdate {
                        name: Some("Clerks".into()),
                        ..Default::default()
                    }
                )
                .await,
            Err(AccessError::DuplicateName("Clerks".into()))
        );

        // Renaming a role to its own name is not a collision.
        assert_eq!(
            access
                .update_role(
                    id,
                    RoleUpdate {
                        name: Some("Ops".into()),
                        ..Default::default()
                    }
                )
                .await,
            Ok(())
        );

        assert_eq!(
            access
                .update_role(
                    id + 100,
                    RoleUpdate {
                        description: Some("nobody".into()),
                        ..Default::default()
                    }
                )
                .await,
            Err(AccessError::RoleNotFound(id + 100))
        );
    }

    #[tokio::test]
    async fn delete_unreferenced_role() {
        let (_harness, access) = setup().await;

        let id = access.create_role("Ops", None, None).await.unwrap();
        access.delete_role(id).await.unwrap();

        assert!(access.list_roles().await.unwrap().is_empty());
        assert_eq!(
            access.delete_role(id).await,
            Err(AccessError::RoleNotFound(id))
        );
    }

    #[tokio::test]
    async fn delete_referenced_role_is_refused() {
        let (harness, access) = setup().await;

        let id = access.create_role("Ops", None, None).await.unwrap();
        {
            let mut conn = harness.write_conn().await.unwrap();
            for username in ["bondar", "tkachenko"] {
                let user_id = storage::users::insert(
                    &mut conn,
                    &storage::users::NewUser {
                        username: username.into(),
                        role: None,
                    },
                )
                .await
                .unwrap();
                storage::users::update_role(&mut conn, user_id, id, "Ops")
                    .await
                    .unwrap();
            }
        }

        assert_eq!(
            access.delete_role(id).await,
            Err(AccessError::RoleInUse {
                role_id: id,
                users: 2
            })
        );
        assert_eq!(access.list_roles().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn list_roles_survives_corrupt_tabs() {
        let (harness, access) = setup().await;

        {
            let mut conn = harness.write_conn().await.unwrap();
            for (name, raw) in [("broken", "{oops"), ("null", "null"), ("fine", r#"["x"]"#)] {
                storage::roles::insert(
                    &mut conn,
                    &storage::roles::NewRole {
                        name: name.into(),
                        description: String::new(),
                        allowed_tabs: raw.into(),
                    },
                )
                .await
                .unwrap();
            }
        }

        let roles = access.list_roles().await.unwrap();
        let tabs: Vec<(String, usize)> = roles
            .into_iter()
            .map(|role| (role.name, role.allowed_tabs.len()))
            .collect();

        assert_eq!(
            tabs,
            vec![
                ("broken".to_string(), 0),
                ("fine".to_string(), 1),
                ("null".to_string(), 0)
            ]
        );
    }

    #[tokio::test]
    async fn default_roles_are_seeded_once() {
        let (_harness, access) = setup().await;

        assert_eq!(access.ensure_default_roles().await, Ok(2));
        assert_eq!(access.ensure_default_roles().await, Ok(0));

        let roles = access.list_roles().await.unwrap();
        assert_eq!(roles.len(), 2);
        assert_eq!(roles[0].name, "admin");
        assert_eq!(roles[0].allowed_tabs.len(), 8);
        assert!(roles[0].allowed_tabs.can_access(Tab::Admin));
        assert_eq!(roles[1].name, "user");
        assert_eq!(
            roles[1].allowed_tabs,
            AllowedTabs::from([Tab::Manager, Tab::Reports, Tab::Tables, Tab::Instructions])
        );
    }
}
