use super::*;
use std::time::Duration;
use tempfile::TempDir;

pub struct TestHarness {
    pub db: Db,
    pub storage_path: String,

    // Removes the database file (and its -wal/-shm siblings) once the harness drops.
    _dir: TempDir,
}

impl TestHarness {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("could not create temp dir for test database");
        let storage_path = dir
            .path()
            .join("tabguard_tests_storage.db")
            .to_string_lossy()
            .to_string();

        let db = Db::new(&storage_path, Duration::from_secs(5))
            .await
            .expect("could not open test database");

        Self {
            db,
            storage_path,
            _dir: dir,
        }
    }
}

impl Deref for TestHarness {
    type Target = Db;

    fn deref(&self) -> &Self::Target {
        &self.db
    }
}

#[tokio::test]
/// Deleting a role out from under a user is refused by the schema itself.
async fn role_delete_blocked_by_foreign_key() {
    let harness = TestHarness::new().await;
    let mut conn = harness.write_conn().await.unwrap();

    let role_id = roles::insert(
        &mut conn,
        &roles::NewRole {
            name: "operators".into(),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let user_id = users::insert(
        &mut conn,
        &users::NewUser {
            username: "melnyk".into(),
            role: None,
        },
    )
    .await
    .unwrap();

    users::update_role(&mut conn, user_id, role_id, "operators")
        .await
        .unwrap();

    assert_eq!(
        roles::delete(&mut conn, role_id).await,
        Err(StorageError::ForeignKey)
    );
}

#[tokio::test]
/// Reopening an existing database does not re-run or break migrations.
async fn reopen_existing_database() {
    let harness = TestHarness::new().await;

    {
        let mut conn = harness.write_conn().await.unwrap();
        roles::insert(
            &mut conn,
            &roles::NewRole {
                name: "operators".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    }

    let reopened = Db::new(&harness.storage_path, Duration::from_secs(5))
        .await
        .unwrap();
    let mut conn = reopened.read_conn().await.unwrap();

    let roles = roles::list(&mut conn).await.unwrap();
    assert_eq!(roles.len(), 1);
    assert_eq!(roles[0].name, "operators");
    assert_eq!(roles[0].description, "");
    assert_eq!(roles[0].allowed_tabs, "[]");
}

#[tokio::test]
/// Writes made inside a transaction disappear when it is rolled back.
async fn transaction_rollback() {
    let harness = TestHarness::new().await;

    {
        let mut tx = harness.open_tx().await.unwrap();
        roles::insert(
            &mut tx,
            &roles::NewRole {
                name: "operators".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        tx.rollback().await.unwrap();
    }

    let mut conn = harness.read_conn().await.unwrap();
    assert!(roles::list(&mut conn).await.unwrap().is_empty());
}
