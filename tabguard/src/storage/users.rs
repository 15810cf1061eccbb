use crate::storage::{map_sqlx_error, StorageError};
use futures::TryFutureExt;
use sqlx::{Execute, FromRow, SqliteConnection};

/// The slice of the user record that role resolution cares about.
#[derive(Clone, Debug, Default, PartialEq, Eq, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    /// Legacy role string. Nullable for users created after the roles table existed.
    pub role: Option<String>,
    pub role_id: Option<i64>,
}

#[derive(Clone, Debug, Default)]
pub struct NewUser {
    pub username: String,
    pub role: Option<String>,
}

pub async fn insert(conn: &mut SqliteConnection, user: &NewUser) -> Result<i64, StorageError> {
    let query = sqlx::query("INSERT INTO users (username, role) VALUES (?, ?);")
        .bind(&user.username)
        .bind(&user.role);

    let sql = query.sql();

    let result = query
        .execute(conn)
        .map_err(|e| map_sqlx_error(e, sql))
        .await?;

    Ok(result.last_insert_rowid())
}

pub async fn list(conn: &mut SqliteConnection) -> Result<Vec<User>, StorageError> {
    let query = sqlx::query_as::<_, User>(
        "SELECT id, username, role, role_id FROM users ORDER BY id ASC;",
    );

    let sql = query.sql();

    query
        .fetch_all(conn)
        .map_err(|e| map_sqlx_error(e, sql))
        .await
}

/// Users that have never been given an entry in the roles table.
pub async fn list_unassigned(conn: &mut SqliteConnection) -> Result<Vec<User>, StorageError> {
    let query = sqlx::query_as::<_, User>(
        "SELECT id, username, role, role_id FROM users WHERE role_id IS NULL ORDER BY id ASC;",
    );

    let sql = query.sql();

    query
        .fetch_all(conn)
        .map_err(|e| map_sqlx_error(e, sql))
        .await
}

pub async fn get(conn: &mut SqliteConnection, id: i64) -> Result<User, StorageError> {
    let query =
        sqlx::query_as::<_, User>("SELECT id, username, role, role_id FROM users WHERE id = ?;")
            .bind(id);

    let sql = query.sql();

    query
        .fetch_one(conn)
        .map_err(|e| map_sqlx_error(e, sql))
        .await
}

/// Points the user at a role and mirrors that role's name into the legacy column in the same statement.
pub async fn update_role(
    conn: &mut SqliteConnection,
    id: i64,
    role_id: i64,
    legacy_role: &str,
) -> Result<(), StorageError> {
    let query = sqlx::query("UPDATE users SET role_id = ?, role = ? WHERE id = ?;")
        .bind(role_id)
        .bind(legacy_role)
        .bind(id);

    let sql = query.sql();

    let result = query
        .execute(conn)
        .map_err(|e| map_sqlx_error(e, sql))
        .await?;

    if result.rows_affected() == 0 {
        return Err(StorageError::NotFound);
    }

    Ok(())
}

/// Returns how many users currently reference the given role.
pub async fn count_by_role(conn: &mut SqliteConnection, role_id: i64) -> Result<i64, StorageError> {
    let query =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE role_id = ?;").bind(role_id);

    let sql = query.sql();

    query
        .fetch_one(conn)
        .map_err(|e| map_sqlx_error(e, sql))
        .await
}
