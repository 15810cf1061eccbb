use crate::storage::{map_sqlx_error, StorageError};
use futures::TryFutureExt;
use sqlx::{Execute, FromRow, QueryBuilder, Sqlite, SqliteConnection};

#[derive(Clone, Debug, Default, PartialEq, Eq, FromRow)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub description: String,
    /// JSON encoded array; decoding is left to the caller.
    pub allowed_tabs: String,
}

#[derive(Clone, Debug)]
pub struct NewRole {
    pub name: String,
    pub description: String,
    /// Must be a JSON array.
    pub allowed_tabs: String,
}

impl Default for NewRole {
    fn default() -> Self {
        NewRole {
            name: String::new(),
            description: String::new(),
            allowed_tabs: "[]".into(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct UpdatableFields {
    pub name: Option<String>,
    pub description: Option<String>,
    pub allowed_tabs: Option<String>,
}

/// Inserts a role and returns the id sqlite assigned to it.
pub async fn insert(conn: &mut SqliteConnection, role: &NewRole) -> Result<i64, StorageError> {
    let query =
        sqlx::query("INSERT INTO roles (name, description, allowed_tabs) VALUES (?, ?, ?);")
            .bind(&role.name)
            .bind(&role.description)
            .bind(&role.allowed_tabs);

    let sql = query.sql();

    let result = query
        .execute(conn)
        .map_err(|e| map_sqlx_error(e, sql))
        .await?;

    Ok(result.last_insert_rowid())
}

pub async fn list(conn: &mut SqliteConnection) -> Result<Vec<Role>, StorageError> {
    let query = sqlx::query_as::<_, Role>(
        "SELECT id, name, description, allowed_tabs FROM roles ORDER BY name ASC;",
    );

    let sql = query.sql();

    query
        .fetch_all(conn)
        .map_err(|e| map_sqlx_error(e, sql))
        .await
}

pub async fn get(conn: &mut SqliteConnection, id: i64) -> Result<Role, StorageError> {
    let query = sqlx::query_as::<_, Role>(
        "SELECT id, name, description, allowed_tabs FROM roles WHERE id = ?;",
    )
    .bind(id);

    let sql = query.sql();

    query
        .fetch_one(conn)
        .map_err(|e| map_sqlx_error(e, sql))
        .await
}

pub async fn get_by_name(conn: &mut SqliteConnection, name: &str) -> Result<Role, StorageError> {
    let query = sqlx::query_as::<_, Role>(
        "SELECT id, name, description, allowed_tabs FROM roles WHERE name = ?;",
    )
    .bind(name);

    let sql = query.sql();

    query
        .fetch_one(conn)
        .map_err(|e| map_sqlx_error(e, sql))
        .await
}

pub async fn update(
    conn: &mut SqliteConnection,
    id: i64,
    fields: UpdatableFields,
) -> Result<(), StorageError> {
    let mut update_query: QueryBuilder<Sqlite> = QueryBuilder::new(r#"UPDATE roles SET "#);
    let mut updated_fields_total = 0;

    if let Some(value) = &fields.name {
        if updated_fields_total > 0 {
            update_query.push(", ");
        }
        update_query.push("name = ");
        update_query.push_bind(value);
        updated_fields_total += 1;
    }

    if let Some(value) = &fields.description {
        if updated_fields_total > 0 {
            update_query.push(", ");
        }
        update_query.push("description = ");
        update_query.push_bind(value);
        updated_fields_total += 1;
    }

    if let Some(value) = &fields.allowed_tabs {
        if updated_fields_total > 0 {
            update_query.push(", ");
        }
        update_query.push("allowed_tabs = ");
        update_query.push_bind(value);
        updated_fields_total += 1;
    }

    // If no fields were updated, return an error
    if updated_fields_total == 0 {
        return Err(StorageError::NoFieldsUpdated);
    }

    update_query.push(" WHERE id = ");
    update_query.push_bind(id);
    update_query.push(";");

    let update_query = update_query.build();

    let sql = update_query.sql();

    let result = update_query
        .execute(conn)
        .await
        .map_err(|e| map_sqlx_error(e, sql))?;

    if result.rows_affected() == 0 {
        return Err(StorageError::NotFound);
    }

    Ok(())
}

pub async fn delete(conn: &mut SqliteConnection, id: i64) -> Result<(), StorageError> {
    let query = sqlx::query("DELETE FROM roles WHERE id = ?;").bind(id);

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
