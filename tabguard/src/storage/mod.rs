pub mod roles;
pub mod users;

#[cfg(test)]
pub mod tests;

use sqlx::{
    migrate,
    pool::PoolConnection,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    Pool, Sqlite, Transaction,
};
use std::{ops::Deref, str::FromStr, time::Duration};
use tracing::debug;

/// Sqlite Errors are determined by database error code. We map these to the specific code so that
/// when we come back with a database error we can detect which one happened.
/// See the codes here: https://www.sqlite.org/rescode.html
const SQLITE_CONSTRAINT_FOREIGNKEY: &str = "787";
const SQLITE_CONSTRAINT_PRIMARYKEY: &str = "1555";
const SQLITE_CONSTRAINT_UNIQUE: &str = "2067";

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum StorageError {
    #[error("could not establish connection to database; {0}")]
    Connection(String),

    #[error("could not apply database migrations; {0}")]
    Migration(String),

    #[error("requested entity not found")]
    NotFound,

    #[error("entity already exists")]
    Exists,

    #[error("entity is still referenced by another entity")]
    ForeignKey,

    #[error("no fields given to update")]
    NoFieldsUpdated,

    #[error("unexpected storage error occurred; {0}")]
    Unknown(String),
}

/// Classifies a raw sqlx error into the storage error taxonomy. Constraint violations are detected via the
/// extended result code sqlite attaches to the error; anything we don't recognize ends up as
/// [`StorageError::Unknown`] with the offending query attached.
pub fn map_sqlx_error(e: sqlx::Error, query: &str) -> StorageError {
    match e {
        sqlx::Error::RowNotFound => StorageError::NotFound,
        sqlx::Error::Database(database_err) => {
            if let Some(err_code) = database_err.code() {
                match err_code.deref() {
                    SQLITE_CONSTRAINT_PRIMARYKEY | SQLITE_CONSTRAINT_UNIQUE => {
                        StorageError::Exists
                    }
                    SQLITE_CONSTRAINT_FOREIGNKEY => StorageError::ForeignKey,
                    _ => StorageError::Unknown(format!(
                        "error occurred while running query; [{err_code}] {database_err}; query: {query}"
                    )),
                }
            } else {
                StorageError::Unknown(format!(
                    "error occurred while running query; {database_err}; query: {query}"
                ))
            }
        }
        _ => StorageError::Unknown(format!(
            "error occurred while running query; {:#?}; query: {query}",
            e
        )),
    }
}

#[derive(Debug, Clone)]
pub struct Db {
    write_pool: Pool<Sqlite>,
    read_pool: Pool<Sqlite>,
}

impl Db {
    /// Opens (creating if needed) the sqlite database at `path` and brings its schema up to date.
    pub async fn new(path: &str, busy_timeout: Duration) -> Result<Self, StorageError> {
        // We create two different pools of connections. The read pool has many connections and is high concurrency.
        // The write pool is essentially a single connection in which only one write can be made at a time.
        // Not using this paradigm may result in sqlite "database is locked(error: 5)" errors because of the
        // manner in which sqlite handles transactions.
        let connect_options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path))
            .map_err(|e| StorageError::Connection(format!("{:?}", e)))?
            .create_if_missing(true)
            // * journal_mode: Turns on WAL mode which increases concurrency and reliability.
            .journal_mode(SqliteJournalMode::Wal)
            // * synchronous: Only sync to disk at critical junctures; safe because we're in WAL mode.
            .synchronous(SqliteSynchronous::Normal)
            // * foreign_keys: users.role_id must always point at a real role.
            .foreign_keys(true)
            // * busy_timeout: How long a query waits on a locked database before it returns an error.
            .busy_timeout(busy_timeout);

        let write_pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(connect_options.clone())
            .await
            .map_err(|e| StorageError::Connection(format!("{:?}", e)))?;

        migrate!("src/storage/migrations")
            .run(&write_pool)
            .await
            .map_err(|e| StorageError::Migration(e.to_string()))?;

        let read_pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(connect_options)
            .await
            .map_err(|e| StorageError::Connection(format!("{:?}", e)))?;

        debug!(path = path, "Opened database");

        Ok(Db {
            write_pool,
            read_pool,
        })
    }

    pub async fn write_conn(&self) -> Result<PoolConnection<Sqlite>, StorageError> {
        self.write_pool
            .acquire()
            .await
            .map_err(|e| StorageError::Connection(format!("{:?}", e)))
    }

    pub async fn read_conn(&self) -> Result<PoolConnection<Sqlite>, StorageError> {
        self.read_pool
            .acquire()
            .await
            .map_err(|e| StorageError::Connection(format!("{:?}", e)))
    }

    /// Opens a transaction on the write pool. Since the write pool holds a single connection, every write
    /// that happens while the transaction is open waits behind it.
    pub async fn open_tx(&self) -> Result<Transaction<'_, Sqlite>, StorageError> {
        self.write_pool
            .begin()
            .await
            .map_err(|e| StorageError::Connection(format!("{:?}", e)))
    }
}
