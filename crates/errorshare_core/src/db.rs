use crate::id::Name;
use parking_lot::Mutex;
use rusqlite::{Connection, ErrorCode, params};
use rusqlite_migration::{M, Migrations};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};
use tokio::task::spawn_blocking;

static MIGRATIONS: LazyLock<Migrations> =
    LazyLock::new(|| Migrations::new(vec![M::up(include_str!("migrations/0001-initial.sql"))]));

/// Database related errors.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("constraint violated: {0}")]
    Conflict(rusqlite::Error),
    #[error("database unavailable: {0}")]
    Connection(rusqlite::Error),
    #[error("sqlite error: {0}")]
    Sqlite(rusqlite::Error),
    #[error("migrations error: {0}")]
    Migration(#[from] rusqlite_migration::Error),
    #[error("failed to (de)serialize parameters: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("item not found")]
    NotFound,
    #[error("join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl Error {
    /// Short, stable label of the error class for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Conflict(_) => "conflict",
            Error::Connection(_) => "connection",
            Error::Sqlite(_) => "sqlite",
            Error::Migration(_) => "migration",
            Error::Serialization(_) => "serialization",
            Error::NotFound => "not-found",
            Error::Join(_) => "join",
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        let code = match &err {
            rusqlite::Error::QueryReturnedNoRows => return Error::NotFound,
            rusqlite::Error::SqliteFailure(failure, _) => failure.code,
            _ => return Error::Sqlite(err),
        };

        match code {
            ErrorCode::ConstraintViolation => Error::Conflict(err),
            ErrorCode::DatabaseBusy
            | ErrorCode::DatabaseLocked
            | ErrorCode::CannotOpen
            | ErrorCode::SystemIoFailure
            | ErrorCode::DiskFull
            | ErrorCode::ReadOnly => Error::Connection(err),
            _ => Error::Sqlite(err),
        }
    }
}

/// Database opening modes
#[derive(Debug)]
pub enum Open {
    /// Open in-memory database that is wiped after reload
    Memory,
    /// Open database from given path
    Path(PathBuf),
}

/// A shared error page configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    /// Public identifier
    pub name: Name,
    /// Caller supplied parameter document
    pub params: Map<String, Value>,
}

/// A stored item as shown in listings.
#[derive(Debug)]
pub struct ListEntry {
    /// Public identifier
    pub name: String,
    /// Creation time in UTC as recorded by SQLite
    pub created: String,
    /// Size of the serialized parameter document in bytes
    pub size: i64,
}

/// Store of shared items.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Create new database with the given `method`.
    pub fn new(method: Open) -> Result<Self, Error> {
        tracing::debug!("opening {method:?}");

        let mut conn = match method {
            Open::Memory => Connection::open_in_memory()?,
            Open::Path(path) => Connection::open(path)?,
        };

        MIGRATIONS.to_latest(&mut conn)?;

        let conn = Arc::new(Mutex::new(conn));

        Ok(Self { conn })
    }

    /// Insert `item`. The write happens in a transaction that is rolled back if anything fails
    /// before the commit, a name collision included.
    pub async fn insert(&self, item: &Item) -> Result<(), Error> {
        let conn = self.conn.clone();
        let name = item.name.to_string();
        let document = serde_json::to_string(&item.params)?;

        spawn_blocking(move || {
            let mut conn = conn.lock();
            let tx = conn.transaction()?;

            tx.execute(
                "INSERT INTO items (name, params) VALUES (?1, ?2)",
                params![name, document],
            )?;

            tx.commit()
        })
        .await??;

        Ok(())
    }

    /// Get the item stored under `name`.
    pub async fn get(&self, name: Name) -> Result<Item, Error> {
        let conn = self.conn.clone();
        let key = name.to_string();

        let document: String = spawn_blocking(move || {
            conn.lock().query_row(
                "SELECT params FROM items WHERE name=?1",
                params![key],
                |row| row.get(0),
            )
        })
        .await??;

        let params = serde_json::from_str(&document)?;

        Ok(Item { name, params })
    }

    /// List all items, oldest first.
    pub async fn list(&self) -> Result<Vec<ListEntry>, Error> {
        let conn = self.conn.clone();

        let entries = spawn_blocking(move || {
            conn.lock()
                .prepare("SELECT name, created, length(params) FROM items ORDER BY id")?
                .query_map([], |row| {
                    Ok(ListEntry {
                        name: row.get(0)?,
                        created: row.get(1)?,
                        size: row.get(2)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()
        })
        .await??;

        Ok(entries)
    }

    /// Delete all items with the given `names` and return the number of deleted rows.
    pub async fn delete_many(&self, names: Vec<Name>) -> Result<usize, Error> {
        let conn = self.conn.clone();

        let affected = spawn_blocking(move || {
            let mut conn = conn.lock();
            let tx = conn.transaction()?;
            let mut affected = 0;

            {
                let mut stmt = tx.prepare("DELETE FROM items WHERE name=?1")?;

                for name in &names {
                    affected += stmt.execute(params![name.as_str()])?;
                }
            }

            tx.commit()?;

            Ok::<_, rusqlite::Error>(affected)
        })
        .await??;

        Ok(affected)
    }
}
