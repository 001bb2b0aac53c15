/// Key-value persistence for options and saved assignments

mod types;

pub use types::{StorageRow, RESERVED_KEYS, SAVED_ASSIGNMENTS_KEY, SAVED_COURSE_KEY};

use crate::extract::{AssignmentStore, OptionsSnapshot};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use serde_json::Value;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, info};

const SCHEMA_SQL: &str = include_str!("../../../../sql/init_storage.sql");

const UPSERT_SQL: &str = "INSERT INTO storage (key, value, updated_at)
     VALUES (?1, ?2, datetime('now'))
     ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at";

/// Errors from the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A stored value could not be decoded
    #[error("Stored value for {key} is not valid JSON: {message}")]
    Corrupt { key: String, message: String },

    #[error("{key} is written by extraction runs and cannot be set as an option")]
    ReservedKey { key: String },

    #[error("Database lock poisoned")]
    Poisoned,
}

/// SQLite-backed key-value store shared by options and saved assignments.
pub struct Store {
    db: Mutex<Connection>,
}

impl Store {
    /// Opens (or creates) the database at `path` and initializes the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        info!("Opening storage database at {}", path.display());
        Self::init(Connection::open(path)?)
    }

    /// Creates a private in-memory store.
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.db.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Returns every persisted option; run-managed keys are excluded.
    pub fn options(&self) -> Result<OptionsSnapshot, StoreError> {
        self.rows()?
            .into_iter()
            .filter(|row| !RESERVED_KEYS.contains(&row.key.as_str()))
            .map(|row| decode(&row.key, &row.value).map(|value| (row.key, value)))
            .collect()
    }

    /// Returns all raw rows, ordered by key.
    pub fn rows(&self) -> Result<Vec<StorageRow>, StoreError> {
        let db = self.lock()?;
        let mut stmt = db.prepare("SELECT key, value, updated_at FROM storage ORDER BY key")?;

        let rows = stmt.query_map([], |row| {
            Ok(StorageRow {
                key: row.get(0)?,
                value: row.get(1)?,
                updated_at: row.get(2)?,
            })
        })?;

        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let db = self.lock()?;
        read_value(&db, key)
    }

    /// Persists a user option.
    pub fn set_option(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        if RESERVED_KEYS.contains(&key) {
            return Err(StoreError::ReservedKey {
                key: key.to_string(),
            });
        }
        let db = self.lock()?;
        db.execute(UPSERT_SQL, (key, value.to_string()))?;
        debug!(key, "Stored option");
        Ok(())
    }

    /// Removes a user option so its default applies again. Returns true if it existed.
    pub fn remove_option(&self, key: &str) -> Result<bool, StoreError> {
        if RESERVED_KEYS.contains(&key) {
            return Err(StoreError::ReservedKey {
                key: key.to_string(),
            });
        }
        let db = self.lock()?;
        let removed = db.execute("DELETE FROM storage WHERE key = ?1", [key])?;
        Ok(removed > 0)
    }

    /// Loads the saved assignments and most recent course, empty if never written.
    pub fn load_assignments(&self) -> Result<AssignmentStore, StoreError> {
        let db = self.lock()?;
        read_assignments(&db)
    }

    /// Writes the saved assignments and most recent course in one transaction.
    pub fn write_assignments(&self, store: &AssignmentStore) -> Result<(), StoreError> {
        let mut db = self.lock()?;
        let tx = db.transaction()?;
        write_assignments(&tx, store)?;
        tx.commit()?;
        Ok(())
    }

    /// Applies `update` to the saved assignments as one atomic read-modify-write.
    ///
    /// The connection stays locked and an immediate transaction stays open
    /// until `update` returns, so concurrent runs cannot drop each other's
    /// courses. Nothing is written if `update` fails or leaves the store
    /// unchanged.
    pub fn update_assignments<T, E>(
        &self,
        update: impl FnOnce(&mut AssignmentStore) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let mut db = self.lock()?;
        let tx = db
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StoreError::from)?;

        let before = read_assignments(&tx)?;
        let mut saved = before.clone();
        let result = update(&mut saved)?;

        if saved != before {
            write_assignments(&tx, &saved)?;
        }
        tx.commit().map_err(StoreError::from)?;

        Ok(result)
    }

    /// Removes all saved assignments and the saved course marker.
    pub fn clear_saved_assignments(&self) -> Result<(), StoreError> {
        let db = self.lock()?;
        db.execute(
            "DELETE FROM storage WHERE key IN (?1, ?2)",
            (SAVED_ASSIGNMENTS_KEY, SAVED_COURSE_KEY),
        )?;
        info!("Cleared saved assignments");
        Ok(())
    }
}

fn read_assignments(db: &Connection) -> Result<AssignmentStore, StoreError> {
    let assignments = match read_value(db, SAVED_ASSIGNMENTS_KEY)? {
        Some(value) => serde_json::from_value(value).map_err(|e| StoreError::Corrupt {
            key: SAVED_ASSIGNMENTS_KEY.to_string(),
            message: e.to_string(),
        })?,
        None => Default::default(),
    };
    let saved_course = match read_value(db, SAVED_COURSE_KEY)? {
        Some(Value::String(course)) => course,
        _ => String::new(),
    };

    Ok(AssignmentStore {
        assignments,
        saved_course,
    })
}

fn write_assignments(db: &Connection, store: &AssignmentStore) -> Result<(), StoreError> {
    let assignments =
        serde_json::to_string(&store.assignments).map_err(|e| StoreError::Corrupt {
            key: SAVED_ASSIGNMENTS_KEY.to_string(),
            message: e.to_string(),
        })?;
    let saved_course = Value::from(store.saved_course.as_str()).to_string();

    db.execute(UPSERT_SQL, (SAVED_ASSIGNMENTS_KEY, assignments))?;
    db.execute(UPSERT_SQL, (SAVED_COURSE_KEY, saved_course))?;

    info!(
        courses = store.assignments.len(),
        saved_course = %store.saved_course,
        "Wrote saved assignments"
    );
    Ok(())
}

fn read_value(db: &Connection, key: &str) -> Result<Option<Value>, StoreError> {
    let raw: Option<String> = db
        .query_row("SELECT value FROM storage WHERE key = ?1", [key], |row| {
            row.get(0)
        })
        .optional()?;

    raw.map(|raw| decode(key, &raw)).transpose()
}

fn decode(key: &str, raw: &str) -> Result<Value, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::Corrupt {
        key: key.to_string(),
        message: e.to_string(),
    })
}
