use gxcrawler_scanner::RevisionRecord;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("revision build {build} is already stored")]
    Conflict { build: i64 },

    #[error("{field} is not a number: {value:?}")]
    InvalidNumber { field: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, StoreError>;

pub struct Database {
    conn: Connection,
}

/// A revision as read back from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRevision {
    pub build: i64,
    pub date: String,
    pub seconds: i64,
    pub user: String,
    pub comment: String,
    pub name: String,
    pub operation: String,
    pub objects: Vec<StoredObject>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredObject {
    pub object_type: String,
    pub name: String,
    pub guid: String,
    pub entity_id: i64,
    pub operation: String,
}

fn parse_number(field: &'static str, value: &str) -> Result<i64> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|_| StoreError::InvalidNumber {
            field,
            value: value.to_string(),
        })
}

fn is_key_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn revision_from_row(row: &Row<'_>) -> rusqlite::Result<StoredRevision> {
    Ok(StoredRevision {
        build: row.get(0)?,
        date: row.get(1)?,
        seconds: row.get(2)?,
        user: row.get(3)?,
        comment: row.get(4)?,
        name: row.get(5)?,
        operation: row.get(6)?,
        objects: Vec::new(),
    })
}

const REVISION_COLUMNS: &str = "revision_build, revision_date, revision_seconds, revision_user,
     revision_comment, revision_name, revision_operation";

impl Database {
    pub fn drop(path: &Path) -> std::io::Result<()> {
        fs::remove_file(path)
    }
    pub fn exists(path: &Path) -> bool {
        path.exists()
    }
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            ",
        )?;

        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
CREATE TABLE IF NOT EXISTS revision (
    revision_build INTEGER PRIMARY KEY,
    revision_date TEXT,
    revision_seconds INTEGER,
    revision_user TEXT,
    revision_comment TEXT,
    revision_name TEXT,
    revision_operation TEXT
);

CREATE TABLE IF NOT EXISTS revision_objects (
    revision_build INTEGER NOT NULL,
    object_type TEXT,
    object_name TEXT,
    object_gu_id TEXT,
    object_entity_id INTEGER,
    object_operation TEXT,
    FOREIGN KEY(revision_build) REFERENCES revision(revision_build)
);

CREATE INDEX IF NOT EXISTS idx_revision_objects_build ON revision_objects(revision_build);
            ",
        )?;
        Ok(())
    }

    /// Store a revision and its objects in one transaction.
    ///
    /// Numeric columns are coerced before anything is written, so a bad
    /// value leaves the store untouched.
    pub fn insert_revision(&mut self, record: &RevisionRecord) -> Result<()> {
        let build = parse_number("build", &record.build)?;
        let seconds = parse_number("seconds", &record.seconds)?;
        let entity_ids = record
            .objects
            .iter()
            .map(|o| parse_number("entity_id", &o.entity_id))
            .collect::<Result<Vec<_>>>()?;

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO revision (revision_build, revision_date, revision_seconds, revision_user,
                                   revision_comment, revision_name, revision_operation)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                build,
                record.date,
                seconds,
                record.user,
                record.comment,
                record.name,
                record.operation
            ],
        )
        .map_err(|e| {
            if is_key_violation(&e) {
                StoreError::Conflict { build }
            } else {
                StoreError::Sqlite(e)
            }
        })?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO revision_objects (revision_build, object_type, object_name,
                                               object_gu_id, object_entity_id, object_operation)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for (object, entity_id) in record.objects.iter().zip(entity_ids) {
                stmt.execute(params![
                    build,
                    object.object_type,
                    object.name,
                    object.guid,
                    entity_id,
                    object.operation
                ])?;
            }
        }

        tx.commit()?;
        debug!("Stored revision {} with {} objects", build, record.objects.len());
        Ok(())
    }

    pub fn get_revision(&self, build: i64) -> Result<Option<StoredRevision>> {
        let revision = self
            .conn
            .query_row(
                &format!("SELECT {} FROM revision WHERE revision_build = ?1", REVISION_COLUMNS),
                params![build],
                revision_from_row,
            )
            .optional()?;

        match revision {
            Some(mut revision) => {
                revision.objects = self.get_revision_objects(build)?;
                Ok(Some(revision))
            }
            None => Ok(None),
        }
    }

    /// Objects of one revision in insertion order.
    pub fn get_revision_objects(&self, build: i64) -> Result<Vec<StoredObject>> {
        let mut stmt = self.conn.prepare(
            "SELECT object_type, object_name, object_gu_id, object_entity_id, object_operation
             FROM revision_objects WHERE revision_build = ?1 ORDER BY rowid",
        )?;

        let objects = stmt
            .query_map(params![build], |row| {
                Ok(StoredObject {
                    object_type: row.get(0)?,
                    name: row.get(1)?,
                    guid: row.get(2)?,
                    entity_id: row.get(3)?,
                    operation: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(objects)
    }

    /// Most recent builds first.
    pub fn list_revisions(&self, limit: usize) -> Result<Vec<StoredRevision>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM revision ORDER BY revision_build DESC LIMIT ?1",
            REVISION_COLUMNS
        ))?;

        let mut revisions = stmt
            .query_map(params![limit as i64], revision_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        for revision in &mut revisions {
            revision.objects = self.get_revision_objects(revision.build)?;
        }
        Ok(revisions)
    }

    pub fn count_revisions(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM revision", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn count_revision_objects(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM revision_objects", [], |row| row.get(0))?;
        Ok(count)
    }
}

