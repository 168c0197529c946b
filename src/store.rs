// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Durable, append-only snapshot storage.
//!
//! Snapshots are keyed by `(owner, repo)` and ordered by creation time, with
//! the surrogate id breaking ties between snapshots created in the same
//! microsecond. Timestamps are stored as integer microseconds since the Unix
//! epoch so ordering never depends on string collation.

use std::{
    path::Path,
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration
};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::debug;

use crate::{
    error::Error,
    snapshot::{LanguageBreakdown, Snapshot}
};

/// Schema revision recorded in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 1;

const BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS snapshots (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        owner         TEXT    NOT NULL,
        repo          TEXT    NOT NULL,
        commit_sha    TEXT    NOT NULL,
        total_loc     INTEGER NOT NULL,
        total_files   INTEGER NOT NULL,
        created_at_us INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_snapshots_repo
        ON snapshots(owner, repo, created_at_us, id);
    CREATE TABLE IF NOT EXISTS languages (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        snapshot_id INTEGER NOT NULL REFERENCES snapshots(id) ON DELETE CASCADE,
        language    TEXT    NOT NULL,
        lines       INTEGER NOT NULL,
        code        INTEGER NOT NULL,
        comments    INTEGER NOT NULL,
        blanks      INTEGER NOT NULL,
        files       INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_languages_snapshot ON languages(snapshot_id);
";

const SNAPSHOT_COLUMNS: &str =
    "id, owner, repo, commit_sha, total_loc, total_files, created_at_us";

/// Persistence boundary for snapshots.
///
/// Implementations are synchronous; async callers run them on a blocking
/// thread.
pub trait SnapshotStore: Send + Sync {
    /// Persists `snapshot` with all of its language rows atomically and
    /// assigns `snapshot.id`.
    fn save(&self, snapshot: &mut Snapshot) -> Result<i64, Error>;

    /// Most recent snapshot for the repository, if any.
    fn latest(&self, owner: &str, repo: &str) -> Result<Option<Snapshot>, Error>;

    /// Every snapshot for the repository, oldest first.
    fn history(&self, owner: &str, repo: &str) -> Result<Vec<Snapshot>, Error>;
}

/// SQLite-backed [`SnapshotStore`].
pub struct SqliteStore {
    conn: Mutex<Connection>
}

impl SqliteStore {
    /// Opens or creates the database at `path` and applies the schema.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] when SQLite refuses the file and
    /// [`Error::Validation`] when the schema version is unknown.
    pub fn open(path: &Path) -> Result<Self, Error> {
        let conn = Connection::open(path)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!(path = %path.display(), journal_mode = %mode, "opened snapshot store");
        Self::initialize(conn)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self, Error> {
        Self::initialize(Connection::open_in_memory()?)
    }

    fn initialize(conn: Connection) -> Result<Self, Error> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update(None, "synchronous", "FULL")?;
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.execute_batch(SCHEMA)?;
        check_schema_version(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn)
        })
    }

    fn connection(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn check_schema_version(conn: &Connection) -> Result<(), Error> {
    let user_version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if user_version == 0 {
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    } else if user_version != SCHEMA_VERSION {
        return Err(Error::validation(format!(
            "snapshot schema version mismatch: expected {SCHEMA_VERSION}, found {user_version}"
        )));
    }
    Ok(())
}

impl SnapshotStore for SqliteStore {
    fn save(&self, snapshot: &mut Snapshot) -> Result<i64, Error> {
        let total_loc = to_sql_int(snapshot.total_loc, "total_loc")?;
        let total_files = to_sql_int(snapshot.total_files, "total_files")?;
        let created_at_us = snapshot.created_at.timestamp_micros();

        let mut conn = self.connection();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO snapshots (owner, repo, commit_sha, total_loc, total_files, created_at_us)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                snapshot.owner,
                snapshot.repo,
                snapshot.commit_sha,
                total_loc,
                total_files,
                created_at_us
            ]
        )?;
        let id = tx.last_insert_rowid();

        {
            let mut insert = tx.prepare(
                "INSERT INTO languages (snapshot_id, language, lines, code, comments, blanks, files)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
            )?;
            for language in &snapshot.languages {
                insert.execute(params![
                    id,
                    language.language,
                    to_sql_int(language.lines, "lines")?,
                    to_sql_int(language.code, "code")?,
                    to_sql_int(language.comments, "comments")?,
                    to_sql_int(language.blanks, "blanks")?,
                    to_sql_int(language.files, "files")?
                ])?;
            }
        }

        tx.commit()?;
        snapshot.id = Some(id);
        debug!(
            owner = %snapshot.owner,
            repo = %snapshot.repo,
            id,
            languages = snapshot.languages.len(),
            "saved snapshot"
        );
        Ok(id)
    }

    fn latest(&self, owner: &str, repo: &str) -> Result<Option<Snapshot>, Error> {
        let conn = self.connection();
        let row = conn
            .query_row(
                &format!(
                    "SELECT {SNAPSHOT_COLUMNS} FROM snapshots WHERE owner = ?1 AND repo = ?2
                     ORDER BY created_at_us DESC, id DESC LIMIT 1"
                ),
                params![owner, repo],
                snapshot_from_row
            )
            .optional()?;

        match row {
            None => Ok(None),
            Some(mut snapshot) => {
                snapshot.languages = load_languages(&conn, snapshot.id)?;
                Ok(Some(snapshot))
            }
        }
    }

    fn history(&self, owner: &str, repo: &str) -> Result<Vec<Snapshot>, Error> {
        let conn = self.connection();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM snapshots WHERE owner = ?1 AND repo = ?2
             ORDER BY created_at_us ASC, id ASC"
        ))?;
        let mut snapshots = stmt
            .query_map(params![owner, repo], snapshot_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        for snapshot in &mut snapshots {
            snapshot.languages = load_languages(&conn, snapshot.id)?;
        }
        Ok(snapshots)
    }
}

fn snapshot_from_row(row: &Row<'_>) -> rusqlite::Result<Snapshot> {
    let created_at_us: i64 = row.get(6)?;
    let created_at = DateTime::<Utc>::from_timestamp_micros(created_at_us).ok_or_else(|| {
        rusqlite::Error::IntegralValueOutOfRange(6, created_at_us)
    })?;
    Ok(Snapshot {
        id: Some(row.get(0)?),
        owner: row.get(1)?,
        repo: row.get(2)?,
        commit_sha: row.get(3)?,
        total_loc: from_sql_int(row, 4)?,
        total_files: from_sql_int(row, 5)?,
        languages: Vec::new(),
        created_at
    })
}

fn load_languages(conn: &Connection, id: Option<i64>) -> Result<Vec<LanguageBreakdown>, Error> {
    let mut stmt = conn.prepare_cached(
        "SELECT language, lines, code, comments, blanks, files
         FROM languages WHERE snapshot_id = ?1 ORDER BY code DESC, language ASC"
    )?;
    let languages = stmt
        .query_map(params![id], |row| {
            Ok(LanguageBreakdown {
                language: row.get(0)?,
                lines:    from_sql_int(row, 1)?,
                code:     from_sql_int(row, 2)?,
                comments: from_sql_int(row, 3)?,
                blanks:   from_sql_int(row, 4)?,
                files:    from_sql_int(row, 5)?
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(languages)
}

fn to_sql_int(value: u64, field: &str) -> Result<i64, Error> {
    i64::try_from(value)
        .map_err(|_| Error::validation(format!("{field} value {value} exceeds the storable range")))
}

fn from_sql_int(row: &Row<'_>, index: usize) -> rusqlite::Result<u64> {
    let value: i64 = row.get(index)?;
    u64::try_from(value).map_err(|_| rusqlite::Error::IntegralValueOutOfRange(index, value))
}
