//! Repository Store - SQLite persistence for tracked repositories
//!
//! Each tracked repository is a single row holding its identity, canonical URL,
//! the cached latest-release snapshot and the seen flag. Uniqueness of the
//! owner/name pair and of the URL is enforced by the database itself, and every
//! mutation runs in its own `BEGIN IMMEDIATE` transaction so concurrent writers
//! (threads or processes) never interleave on a record.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

use crate::error::{Result, TrackerError};
use crate::identity::RepoIdentity;
use crate::model::{ReleaseSnapshot, TrackedRepository};

const SELECT_COLUMNS: &str = r#"
    SELECT id, owner, name, url,
           release_id, release_tag, release_name, release_published_at, release_url,
           seen_by_user
    FROM repositories
"#;

/// Durable record of tracked repositories
pub struct RepoStore {
    conn: Mutex<Connection>,
}

impl RepoStore {
    /// Open or create the store at a specific path
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        let store = Self::with_connection(conn)?;

        info!("Repository store opened at {}", path.display());
        Ok(store)
    }

    /// Open an in-memory store (for testing)
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize()?;
        Ok(store)
    }

    fn initialize(&self) -> Result<()> {
        self.lock().execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS repositories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner TEXT NOT NULL COLLATE NOCASE,
                name TEXT NOT NULL COLLATE NOCASE,
                url TEXT NOT NULL COLLATE NOCASE UNIQUE,
                release_id TEXT,
                release_tag TEXT,
                release_name TEXT,
                release_published_at TEXT,
                release_url TEXT,
                seen_by_user INTEGER NOT NULL DEFAULT 0,
                UNIQUE (owner, name),
                -- a cached release is all or nothing
                CHECK ((release_id IS NULL) = (release_tag IS NULL)),
                CHECK ((release_id IS NULL) = (release_url IS NULL))
            );
            "#,
        )?;

        debug!("Repository store schema initialized");
        Ok(())
    }

    // Every write is its own transaction, so a poisoned connection is still consistent
    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start tracking a repository.
    ///
    /// The new record has no cached release and is not marked as seen.
    pub fn insert(&self, identity: &RepoIdentity, url: &str) -> Result<TrackedRepository> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let name_taken: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM repositories WHERE owner = ?1 AND name = ?2)",
            params![identity.owner, identity.name],
            |row| row.get(0),
        )?;
        if name_taken {
            return Err(TrackerError::DuplicateName(identity.full_name()));
        }

        let url_taken: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM repositories WHERE url = ?1)",
            params![url],
            |row| row.get(0),
        )?;
        if url_taken {
            return Err(TrackerError::DuplicateUrl(url.to_string()));
        }

        tx.execute(
            "INSERT INTO repositories (owner, name, url) VALUES (?1, ?2, ?3)",
            params![identity.owner, identity.name, url],
        )
        .map_err(|e| constraint_error(e, identity, url))?;

        let id = tx.last_insert_rowid();
        let repo = fetch_one(&tx, id)?.ok_or(TrackerError::NotFound(id))?;
        tx.commit()?;

        debug!("Inserted {} with id {}", repo.full_name(), repo.id);
        Ok(repo)
    }

    /// All tracked repositories in creation order
    pub fn list_all(&self) -> Result<Vec<TrackedRepository>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY id ASC"))?;

        let repos = stmt
            .query_map([], row_to_repo)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(repos)
    }

    pub fn get_by_id(&self, id: i64) -> Result<Option<TrackedRepository>> {
        let conn = self.lock();
        Ok(fetch_one(&conn, id)?)
    }

    /// Stop tracking a repository. Returns whether a record was deleted.
    pub fn remove(&self, id: i64) -> Result<bool> {
        let deleted = self
            .lock()
            .execute("DELETE FROM repositories WHERE id = ?1", params![id])?;

        debug!("Removed repository {}: {}", id, deleted > 0);
        Ok(deleted > 0)
    }

    /// Replace the cached release unless it already has the same release id.
    ///
    /// A replacement also clears `seen_by_user` in the same statement. Returns
    /// the record as stored afterwards and whether a write happened.
    pub fn update_release_if_changed(
        &self,
        id: i64,
        release: &ReleaseSnapshot,
    ) -> Result<(TrackedRepository, bool)> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let updated = tx.execute(
            r#"
            UPDATE repositories SET
                release_id = ?2,
                release_tag = ?3,
                release_name = ?4,
                release_published_at = ?5,
                release_url = ?6,
                seen_by_user = 0
            WHERE id = ?1 AND (release_id IS NULL OR release_id <> ?2)
            "#,
            params![
                id,
                release.release_id,
                release.tag,
                release.display_name,
                release.published_at.map(|ts| ts.to_rfc3339()),
                release.release_url,
            ],
        )?;

        let repo = fetch_one(&tx, id)?.ok_or(TrackerError::NotFound(id))?;
        tx.commit()?;

        Ok((repo, updated > 0))
    }

    /// Acknowledge the cached release. Returns whether the record exists.
    pub fn mark_seen(&self, id: i64) -> Result<bool> {
        let updated = self.lock().execute(
            "UPDATE repositories SET seen_by_user = 1 WHERE id = ?1",
            params![id],
        )?;
        Ok(updated > 0)
    }
}

fn fetch_one(conn: &Connection, id: i64) -> rusqlite::Result<Option<TrackedRepository>> {
    conn.query_row(
        &format!("{SELECT_COLUMNS} WHERE id = ?1"),
        params![id],
        row_to_repo,
    )
    .optional()
}

fn row_to_repo(row: &Row<'_>) -> rusqlite::Result<TrackedRepository> {
    let release_id: Option<String> = row.get(4)?;
    let release_tag: Option<String> = row.get(5)?;
    let release_url: Option<String> = row.get(8)?;

    let latest_release = match (release_id, release_tag, release_url) {
        (Some(release_id), Some(tag), Some(release_url)) => Some(ReleaseSnapshot {
            release_id,
            tag,
            display_name: row.get(6)?,
            published_at: row
                .get::<_, Option<String>>(7)?
                .map(|s| parse_timestamp(7, &s))
                .transpose()?,
            release_url,
        }),
        _ => None,
    };

    Ok(TrackedRepository {
        id: row.get(0)?,
        owner: row.get(1)?,
        name: row.get(2)?,
        url: row.get(3)?,
        latest_release,
        seen_by_user: row.get::<_, i32>(9)? != 0,
    })
}

fn parse_timestamp(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Translate a UNIQUE violation raised by SQLite itself into the duplicate kind
fn constraint_error(err: rusqlite::Error, identity: &RepoIdentity, url: &str) -> TrackerError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, Some(message))
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            if message.contains("repositories.url") {
                TrackerError::DuplicateUrl(url.to_string())
            } else {
                TrackerError::DuplicateName(identity.full_name())
            }
        }
        _ => TrackerError::Storage(err),
    }
}
