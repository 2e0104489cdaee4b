//! Selection store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist selection sessions keyed by `(id, owner_id)`.
//! - Provide genuine compare-and-swap writes on the `version` token.
//! - Provide atomic one-shot consumption and TTL reaping.
//!
//! # Invariants
//! - Write paths call `Selection::validate()` before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Owner-scoped lookups treat a foreign owner exactly like a missing id.

use crate::model::selection::{Mode, OwnerId, Selection, SelectionId};
use crate::repo::{ensure_connection_ready, RepoError, RepoResult};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

const SELECTION_COLUMNS: &str = "id,
    owner_id,
    mode,
    filter_json,
    include_ids,
    exclude_ids,
    version,
    created_at,
    expires_at";

const REQUIRED_COLUMNS: &[&str] = &[
    "id",
    "owner_id",
    "mode",
    "filter_json",
    "include_ids",
    "exclude_ids",
    "version",
    "created_at",
    "expires_at",
];

/// Store interface for selection sessions.
pub trait SelectionRepository {
    /// Persists a freshly created selection.
    fn insert_selection(&self, selection: &Selection) -> RepoResult<SelectionId>;
    /// Loads one selection scoped to its owner. Foreign owners see `None`.
    fn get_selection(&self, id: SelectionId, owner_id: OwnerId) -> RepoResult<Option<Selection>>;
    /// Compare-and-swap write gated on `selection.version`; returns the new
    /// stored version. Fails with `VersionConflict` when a concurrent writer
    /// won, `NotFound` when the row is gone.
    fn update_selection(&self, selection: &Selection) -> RepoResult<i64>;
    /// Atomically deletes and returns the selection. `None` means missing,
    /// foreign, or already consumed; callers cannot tell these apart.
    fn consume_selection(
        &self,
        id: SelectionId,
        owner_id: OwnerId,
    ) -> RepoResult<Option<Selection>>;
    /// Deletes every selection with `expires_at <= now_ms`. Idempotent.
    fn delete_expired(&self, now_ms: i64) -> RepoResult<usize>;
}

/// SQLite-backed selection store.
pub struct SqliteSelectionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSelectionRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, "selections", REQUIRED_COLUMNS)?;
        Ok(Self { conn })
    }
}

impl SelectionRepository for SqliteSelectionRepository<'_> {
    fn insert_selection(&self, selection: &Selection) -> RepoResult<SelectionId> {
        selection.validate()?;

        self.conn.execute(
            "INSERT INTO selections (
                id,
                owner_id,
                mode,
                filter_json,
                include_ids,
                exclude_ids,
                version,
                created_at,
                expires_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                selection.id.to_string(),
                selection.owner_id.to_string(),
                selection.mode.as_str(),
                encode_json(&selection.filter, "filter_json")?,
                encode_json(&selection.include_ids, "include_ids")?,
                encode_json(&selection.exclude_ids, "exclude_ids")?,
                selection.version,
                selection.created_at,
                selection.expires_at,
            ],
        )?;

        Ok(selection.id)
    }

    fn get_selection(&self, id: SelectionId, owner_id: OwnerId) -> RepoResult<Option<Selection>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SELECTION_COLUMNS}
             FROM selections
             WHERE id = ?1 AND owner_id = ?2;"
        ))?;

        let mut rows = stmt.query(params![id.to_string(), owner_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_selection_row(row)?));
        }

        Ok(None)
    }

    fn update_selection(&self, selection: &Selection) -> RepoResult<i64> {
        selection.validate()?;

        let expected_version = selection.version;
        let new_version = expected_version + 1;

        // The WHERE clause re-checks the loaded version so a lost race
        // surfaces as zero affected rows instead of a silent overwrite.
        let changed = self.conn.execute(
            "UPDATE selections
             SET
                mode = ?1,
                include_ids = ?2,
                exclude_ids = ?3,
                version = ?4
             WHERE id = ?5
               AND owner_id = ?6
               AND version = ?7;",
            params![
                selection.mode.as_str(),
                encode_json(&selection.include_ids, "include_ids")?,
                encode_json(&selection.exclude_ids, "exclude_ids")?,
                new_version,
                selection.id.to_string(),
                selection.owner_id.to_string(),
                expected_version,
            ],
        )?;

        if changed == 0 {
            let exists: i64 = self.conn.query_row(
                "SELECT EXISTS(
                    SELECT 1
                    FROM selections
                    WHERE id = ?1 AND owner_id = ?2
                );",
                params![selection.id.to_string(), selection.owner_id.to_string()],
                |row| row.get(0),
            )?;
            if exists == 1 {
                return Err(RepoError::VersionConflict {
                    id: selection.id,
                    expected_version,
                });
            }
            return Err(RepoError::NotFound(selection.id));
        }

        Ok(new_version)
    }

    fn consume_selection(
        &self,
        id: SelectionId,
        owner_id: OwnerId,
    ) -> RepoResult<Option<Selection>> {
        // Single-statement delete-and-return: the first caller gets the row,
        // every later caller observes the terminated state as `None`.
        let mut stmt = self.conn.prepare(&format!(
            "DELETE FROM selections
             WHERE id = ?1 AND owner_id = ?2
             RETURNING {SELECTION_COLUMNS};"
        ))?;

        let mut rows = stmt.query(params![id.to_string(), owner_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_selection_row(row)?));
        }

        Ok(None)
    }

    fn delete_expired(&self, now_ms: i64) -> RepoResult<usize> {
        let removed = self
            .conn
            .execute("DELETE FROM selections WHERE expires_at <= ?1;", [now_ms])?;
        Ok(removed)
    }
}

fn parse_selection_row(row: &Row<'_>) -> RepoResult<Selection> {
    let id = parse_uuid(&row.get::<_, String>("id")?, "selections.id")?;
    let owner_id = parse_uuid(&row.get::<_, String>("owner_id")?, "selections.owner_id")?;

    let mode_text: String = row.get("mode")?;
    let mode = Mode::parse(&mode_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid mode `{mode_text}` in selections.mode"))
    })?;

    let selection = Selection {
        id,
        owner_id,
        mode,
        filter: decode_json(&row.get::<_, String>("filter_json")?, "filter_json")?,
        include_ids: decode_json(&row.get::<_, String>("include_ids")?, "include_ids")?,
        exclude_ids: decode_json(&row.get::<_, String>("exclude_ids")?, "exclude_ids")?,
        version: row.get("version")?,
        created_at: row.get("created_at")?,
        expires_at: row.get("expires_at")?,
    };
    selection.validate()?;
    Ok(selection)
}

fn parse_uuid(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

fn encode_json<T: serde::Serialize>(value: &T, column: &str) -> RepoResult<String> {
    serde_json::to_string(value)
        .map_err(|err| RepoError::InvalidData(format!("failed to encode {column}: {err}")))
}

fn decode_json<T: serde::de::DeserializeOwned>(value: &str, column: &str) -> RepoResult<T> {
    serde_json::from_str(value).map_err(|err| {
        RepoError::InvalidData(format!("invalid JSON `{value}` in selections.{column}: {err}"))
    })
}
