//! Turso Embedded / libSQL storage layer (offline mode).
//!
//! The [`Storage`] struct wraps a libSQL database holding the persisted
//! session state of every pipeline run and the rendered-result cache.
//!
//! **Access rules:**
//! - `launch`, `stop`, `select`, `export`, `reset` and the TUI: read-write via [`Storage::open`]
//! - `status`: read-only via [`Storage::open_readonly`]
//!
//! Separate processes may share one database file (a `stop` issued while a
//! `launch` is streaming), so connections wait on locks instead of failing.

mod migrations;

use std::path::Path;

use chrono::Utc;
use leadconsole_shared::{LeadConsoleError, Result};
use libsql::params::Params;
use libsql::{Connection, Database, Value, params};
use uuid::Uuid;

/// How long a connection waits on a locked database before giving up.
const BUSY_TIMEOUT_MS: u32 = 5_000;

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

/// A cached rendered result as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResult {
    pub payload_json: String,
    pub run_id: u64,
    pub created_at: String,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| LeadConsoleError::io(parent, e))?;
            }
        }

        let storage = Self::connect(path, false).await?;
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open a database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        Self::connect(path, true).await
    }

    async fn connect(path: &Path, readonly: bool) -> Result<Self> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| LeadConsoleError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| LeadConsoleError::Storage(e.to_string()))?;

        // PRAGMA busy_timeout reports the new value as a row, so it goes through `query`.
        conn.query(&format!("PRAGMA busy_timeout = {BUSY_TIMEOUT_MS}"), params![])
            .await
            .map_err(|e| LeadConsoleError::Storage(e.to_string()))?;

        Ok(Self { db, conn, readonly })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    LeadConsoleError::Storage(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(LeadConsoleError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Session state operations
    // -----------------------------------------------------------------------

    /// Write a state value, replacing any previous value for the key in one statement.
    pub async fn put_state(&self, session_id: &str, key: &str, value_json: &str) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO session_state (session_id, key, value_json, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(session_id, key) DO UPDATE SET
                   value_json = excluded.value_json,
                   updated_at = excluded.updated_at",
                params![session_id, key, value_json, now.as_str()],
            )
            .await
            .map_err(|e| LeadConsoleError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Read a state value.
    pub async fn get_state(&self, session_id: &str, key: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT value_json FROM session_state WHERE session_id = ?1 AND key = ?2",
                params![session_id, key],
            )
            .await
            .map_err(|e| LeadConsoleError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let value: String = row
                    .get(0)
                    .map_err(|e| LeadConsoleError::Storage(e.to_string()))?;
                Ok(Some(value))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(LeadConsoleError::Storage(e.to_string())),
        }
    }

    /// Delete a state key. Missing keys are not an error.
    pub async fn delete_state(&self, session_id: &str, key: &str) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "DELETE FROM session_state WHERE session_id = ?1 AND key = ?2",
                params![session_id, key],
            )
            .await
            .map_err(|e| LeadConsoleError::Storage(e.to_string()))?;
        Ok(())
    }

    /// List all keys stored for a session, sorted.
    pub async fn list_state_keys(&self, session_id: &str) -> Result<Vec<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT key FROM session_state WHERE session_id = ?1 ORDER BY key",
                params![session_id],
            )
            .await
            .map_err(|e| LeadConsoleError::Storage(e.to_string()))?;

        let mut keys = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            keys.push(
                row.get::<String>(0)
                    .map_err(|e| LeadConsoleError::Storage(e.to_string()))?,
            );
        }
        Ok(keys)
    }

    /// Delete every state key of the session except `keep`, in one statement.
    ///
    /// Returns the number of state keys removed.
    pub async fn purge_state_except(&self, session_id: &str, keep: &[&str]) -> Result<usize> {
        self.check_writable()?;

        let placeholders = (0..keep.len())
            .map(|i| format!("?{}", i + 2))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "DELETE FROM session_state WHERE session_id = ?1 AND key NOT IN ({placeholders})"
        );
        let mut values = Vec::with_capacity(keep.len() + 1);
        values.push(Value::Text(session_id.to_string()));
        values.extend(keep.iter().map(|k| Value::Text((*k).to_string())));

        let removed = self
            .conn
            .execute(&sql, Params::Positional(values))
            .await
            .map_err(|e| LeadConsoleError::Storage(e.to_string()))?;

        tracing::debug!(session_id, removed, "purged entity-scoped state");
        Ok(removed as usize)
    }

    /// Write `key` only if it is absent. Returns whether this call wrote it.
    pub async fn try_claim_state(
        &self,
        session_id: &str,
        key: &str,
        value_json: &str,
    ) -> Result<bool> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        let inserted = self
            .conn
            .execute(
                "INSERT INTO session_state (session_id, key, value_json, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(session_id, key) DO NOTHING",
                params![session_id, key, value_json, now.as_str()],
            )
            .await
            .map_err(|e| LeadConsoleError::Storage(e.to_string()))?;
        Ok(inserted == 1)
    }

    /// Delete `key` only while it still holds `value_json`. Returns whether it was deleted.
    pub async fn release_state(
        &self,
        session_id: &str,
        key: &str,
        value_json: &str,
    ) -> Result<bool> {
        self.check_writable()?;
        let deleted = self
            .conn
            .execute(
                "DELETE FROM session_state WHERE session_id = ?1 AND key = ?2 AND value_json = ?3",
                params![session_id, key, value_json],
            )
            .await
            .map_err(|e| LeadConsoleError::Storage(e.to_string()))?;
        Ok(deleted == 1)
    }

    /// Drop all state and cached results of a session.
    pub async fn clear_session(&self, session_id: &str) -> Result<()> {
        self.check_writable()?;
        let tx = self
            .conn
            .transaction()
            .await
            .map_err(|e| LeadConsoleError::Storage(e.to_string()))?;
        tx.execute(
            "DELETE FROM session_state WHERE session_id = ?1",
            params![session_id],
        )
        .await
        .map_err(|e| LeadConsoleError::Storage(e.to_string()))?;
        tx.execute(
            "DELETE FROM result_cache WHERE session_id = ?1",
            params![session_id],
        )
        .await
        .map_err(|e| LeadConsoleError::Storage(e.to_string()))?;
        tx.commit()
            .await
            .map_err(|e| LeadConsoleError::Storage(e.to_string()))?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Result cache operations
    // -----------------------------------------------------------------------

    /// Get a cached result for `(pipeline, task_key, entity_key)`.
    pub async fn get_cached_result(
        &self,
        session_id: &str,
        pipeline: &str,
        task_key: &str,
        entity_key: &str,
    ) -> Result<Option<CachedResult>> {
        let mut rows = self
            .conn
            .query(
                "SELECT payload_json, run_id, created_at FROM result_cache
                 WHERE session_id = ?1 AND pipeline = ?2 AND task_key = ?3 AND entity_key = ?4",
                params![session_id, pipeline, task_key, entity_key],
            )
            .await
            .map_err(|e| LeadConsoleError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(CachedResult {
                payload_json: row
                    .get::<String>(0)
                    .map_err(|e| LeadConsoleError::Storage(e.to_string()))?,
                run_id: row
                    .get::<i64>(1)
                    .map_err(|e| LeadConsoleError::Storage(e.to_string()))?
                    as u64,
                created_at: row
                    .get::<String>(2)
                    .map_err(|e| LeadConsoleError::Storage(e.to_string()))?,
            })),
            Ok(None) => Ok(None),
            Err(e) => Err(LeadConsoleError::Storage(e.to_string())),
        }
    }

    /// Store a rendered result (upserts, so the row is replaced as a whole).
    pub async fn put_cached_result(
        &self,
        session_id: &str,
        pipeline: &str,
        task_key: &str,
        entity_key: &str,
        payload_json: &str,
        run_id: u64,
    ) -> Result<()> {
        self.check_writable()?;
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO result_cache (id, session_id, pipeline, task_key, entity_key, payload_json, run_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(session_id, pipeline, task_key, entity_key) DO UPDATE SET
                   payload_json = excluded.payload_json,
                   run_id = excluded.run_id,
                   created_at = excluded.created_at",
                params![
                    id.as_str(),
                    session_id,
                    pipeline,
                    task_key,
                    entity_key,
                    payload_json,
                    run_id as i64,
                    now.as_str()
                ],
            )
            .await
            .map_err(|e| LeadConsoleError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Remove the cached results of one pipeline for one entity.
    pub async fn invalidate_results(
        &self,
        session_id: &str,
        pipeline: &str,
        entity_key: &str,
    ) -> Result<u64> {
        self.check_writable()?;
        self.conn
            .execute(
                "DELETE FROM result_cache WHERE session_id = ?1 AND pipeline = ?2 AND entity_key = ?3",
                params![session_id, pipeline, entity_key],
            )
            .await
            .map_err(|e| LeadConsoleError::Storage(e.to_string()))
    }

    /// Remove every cached result of an entity, across pipelines.
    pub async fn invalidate_results_for_entity(
        &self,
        session_id: &str,
        entity_key: &str,
    ) -> Result<u64> {
        self.check_writable()?;
        self.conn
            .execute(
                "DELETE FROM result_cache WHERE session_id = ?1 AND entity_key = ?2",
                params![session_id, entity_key],
            )
            .await
            .map_err(|e| LeadConsoleError::Storage(e.to_string()))
    }

    /// Number of cached results of one pipeline for one entity.
    pub async fn count_cached_results(
        &self,
        session_id: &str,
        pipeline: &str,
        entity_key: &str,
    ) -> Result<usize> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM result_cache
                 WHERE session_id = ?1 AND pipeline = ?2 AND entity_key = ?3",
                params![session_id, pipeline, entity_key],
            )
            .await
            .map_err(|e| LeadConsoleError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(row
                .get::<i64>(0)
                .map_err(|e| LeadConsoleError::Storage(e.to_string()))?
                as usize),
            Ok(None) => Ok(0),
            Err(e) => Err(LeadConsoleError::Storage(e.to_string())),
        }
    }
}
