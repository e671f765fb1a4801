//! SQL migration definitions for the LeadConsole state database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements executed as one batch.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema: session_state, result_cache",
            sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Namespaced per-session key/value state (JSON values)
CREATE TABLE IF NOT EXISTS session_state (
    session_id TEXT NOT NULL,
    key        TEXT NOT NULL,
    value_json TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (session_id, key)
);

-- Rendered task results, one live row per (session, pipeline, task, entity)
CREATE TABLE IF NOT EXISTS result_cache (
    id           TEXT PRIMARY KEY,
    session_id   TEXT NOT NULL,
    pipeline     TEXT NOT NULL,
    task_key     TEXT NOT NULL,
    entity_key   TEXT NOT NULL,
    payload_json TEXT NOT NULL,
    run_id       INTEGER NOT NULL,
    created_at   TEXT NOT NULL,
    UNIQUE(session_id, pipeline, task_key, entity_key)
);

CREATE INDEX IF NOT EXISTS idx_result_cache_entity ON result_cache(session_id, entity_key);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
        Migration {
            version: 2,
            description: "Index session_state by update time for status listings",
            sql: r#"
CREATE INDEX IF NOT EXISTS idx_session_state_updated ON session_state(session_id, updated_at);

INSERT INTO schema_migrations (version) VALUES (2);
"#,
        },
    ]
}
