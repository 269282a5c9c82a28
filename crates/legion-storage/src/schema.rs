//! Datastore schema (§4.A). One embedded SQLite file, opened in WAL
//! journal mode so every daemon process and ad-hoc CLI invocation can
//! write directly without a broker process — WAL allows concurrent
//! readers alongside a single writer, and `BEGIN IMMEDIATE` transactions
//! serialize writers with bounded retry instead of deadlocking.

use rusqlite::Connection;

pub const SCHEMA_VERSION: i64 = 1;

pub fn apply(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 2000;

        CREATE TABLE IF NOT EXISTS schema_meta (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS agents (
            name               TEXT PRIMARY KEY,
            class              TEXT NOT NULL,
            model              TEXT,
            transport          TEXT NOT NULL,
            status             TEXT NOT NULL DEFAULT '',
            context_summary    TEXT NOT NULL DEFAULT '',
            last_seen_ms       INTEGER NOT NULL,
            context_updated_ms INTEGER NOT NULL,
            hp_input_tokens    INTEGER NOT NULL DEFAULT 0,
            hp_output_tokens   INTEGER NOT NULL DEFAULT 0,
            hp_turn_input      INTEGER NOT NULL DEFAULT 0,
            hp_turn_output     INTEGER NOT NULL DEFAULT 0,
            hp_tokens_limit    INTEGER NOT NULL DEFAULT 200000,
            hp_mode            TEXT NOT NULL DEFAULT 'none',
            hp_alerts_fired    TEXT NOT NULL DEFAULT '[]',
            current_zone       TEXT,
            current_role       TEXT,
            registered_at_ms   INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS messages (
            id             INTEGER PRIMARY KEY AUTOINCREMENT,
            from_agent     TEXT NOT NULL,
            to_agent       TEXT NOT NULL,
            content_file   TEXT NOT NULL,
            timestamp_ms   INTEGER NOT NULL,
            read_flag      INTEGER NOT NULL DEFAULT 0,
            is_cc          INTEGER NOT NULL DEFAULT 0,
            cc_original_to TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_messages_to ON messages(to_agent, timestamp_ms, id);

        CREATE TABLE IF NOT EXISTS broadcast_reads (
            agent_name TEXT NOT NULL,
            message_id INTEGER NOT NULL,
            PRIMARY KEY (agent_name, message_id)
        );

        CREATE TABLE IF NOT EXISTS tasks (
            id               TEXT PRIMARY KEY,
            title            TEXT NOT NULL,
            task_file        TEXT NOT NULL,
            project          TEXT NOT NULL,
            zone             TEXT,
            status           TEXT NOT NULL,
            task_type        TEXT NOT NULL,
            assigned_to      TEXT,
            created_by       TEXT NOT NULL,
            class_required   TEXT,
            activity_count   INTEGER NOT NULL DEFAULT 0,
            result_file      TEXT,
            created_at_ms    INTEGER NOT NULL,
            updated_at_ms    INTEGER NOT NULL,
            requirement_path TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_tasks_project_status ON tasks(project, status);

        CREATE TABLE IF NOT EXISTS task_blocked_by (
            task_id    TEXT NOT NULL,
            blocker_id TEXT NOT NULL,
            PRIMARY KEY (task_id, blocker_id)
        );

        CREATE TABLE IF NOT EXISTS task_files (
            task_id TEXT NOT NULL,
            path    TEXT NOT NULL,
            PRIMARY KEY (task_id, path)
        );

        CREATE TABLE IF NOT EXISTS task_history (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            task_id     TEXT NOT NULL,
            from_status TEXT NOT NULL,
            to_status   TEXT NOT NULL,
            agent       TEXT NOT NULL,
            timestamp_ms INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_task_history_task ON task_history(task_id, id);

        CREATE TABLE IF NOT EXISTS file_claims (
            file_path    TEXT PRIMARY KEY,
            holder       TEXT NOT NULL,
            acquired_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS file_claim_waitlist (
            file_path    TEXT NOT NULL,
            agent        TEXT NOT NULL,
            requested_at_ms INTEGER NOT NULL,
            PRIMARY KEY (file_path, agent)
        );
        CREATE INDEX IF NOT EXISTS idx_waitlist_order ON file_claim_waitlist(file_path, requested_at_ms);

        CREATE TABLE IF NOT EXISTS plans (
            id         TEXT PRIMARY KEY,
            project    TEXT NOT NULL,
            agent      TEXT NOT NULL,
            text_file  TEXT NOT NULL,
            status     TEXT NOT NULL,
            set_at_ms  INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_plans_project_status ON plans(project, status);

        CREATE TABLE IF NOT EXISTS log_entries (
            id           TEXT PRIMARY KEY,
            project      TEXT NOT NULL,
            agent        TEXT NOT NULL,
            entry_file   TEXT NOT NULL,
            priority     TEXT NOT NULL,
            created_at_ms INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_log_project ON log_entries(project, created_at_ms);

        CREATE TABLE IF NOT EXISTS flags (
            key       TEXT PRIMARY KEY,
            value     TEXT NOT NULL,
            set_by    TEXT NOT NULL,
            set_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS fenix_records (
            id           TEXT PRIMARY KEY,
            agent        TEXT NOT NULL,
            manifest     TEXT NOT NULL,
            created_at_ms INTEGER NOT NULL,
            consumed_at_ms INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_fenix_agent ON fenix_records(agent, consumed_at_ms);

        CREATE TABLE IF NOT EXISTS fenix_files (
            fenix_id TEXT NOT NULL,
            path     TEXT NOT NULL,
            PRIMARY KEY (fenix_id, path)
        );

        CREATE TABLE IF NOT EXISTS agent_signals (
            id           TEXT PRIMARY KEY,
            agent        TEXT NOT NULL,
            kind         TEXT NOT NULL,
            payload      TEXT,
            set_at_ms    INTEGER NOT NULL,
            consumed_at_ms INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_signals_agent ON agent_signals(agent, consumed_at_ms);
        "#,
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('version', ?1)",
        [SCHEMA_VERSION.to_string()],
    )?;
    Ok(())
}
