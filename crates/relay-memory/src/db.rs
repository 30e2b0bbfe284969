use rusqlite::{Connection, Result};

/// Initialise relay tables. Safe to call on every startup (idempotent).
pub fn init_db(conn: &Connection) -> Result<()> {
    create_transcripts_table(conn)?;
    create_relay_state_table(conn)?;
    Ok(())
}

/// One row per relayed message; a successful turn writes a `user` row
/// followed by a `model` row in the same transaction.
fn create_transcripts_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS transcripts (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id     INTEGER NOT NULL,
            kind        TEXT NOT NULL CHECK (kind IN ('user', 'model')),
            message     TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_transcripts_user
            ON transcripts(user_id, id);",
    )
}

/// Small key/value table for process state that must survive restarts
/// (currently only the polling cursor).
fn create_relay_state_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS relay_state (
            key         TEXT PRIMARY KEY,
            value       INTEGER NOT NULL,
            updated_at  TEXT NOT NULL
        );",
    )
}
