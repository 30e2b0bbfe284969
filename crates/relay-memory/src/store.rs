use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

use relay_core::PrincipalId;

use crate::error::MemoryError;

const CURSOR_KEY: &str = "telegram_offset";

/// Who produced a transcript row.
#[derive(Debug, Clone, Copy)]
enum TranscriptKind {
    User,
    Model,
}

impl TranscriptKind {
    fn as_str(&self) -> &'static str {
        match self {
            TranscriptKind::User => "user",
            TranscriptKind::Model => "model",
        }
    }
}

/// Sink for completed turns. Called after the reply has been sent; a failure
/// is logged by the caller and never affects the principal.
pub trait TranscriptRecorder: Send + Sync {
    fn record(
        &self,
        user_id: PrincipalId,
        human_text: &str,
        assistant_text: &str,
    ) -> Result<(), MemoryError>;
}

/// SQLite-backed transcript log and cursor store.
pub struct TranscriptStore {
    db: Mutex<Connection>,
}

impl TranscriptStore {
    /// Wrap an already-migrated connection (see [`crate::db::init_db`]).
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Mutex::new(conn),
        }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, MemoryError> {
        self.db.lock().map_err(|_| MemoryError::LockPoisoned)
    }

    /// Last persisted polling cursor, if any.
    pub fn load_cursor(&self) -> Result<Option<i64>, MemoryError> {
        let db = self.conn()?;
        let value = db
            .query_row(
                "SELECT value FROM relay_state WHERE key = ?1",
                rusqlite::params![CURSOR_KEY],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn save_cursor(&self, cursor: i64) -> Result<(), MemoryError> {
        let db = self.conn()?;
        let now = chrono::Utc::now().to_rfc3339();
        db.execute(
            "INSERT INTO relay_state (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                            updated_at = excluded.updated_at",
            rusqlite::params![CURSOR_KEY, cursor, now],
        )?;
        debug!(cursor, "polling cursor saved");
        Ok(())
    }
}

impl TranscriptRecorder for TranscriptStore {
    fn record(
        &self,
        user_id: PrincipalId,
        human_text: &str,
        assistant_text: &str,
    ) -> Result<(), MemoryError> {
        let mut db = self.conn()?;
        let now = chrono::Utc::now().to_rfc3339();
        let tx = db.transaction()?;
        for (kind, message) in [
            (TranscriptKind::User, human_text),
            (TranscriptKind::Model, assistant_text),
        ] {
            tx.execute(
                "INSERT INTO transcripts (user_id, kind, message, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![user_id.0, kind.as_str(), message, now],
            )?;
        }
        tx.commit()?;
        debug!(user_id = user_id.0, "transcript recorded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;

    fn store() -> TranscriptStore {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        TranscriptStore::new(conn)
    }

    #[test]
    fn init_db_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        init_db(&conn).unwrap();
    }

    /// `(kind, message)` rows for a user in insertion order.
    fn rows(s: &TranscriptStore, user_id: i64) -> Vec<(String, String)> {
        let db = s.conn().unwrap();
        let mut stmt = db
            .prepare("SELECT kind, message FROM transcripts WHERE user_id = ?1 ORDER BY id")
            .unwrap();
        stmt.query_map([user_id], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    fn pair(kind: &str, message: &str) -> (String, String) {
        (kind.to_string(), message.to_string())
    }

    #[test]
    fn record_writes_user_then_model_row() {
        let s = store();
        s.record(PrincipalId(42), "Hello", "Hi!").unwrap();

        assert_eq!(rows(&s, 42), vec![pair("user", "Hello"), pair("model", "Hi!")]);
    }

    #[test]
    fn records_are_kept_per_user() {
        let s = store();
        for i in 0..3 {
            s.record(PrincipalId(42), &format!("q{i}"), &format!("a{i}")).unwrap();
        }
        s.record(PrincipalId(7), "other", "reply").unwrap();

        let mine = rows(&s, 42);
        assert_eq!(mine.len(), 6);
        assert_eq!(mine[4], pair("user", "q2"));
        assert_eq!(mine[5], pair("model", "a2"));
        assert_eq!(rows(&s, 7), vec![pair("user", "other"), pair("model", "reply")]);
    }

    #[test]
    fn cursor_round_trips_and_overwrites() {
        let s = store();
        assert_eq!(s.load_cursor().unwrap(), None);
        s.save_cursor(101).unwrap();
        s.save_cursor(205).unwrap();
        assert_eq!(s.load_cursor().unwrap(), Some(205));
    }

    #[test]
    fn kind_check_constraint_rejects_unknown_kind() {
        let s = store();
        let db = s.conn().unwrap();
        let res = db.execute(
            "INSERT INTO transcripts (user_id, kind, message, created_at)
             VALUES (1, 'system', 'x', 'now')",
            [],
        );
        assert!(res.is_err());
    }
}
