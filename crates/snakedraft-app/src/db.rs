// SQLite persistence for draft sessions.

use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use snakedraft_core::{DraftSession, SessionId};

use crate::store::SessionStore;

/// SQLite-backed [`SessionStore`]. Each session is one row holding its JSON
/// encoding, keyed by (workspace, session id).
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure the schema
    /// exists. Pass `":memory:"` for an ephemeral database.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS sessions (
                workspace_id TEXT NOT NULL,
                session_id   TEXT NOT NULL,
                owner        TEXT NOT NULL,
                name         TEXT NOT NULL,
                created_at   TEXT NOT NULL,
                updated_at   TEXT NOT NULL,
                payload      TEXT NOT NULL,
                PRIMARY KEY (workspace_id, session_id)
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_owner
                ON sessions(workspace_id, owner);
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection. Panics if the mutex is poisoned.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    fn query_sessions(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<DraftSession>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(sql).context("failed to prepare session query")?;
        let payloads = stmt
            .query_map(args, |row| row.get::<_, String>(0))
            .context("failed to query sessions")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to read session rows")?;

        payloads.iter().map(String::as_str).map(decode).collect()
    }
}

fn decode(json: &str) -> Result<DraftSession> {
    serde_json::from_str(json).context("failed to deserialize draft session")
}

impl SessionStore for Database {
    fn get(&self, workspace: &str, id: SessionId) -> Result<Option<DraftSession>> {
        let conn = self.conn();
        let payload: Option<String> = conn
            .query_row(
                "SELECT payload FROM sessions WHERE workspace_id = ?1 AND session_id = ?2",
                params![workspace, id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .context("failed to load session")?;
        payload.as_deref().map(decode).transpose()
    }

    fn put(&self, workspace: &str, session: &DraftSession) -> Result<()> {
        let json = serde_json::to_string(session).context("failed to serialize draft session")?;
        let conn = self.conn();
        conn.execute(
            "INSERT INTO sessions
                (workspace_id, session_id, owner, name, created_at, updated_at, payload)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(workspace_id, session_id) DO UPDATE SET
                owner = excluded.owner,
                name = excluded.name,
                updated_at = excluded.updated_at,
                payload = excluded.payload",
            params![
                workspace,
                session.id().to_string(),
                session.owner(),
                session.name(),
                session.created_at().to_rfc3339(),
                Utc::now().to_rfc3339(),
                json,
            ],
        )
        .context("failed to save session")?;
        Ok(())
    }

    fn delete(&self, workspace: &str, id: SessionId) -> Result<bool> {
        let conn = self.conn();
        let removed = conn
            .execute(
                "DELETE FROM sessions WHERE workspace_id = ?1 AND session_id = ?2",
                params![workspace, id.to_string()],
            )
            .context("failed to delete session")?;
        Ok(removed > 0)
    }

    fn list_by_owner(&self, workspace: &str, owner: &str) -> Result<Vec<DraftSession>> {
        self.query_sessions(
            "SELECT payload FROM sessions
             WHERE workspace_id = ?1 AND owner = ?2
             ORDER BY created_at, session_id",
            params![workspace, owner],
        )
    }

    fn list_workspace(&self, workspace: &str) -> Result<Vec<DraftSession>> {
        self.query_sessions(
            "SELECT payload FROM sessions
             WHERE workspace_id = ?1
             ORDER BY created_at, session_id",
            params![workspace],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use snakedraft_core::{Item, ItemRef};

    /// Helper: create a fresh in-memory database for each test.
    fn test_db() -> Database {
        Database::open(":memory:").expect("in-memory database should open")
    }

    fn session(owner: &str, name: &str) -> DraftSession {
        let items = [254, 971, 1678, 118].map(|n| Item::new(n.to_string(), n));
        DraftSession::new(owner, name, "C1", 2, items).unwrap()
    }

    #[test]
    fn get_missing_is_none() {
        let db = test_db();
        assert!(db.get("T1", uuid::Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn started_session_round_trips() {
        let db = test_db();
        let mut s = session("U1", "Regional");
        s.join("U1", "Alice").unwrap();
        s.join("U2", "Bob").unwrap();
        s.start(&mut StdRng::seed_from_u64(4)).unwrap();
        s.pick_item(&ItemRef::Label("971".into()), 1).unwrap();
        s.replace_message_handles(vec!["1700000000.0001".into()]);

        db.put("T1", &s).unwrap();
        let loaded = db.get("T1", s.id()).unwrap().expect("session should exist");
        assert_eq!(loaded, s);
        assert_eq!(loaded.turn_token(), 2);
    }

    #[test]
    fn put_overwrites_previous_payload() {
        let db = test_db();
        let mut s = session("U1", "Old");
        db.put("T1", &s).unwrap();
        s.rename("New");
        db.put("T1", &s).unwrap();

        assert_eq!(db.get("T1", s.id()).unwrap().unwrap().name(), "New");
        assert_eq!(db.list_workspace("T1").unwrap().len(), 1);
    }

    #[test]
    fn sessions_scoped_to_workspace() {
        let db = test_db();
        let s = session("U1", "Mine");
        db.put("T1", &s).unwrap();
        assert!(db.get("T2", s.id()).unwrap().is_none());
        assert!(db.list_workspace("T2").unwrap().is_empty());
        assert!(!db.delete("T2", s.id()).unwrap());
        assert!(db.get("T1", s.id()).unwrap().is_some());
    }

    #[test]
    fn list_by_owner_filters() {
        let db = test_db();
        let a = session("U1", "a");
        let b = session("U2", "b");
        let c = session("U1", "c");
        for s in [&a, &b, &c] {
            db.put("T1", s).unwrap();
        }
        let names: Vec<String> = db
            .list_by_owner("T1", "U1")
            .unwrap()
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"a".to_string()));
        assert!(names.contains(&"c".to_string()));
    }

    #[test]
    fn delete_removes_row() {
        let db = test_db();
        let s = session("U1", "gone");
        db.put("T1", &s).unwrap();
        assert!(db.delete("T1", s.id()).unwrap());
        assert!(db.get("T1", s.id()).unwrap().is_none());
        assert!(!db.delete("T1", s.id()).unwrap());
    }

    #[test]
    fn corrupt_payload_is_an_error() {
        let db = test_db();
        let id = uuid::Uuid::new_v4();
        db.conn()
            .execute(
                "INSERT INTO sessions VALUES ('T1', ?1, 'U1', 'x', 'now', 'now', '{not json')",
                params![id.to_string()],
            )
            .unwrap();
        assert!(db.get("T1", id).is_err());
    }

    #[test]
    fn reopen_file_keeps_sessions() {
        let path = std::env::temp_dir().join("snakedraft_db_reopen.db");
        let _ = std::fs::remove_file(&path);
        let path_str = path.to_str().unwrap();
        let s = session("U1", "durable");
        {
            let db = Database::open(path_str).unwrap();
            db.put("T1", &s).unwrap();
        }
        let db = Database::open(path_str).unwrap();
        assert_eq!(db.get("T1", s.id()).unwrap(), Some(s));
    }
}
