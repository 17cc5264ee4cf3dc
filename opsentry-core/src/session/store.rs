//! On-disk session store
//!
//! One directory per interactive session holding the launch settings and
//! a SQLite database with the transcript, usage metrics and session
//! lifecycle records. Teardown writes the session-end event and the
//! final cost total; the orchestrator guarantees it runs on every exit
//! path.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::session::{run_migrations, MetricsTracker};
use crate::{Error, Result};

/// Session status for resume support
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Running,
    Completed,
    Interrupted,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Running => "running",
            SessionStatus::Completed => "completed",
            SessionStatus::Interrupted => "interrupted",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "running" => Some(SessionStatus::Running),
            "completed" => Some(SessionStatus::Completed),
            "interrupted" => Some(SessionStatus::Interrupted),
            _ => None,
        }
    }
}

/// How a turn ended, as recorded in the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Success,
    Blocked,
    Error,
}

impl TurnOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnOutcome::Success => "success",
            TurnOutcome::Blocked => "blocked",
            TurnOutcome::Error => "error",
        }
    }
}

/// A single interactive session on disk.
pub struct SessionStore {
    /// Unique session identifier
    pub id: String,
    /// Session directory path
    pub path: PathBuf,
    conn: Connection,
    /// When the session was created
    pub created_at: DateTime<Utc>,
}

impl SessionStore {
    /// Create a new session directory under `base_dir`.
    pub fn create(agent_type: &str, base_dir: impl AsRef<Path>) -> Result<Self> {
        let created_at = Utc::now();
        let base_id = format!(
            "{}-{}",
            created_at.format("%Y-%m-%d"),
            agent_type.replace('_', "-")
        );

        // Find unique ID by appending counter if needed
        let base_dir = base_dir.as_ref();
        let (id, path) = {
            let first_path = base_dir.join(&base_id);
            if !first_path.exists() {
                (base_id, first_path)
            } else {
                let mut counter = 2;
                loop {
                    let candidate_id = format!("{}-{}", base_id, counter);
                    let candidate_path = base_dir.join(&candidate_id);
                    if !candidate_path.exists() {
                        break (candidate_id, candidate_path);
                    }
                    counter += 1;
                }
            }
        };

        std::fs::create_dir_all(&path)?;
        std::fs::create_dir_all(path.join("logs"))?;

        let db_path = path.join("session.db");
        let conn = Connection::open(&db_path)?;
        run_migrations(&conn)?;

        conn.execute(
            "INSERT INTO session_meta (key, value) VALUES ('id', ?1)",
            [&id],
        )?;
        conn.execute(
            "INSERT INTO session_meta (key, value) VALUES ('agent_type', ?1)",
            [agent_type],
        )?;
        conn.execute(
            "INSERT INTO session_meta (key, value) VALUES ('created_at', ?1)",
            [&created_at.to_rfc3339()],
        )?;

        conn.execute(
            "INSERT INTO session_state (id, status, last_activity_at) VALUES (1, 'running', datetime('now'))",
            [],
        )?;

        Ok(Self {
            id,
            path,
            conn,
            created_at,
        })
    }

    /// Open an existing session from disk.
    pub fn resume(session_path: impl AsRef<Path>) -> Result<Self> {
        let path = session_path.as_ref().to_path_buf();

        if !path.exists() {
            return Err(Error::SessionNotFound(path.display().to_string()));
        }

        let db_path = path.join("session.db");
        let conn = Connection::open(&db_path)?;

        let id: String = conn.query_row(
            "SELECT value FROM session_meta WHERE key = 'id'",
            [],
            |row| row.get(0),
        )?;

        let created_at_str: String = conn.query_row(
            "SELECT value FROM session_meta WHERE key = 'created_at'",
            [],
            |row| row.get(0),
        )?;
        let created_at = DateTime::parse_from_rfc3339(&created_at_str)
            .map_err(|e| Error::Config(e.to_string()))?
            .with_timezone(&Utc);

        Ok(Self {
            id,
            path,
            conn,
            created_at,
        })
    }

    /// Get a reference to the database connection
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Get current session status
    pub fn status(&self) -> Result<SessionStatus> {
        let status_str: String =
            self.conn
                .query_row("SELECT status FROM session_state WHERE id = 1", [], |row| {
                    row.get(0)
                })?;
        SessionStatus::from_str(&status_str)
            .ok_or_else(|| Error::Config(format!("Invalid session status: {}", status_str)))
    }

    /// Update session status
    pub fn set_status(&self, status: SessionStatus) -> Result<()> {
        self.conn.execute(
            "UPDATE session_state SET status = ?1, last_activity_at = datetime('now') WHERE id = 1",
            [status.as_str()],
        )?;
        Ok(())
    }

    /// Append one turn to the transcript.
    pub fn record_turn(
        &self,
        agent: &str,
        prompt: &str,
        outcome: TurnOutcome,
        output: &str,
        cost_usd: f64,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO turns (agent, prompt, outcome, output, cost_usd) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![agent, prompt, outcome.as_str(), output, cost_usd],
        )?;
        Ok(())
    }

    /// Number of recorded turns.
    pub fn turn_count(&self) -> Result<u32> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM turns", [], |row| row.get(0))?;
        Ok(count as u32)
    }

    /// Write the session-end record and final totals, flip the status,
    /// and persist the metrics snapshot. Called unconditionally at
    /// teardown on every exit path.
    pub fn finalize(
        &self,
        status: SessionStatus,
        total_cost_usd: f64,
        turn_count: u32,
        idle: Duration,
        active: Duration,
        metrics: &MetricsTracker,
    ) -> Result<()> {
        metrics.save(&self.conn)?;

        self.conn.execute(
            "UPDATE session_state SET
                status = ?1,
                turn_count = ?2,
                idle_seconds = ?3,
                active_seconds = ?4,
                last_activity_at = datetime('now')
             WHERE id = 1",
            params![
                status.as_str(),
                turn_count as i64,
                idle.as_secs_f64(),
                active.as_secs_f64(),
            ],
        )?;

        let payload = serde_json::json!({
            "total_cost_usd": total_cost_usd,
            "turns": turn_count,
            "status": status.as_str(),
        });
        self.conn.execute(
            "INSERT INTO session_events (event, payload) VALUES ('session_end', ?1)",
            [payload.to_string()],
        )?;

        Ok(())
    }

    /// Whether a session-end record has been written.
    pub fn has_session_end(&self) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM session_events WHERE event = 'session_end'",
            [],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_new_session() {
        let temp = TempDir::new().expect("should create temp dir");
        let session = SessionStore::create("red_teamer", temp.path()).expect("should create");

        assert!(session.id.contains("red-teamer"));
        assert!(session.path.exists());
        assert!(session.path.join("session.db").exists());
        assert_eq!(session.status().unwrap(), SessionStatus::Running);
    }

    #[test]
    fn test_resume_session() {
        let temp = TempDir::new().expect("should create temp dir");
        let original = SessionStore::create("dfir", temp.path()).expect("should create");
        let session_path = original.path.clone();
        drop(original);

        let resumed = SessionStore::resume(&session_path).expect("should resume");
        assert!(resumed.id.contains("dfir"));
    }

    #[test]
    fn test_resume_nonexistent_session() {
        let result = SessionStore::resume("/nonexistent/path");
        assert!(matches!(result, Err(Error::SessionNotFound(_))));
    }

    #[test]
    fn test_session_id_conflict_appends_counter() {
        let temp = TempDir::new().expect("should create temp dir");

        let session1 = SessionStore::create("red_teamer", temp.path()).unwrap();
        let id1 = session1.id.clone();
        drop(session1);

        let session2 = SessionStore::create("red_teamer", temp.path()).unwrap();
        assert_ne!(id1, session2.id);
        assert!(session2.id.ends_with("-2"));
    }

    #[test]
    fn test_record_turns_and_count() {
        let temp = TempDir::new().expect("should create temp dir");
        let session = SessionStore::create("red_teamer", temp.path()).unwrap();

        assert_eq!(session.turn_count().unwrap(), 0);
        session
            .record_turn("red_teamer", "scan the target", TurnOutcome::Success, "done", 0.01)
            .unwrap();
        session
            .record_turn("red_teamer", "bad input", TurnOutcome::Blocked, "", 0.0)
            .unwrap();
        assert_eq!(session.turn_count().unwrap(), 2);
    }

    #[test]
    fn test_finalize_writes_session_end() {
        let temp = TempDir::new().expect("should create temp dir");
        let session = SessionStore::create("red_teamer", temp.path()).unwrap();
        let metrics = MetricsTracker::new();
        metrics.record_tokens(100, 0, 50, 0.02);

        assert!(!session.has_session_end().unwrap());

        session
            .finalize(
                SessionStatus::Interrupted,
                0.02,
                3,
                Duration::from_secs(10),
                Duration::from_secs(5),
                &metrics,
            )
            .unwrap();

        assert!(session.has_session_end().unwrap());
        assert_eq!(session.status().unwrap(), SessionStatus::Interrupted);

        let (turns, idle): (i64, f64) = session
            .conn()
            .query_row(
                "SELECT turn_count, idle_seconds FROM session_state WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(turns, 3);
        assert!((idle - 10.0).abs() < 0.001);
    }

    #[test]
    fn test_status_lifecycle() {
        let temp = TempDir::new().expect("should create temp dir");
        let session = SessionStore::create("dfir", temp.path()).unwrap();

        session.set_status(SessionStatus::Interrupted).unwrap();
        assert_eq!(session.status().unwrap(), SessionStatus::Interrupted);

        session.set_status(SessionStatus::Completed).unwrap();
        assert_eq!(session.status().unwrap(), SessionStatus::Completed);
    }
}
