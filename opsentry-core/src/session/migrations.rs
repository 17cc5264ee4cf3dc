//! Database migrations

use rusqlite::Connection;

use crate::Result;

/// Run all migrations on the database
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(super::schema::SCHEMA)?;

    // Initialize metrics if not exists
    conn.execute(
        "INSERT OR IGNORE INTO metrics (id, tool_calls, tokens_input, tokens_cached, tokens_output)
         VALUES ('global', 0, 0, 0, 0)",
        [],
    )?;

    Ok(())
}
