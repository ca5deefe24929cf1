//! Append-only tool-call log, sharing the filesystem's database handle.
//! Like `kv`, a simple table-backed collaborator rather than part of the
//! POSIX-shaped facade.

use agentfs_types::error::Result;
use agentfs_types::types::Timestamp;

use crate::db::Handle;

/// One recorded invocation of a tool.
#[derive(Debug, Clone)]
pub struct ToolCall {
    /// Autoincremented log id.
    pub id: i64,
    /// When the call was recorded.
    pub ts: Timestamp,
    /// Name of the invoked tool.
    pub tool_name: String,
    /// Serialized request payload.
    pub request: String,
    /// Serialized response payload, if the call completed.
    pub response: Option<String>,
    /// Free-form status string (e.g. `"ok"`, `"error"`).
    pub status: String,
}

/// Append-only log backed by the `tool_calls` table.
pub struct ToolCallLog {
    db: Handle,
}

impl ToolCallLog {
    /// Construct a tool-call log sharing `db`'s connection pool.
    pub fn new(db: Handle) -> Self {
        ToolCallLog { db }
    }

    /// Append a new entry, returning its assigned id.
    pub fn record(&self, tool_name: &str, request: &str, response: Option<&str>, status: &str) -> Result<i64> {
        let conn = self.db.get()?;
        conn.execute(
            "insert into tool_calls (ts_ns, tool_name, request, response, status) values (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![Timestamp::now().0, tool_name, request, response, status],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Fetch the most recent `limit` entries, newest first.
    pub fn recent(&self, limit: u32) -> Result<Vec<ToolCall>> {
        let conn = self.db.get()?;
        let mut stmt = conn.prepare_cached(
            "select id, ts_ns, tool_name, request, response, status from tool_calls order by id desc limit ?1",
        )?;
        let rows = stmt.query_map([limit], |row| {
            Ok(ToolCall {
                id: row.get(0)?,
                ts: Timestamp(row.get(1)?),
                tool_name: row.get(2)?,
                request: row.get(3)?,
                response: row.get(4)?,
                status: row.get(5)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}
