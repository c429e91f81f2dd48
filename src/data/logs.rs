use chrono::Utc;
use rusqlite::{params, Row};
use serde::Serialize;

use crate::db::Database;

#[derive(Debug, Clone, Serialize)]
pub struct ActivityLog {
    pub id: i64,
    pub company_id: Option<String>,
    pub actor: String,
    pub action: String,
    pub resource_type: String,
    pub description: String,
    pub created_at: String,
}

#[derive(Debug, Default)]
pub struct LogQuery {
    // None means the super-admin view across all tenants
    pub company_id: Option<String>,
    pub action: Option<String>,
    pub resource_type: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

fn from_row(row: &Row) -> rusqlite::Result<ActivityLog> {
    Ok(ActivityLog {
        id: row.get(0)?,
        company_id: row.get(1)?,
        actor: row.get(2)?,
        action: row.get(3)?,
        resource_type: row.get(4)?,
        description: row.get(5)?,
        created_at: row.get(6)?,
    })
}

// Append-only. A failed write never fails the mutation being recorded,
// it only shows up in the server log.
pub fn record(db: &Database, company_id: Option<&str>, actor: &str, action: &str, resource_type: &str, description: &str) {
    let result = db.conn.execute(
        "INSERT INTO activity_logs (company_id, actor, action, resource_type, description, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![company_id, actor, action, resource_type, description, Utc::now().to_rfc3339()],
    );
    if let Err(e) = result {
        tracing::warn!("failed to record activity log entry: {}", e);
    }
}

pub fn list(db: &Database, query: &LogQuery) -> rusqlite::Result<Vec<ActivityLog>> {
    let limit = if query.limit > 0 { query.limit.min(500) } else { 50 };
    let mut stmt = db.conn.prepare(
        "SELECT id, company_id, actor, action, resource_type, description, created_at
         FROM activity_logs
         WHERE (?1 IS NULL OR company_id = ?1)
           AND (?2 IS NULL OR action = ?2)
           AND (?3 IS NULL OR resource_type = ?3)
         ORDER BY id DESC
         LIMIT ?4 OFFSET ?5",
    )?;
    let rows = stmt.query_map(
        params![query.company_id, query.action, query.resource_type, limit, query.offset.max(0)],
        from_row,
    )?;
    rows.collect()
}

pub fn count_for_company(db: &Database, company_id: &str) -> rusqlite::Result<i64> {
    db.conn.query_row(
        "SELECT COUNT(*) FROM activity_logs WHERE company_id = ?1",
        params![company_id],
        |row| row.get(0),
    )
}
