//! Append-only audit trail of case status transitions.
//!
//! One record per transition. Entries are never updated or deleted and are
//! read back in insertion order.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Row, SqliteConnection};

use crate::database::Database;
use crate::error::{PrecinctError, Result};
use crate::models::{parse_timestamp, CaseStatus};

/// One immutable transition record. The filing record has no from-status.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub id: i64,
    pub case_id: i64,
    pub from_status: Option<CaseStatus>,
    pub to_status: CaseStatus,
    pub actor_id: i64,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Insert one transition record on the caller's connection.
///
/// Runs on the same transaction as the status change, so the entry and the
/// transition commit or roll back together.
pub(crate) async fn record(
    conn: &mut SqliteConnection,
    case_id: i64,
    from_status: Option<CaseStatus>,
    to_status: CaseStatus,
    actor_id: i64,
    message: &str,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO case_status_log (case_id, from_status, to_status, actor_id, message, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(case_id)
    .bind(from_status.map(|s| s.as_str()))
    .bind(to_status.as_str())
    .bind(actor_id)
    .bind(message)
    .bind(Utc::now().to_rfc3339())
    .execute(conn)
    .await
    .map_err(|e| PrecinctError::Database(format!("Failed to record transition: {}", e)))?;

    Ok(())
}

/// Read side of the audit trail.
pub struct AuditTrail {
    db: Arc<Database>,
}

impl AuditTrail {
    /// Create a new audit trail reader.
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Full history of a case in insertion order.
    pub async fn case_history(&self, case_id: i64) -> Result<Vec<AuditEntry>> {
        let rows = sqlx::query(
            "SELECT id, case_id, from_status, to_status, actor_id, message, created_at
             FROM case_status_log WHERE case_id = ?
             ORDER BY id ASC",
        )
        .bind(case_id)
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| PrecinctError::Database(format!("Failed to get case history: {}", e)))?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            entries.push(AuditEntry {
                id: row.get("id"),
                case_id: row.get("case_id"),
                from_status: row
                    .get::<Option<String>, _>("from_status")
                    .map(|s| CaseStatus::parse(&s)),
                to_status: CaseStatus::parse(row.get("to_status")),
                actor_id: row.get("actor_id"),
                message: row.get("message"),
                created_at: parse_timestamp(row.get("created_at")),
            });
        }

        Ok(entries)
    }
}
