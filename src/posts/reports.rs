use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use crate::db::models::PostReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    Submitted,
    Updated,
}

impl ReportOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            ReportOutcome::Submitted => "report submitted",
            ReportOutcome::Updated => "report updated",
        }
    }
}

/// One report per (post, user): a second report replaces the reason.
///
/// Runs in its own immediate transaction so the lookup and the write see the
/// same state.
pub fn upsert(
    conn: &mut Connection,
    post_id: &str,
    user_id: &str,
    reason: &str,
) -> rusqlite::Result<(ReportOutcome, PostReport)> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let existing: Option<String> = tx
        .query_row(
            "SELECT id FROM post_reports WHERE post_id = ?1 AND reported_by = ?2",
            params![post_id, user_id],
            |row| row.get(0),
        )
        .optional()?;

    let (outcome, id) = match existing {
        Some(id) => {
            tx.execute(
                "UPDATE post_reports SET reason = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![reason, id],
            )?;
            (ReportOutcome::Updated, id)
        }
        None => {
            let id = uuid::Uuid::now_v7().to_string();
            tx.execute(
                "INSERT INTO post_reports (id, post_id, reported_by, reason) VALUES (?1, ?2, ?3, ?4)",
                params![id, post_id, user_id, reason],
            )?;
            tx.execute(
                "INSERT OR IGNORE INTO post_reporters (post_id, user_id) VALUES (?1, ?2)",
                params![post_id, user_id],
            )?;
            (ReportOutcome::Submitted, id)
        }
    };

    let report = tx.query_row(
        "SELECT id, post_id, reported_by, reason, created_at, updated_at
         FROM post_reports WHERE id = ?1",
        params![id],
        |row| {
            Ok(PostReport {
                id: row.get(0)?,
                post_id: row.get(1)?,
                reported_by_id: row.get(2)?,
                reason: row.get(3)?,
                created_at: row.get(4)?,
                updated_at: row.get(5)?,
            })
        },
    )?;
    tx.commit()?;
    Ok((outcome, report))
}
