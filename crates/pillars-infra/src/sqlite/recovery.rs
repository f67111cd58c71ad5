//! Event-trail recovery for drafts lost from the primary table.
//!
//! Answers are recoverable when the newest event for (owner, key) is a save
//! and the draft row it names no longer exists. A finalize or delete as the
//! newest event means the answers were intentionally retired.

use pillars_core::repository::recovery::RecoveryProcedure;
use pillars_types::assessment::RecoveryResponse;
use pillars_types::error::RepositoryError;
use sqlx::Row;

use super::pool::DatabasePool;
use super::{parse_datetime, query_err};

/// Reads `assessment_draft_events` to reconstruct orphaned answers.
pub struct SqliteRecoveryProcedure {
    pool: DatabasePool,
}

impl SqliteRecoveryProcedure {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

impl RecoveryProcedure for SqliteRecoveryProcedure {
    async fn recover(
        &self,
        owner_id: &str,
        assessment_key: &str,
    ) -> Result<RecoveryResponse, RepositoryError> {
        let latest = sqlx::query(
            r#"SELECT draft_id, event, current_step, form_data, created_at
               FROM assessment_draft_events
               WHERE owner_id = ? AND assessment_key = ?
               ORDER BY created_at DESC, id DESC
               LIMIT 1"#,
        )
        .bind(owner_id)
        .bind(assessment_key)
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(query_err)?;

        let Some(row) = latest else {
            return Ok(RecoveryResponse::nothing());
        };

        let event: String = row.try_get("event").map_err(query_err)?;
        if event != "saved" {
            return Ok(RecoveryResponse::nothing());
        }

        let draft_id: String = row.try_get("draft_id").map_err(query_err)?;
        let still_present: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM assessment_drafts WHERE id = ?")
                .bind(&draft_id)
                .fetch_optional(&self.pool.reader)
                .await
                .map_err(query_err)?;
        if still_present.is_some() {
            return Ok(RecoveryResponse::nothing());
        }

        let form_data: Option<String> = row.try_get("form_data").map_err(query_err)?;
        let Some(form_data) = form_data else {
            return Ok(RecoveryResponse::nothing());
        };
        let form_data = serde_json::from_str(&form_data)
            .map_err(|e| RepositoryError::Query(format!("invalid form_data: {e}")))?;
        let current_step: Option<String> = row.try_get("current_step").map_err(query_err)?;
        let created_at: String = row.try_get("created_at").map_err(query_err)?;

        tracing::debug!(owner_id, assessment_key, draft_id = %draft_id, "orphaned save event found");

        Ok(RecoveryResponse {
            recovered: true,
            form_data: Some(form_data),
            current_step,
            recovered_from: Some(parse_datetime(&created_at)?),
        })
    }
}
