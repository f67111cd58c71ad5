//! SQLite implementation of `DraftRepository`.
//!
//! Every mutation also appends a row to `assessment_draft_events` inside the
//! same transaction. The event trail is what `SqliteRecoveryProcedure` reads
//! when a draft row has gone missing. Saves and finalization only touch rows
//! that are still active, and counters are bumped in SQL, so a late write can
//! neither reopen a completed record nor lower its `version`.

use chrono::{DateTime, Utc};
use pillars_core::repository::draft::DraftRepository;
use pillars_types::assessment::{AssessmentDraft, DraftId, DraftPatch, FormData};
use pillars_types::error::RepositoryError;
use serde_json::{Map, Value};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime, query_err};

const DRAFT_COLUMNS: &str = "id, owner_id, assessment_type, assessment_key, current_step, \
     form_data, metadata, is_draft, version, auto_save_count, started_at, last_saved_at, \
     completed_at, device_info";

/// SQLite-backed assessment draft persistence.
pub struct SqliteDraftRepository {
    pool: DatabasePool,
}

impl SqliteDraftRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

struct DraftRow {
    id: String,
    owner_id: String,
    assessment_type: String,
    assessment_key: String,
    current_step: String,
    form_data: String,
    metadata: String,
    is_draft: bool,
    version: i64,
    auto_save_count: i64,
    started_at: String,
    last_saved_at: Option<String>,
    completed_at: Option<String>,
    device_info: String,
}

impl DraftRow {
    fn from_row(row: &SqliteRow) -> Result<Self, RepositoryError> {
        Ok(Self {
            id: row.try_get("id").map_err(query_err)?,
            owner_id: row.try_get("owner_id").map_err(query_err)?,
            assessment_type: row.try_get("assessment_type").map_err(query_err)?,
            assessment_key: row.try_get("assessment_key").map_err(query_err)?,
            current_step: row.try_get("current_step").map_err(query_err)?,
            form_data: row.try_get("form_data").map_err(query_err)?,
            metadata: row.try_get("metadata").map_err(query_err)?,
            is_draft: row.try_get("is_draft").map_err(query_err)?,
            version: row.try_get("version").map_err(query_err)?,
            auto_save_count: row.try_get("auto_save_count").map_err(query_err)?,
            started_at: row.try_get("started_at").map_err(query_err)?,
            last_saved_at: row.try_get("last_saved_at").map_err(query_err)?,
            completed_at: row.try_get("completed_at").map_err(query_err)?,
            device_info: row.try_get("device_info").map_err(query_err)?,
        })
    }

    fn into_draft(self) -> Result<AssessmentDraft, RepositoryError> {
        Ok(AssessmentDraft {
            id: DraftId(
                Uuid::parse_str(&self.id)
                    .map_err(|e| RepositoryError::Query(format!("invalid draft id: {e}")))?,
            ),
            owner_id: self.owner_id,
            assessment_type: self.assessment_type,
            assessment_key: self.assessment_key,
            current_step: self.current_step,
            form_data: parse_object(&self.form_data, "form_data")?,
            metadata: parse_object(&self.metadata, "metadata")?,
            is_draft: self.is_draft,
            version: self.version,
            auto_save_count: self.auto_save_count,
            started_at: parse_datetime(&self.started_at)?,
            last_saved_at: self.last_saved_at.as_deref().map(parse_datetime).transpose()?,
            completed_at: self.completed_at.as_deref().map(parse_datetime).transpose()?,
            device_info: parse_object(&self.device_info, "device_info")?,
        })
    }
}

fn parse_object(s: &str, column: &str) -> Result<Map<String, Value>, RepositoryError> {
    serde_json::from_str(s).map_err(|e| RepositoryError::Query(format!("invalid {column}: {e}")))
}

fn to_json(map: &Map<String, Value>) -> Result<String, RepositoryError> {
    serde_json::to_string(map).map_err(|e| RepositoryError::Query(e.to_string()))
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}

/// Append one entry to the event trail.
///
/// Earlier `saved` snapshots of the same draft are dropped first: recovery
/// only reads the newest event for a key, so at most one snapshot per draft
/// is kept, and none once the draft is finalized or deleted.
async fn append_event(
    conn: &mut sqlx::SqliteConnection,
    draft: &AssessmentDraft,
    event: &str,
    form_data: Option<&FormData>,
) -> Result<(), RepositoryError> {
    let form_json = form_data.map(to_json).transpose()?;

    sqlx::query("DELETE FROM assessment_draft_events WHERE draft_id = ? AND event = 'saved'")
        .bind(draft.id.to_string())
        .execute(&mut *conn)
        .await
        .map_err(query_err)?;

    sqlx::query(
        r#"INSERT INTO assessment_draft_events
               (id, draft_id, owner_id, assessment_key, event, current_step, form_data, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(Uuid::now_v7().to_string())
    .bind(draft.id.to_string())
    .bind(&draft.owner_id)
    .bind(&draft.assessment_key)
    .bind(event)
    .bind(form_data.map(|_| draft.current_step.as_str()))
    .bind(form_json)
    .bind(format_datetime(&Utc::now()))
    .execute(conn)
    .await
    .map_err(query_err)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// DraftRepository implementation
// ---------------------------------------------------------------------------

impl DraftRepository for SqliteDraftRepository {
    async fn find_active(
        &self,
        owner_id: &str,
        assessment_key: &str,
    ) -> Result<Option<AssessmentDraft>, RepositoryError> {
        let sql = format!(
            "SELECT {DRAFT_COLUMNS} FROM assessment_drafts
             WHERE owner_id = ? AND assessment_key = ? AND is_draft = 1
             ORDER BY last_saved_at DESC LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(owner_id)
            .bind(assessment_key)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;

        row.map(|r| DraftRow::from_row(&r)?.into_draft()).transpose()
    }

    async fn find_completed(
        &self,
        owner_id: &str,
        assessment_key: &str,
    ) -> Result<Option<AssessmentDraft>, RepositoryError> {
        let sql = format!(
            "SELECT {DRAFT_COLUMNS} FROM assessment_drafts
             WHERE owner_id = ? AND assessment_key = ? AND is_draft = 0
             ORDER BY completed_at DESC LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(owner_id)
            .bind(assessment_key)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;

        row.map(|r| DraftRow::from_row(&r)?.into_draft()).transpose()
    }

    async fn get(&self, id: &DraftId) -> Result<Option<AssessmentDraft>, RepositoryError> {
        let sql = format!("SELECT {DRAFT_COLUMNS} FROM assessment_drafts WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;

        row.map(|r| DraftRow::from_row(&r)?.into_draft()).transpose()
    }

    async fn list_active(&self, owner_id: &str) -> Result<Vec<AssessmentDraft>, RepositoryError> {
        let sql = format!(
            "SELECT {DRAFT_COLUMNS} FROM assessment_drafts
             WHERE owner_id = ? AND is_draft = 1
             ORDER BY last_saved_at DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(owner_id)
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_err)?;

        rows.iter()
            .map(|r| DraftRow::from_row(r)?.into_draft())
            .collect()
    }

    async fn insert(&self, draft: &AssessmentDraft) -> Result<(), RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;

        sqlx::query(
            r#"INSERT INTO assessment_drafts
                   (id, owner_id, assessment_type, assessment_key, current_step, form_data,
                    metadata, is_draft, version, auto_save_count, started_at, last_saved_at,
                    completed_at, device_info)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(draft.id.to_string())
        .bind(&draft.owner_id)
        .bind(&draft.assessment_type)
        .bind(&draft.assessment_key)
        .bind(&draft.current_step)
        .bind(to_json(&draft.form_data)?)
        .bind(to_json(&draft.metadata)?)
        .bind(draft.is_draft)
        .bind(draft.version)
        .bind(draft.auto_save_count)
        .bind(format_datetime(&draft.started_at))
        .bind(draft.last_saved_at.as_ref().map(format_datetime))
        .bind(draft.completed_at.as_ref().map(format_datetime))
        .bind(to_json(&draft.device_info)?)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                RepositoryError::Conflict(format!(
                    "active draft already exists for {}/{}",
                    draft.owner_id, draft.assessment_key
                ))
            } else {
                query_err(e)
            }
        })?;

        append_event(&mut tx, draft, "saved", Some(&draft.form_data)).await?;
        tx.commit().await.map_err(query_err)?;

        tracing::debug!(draft_id = %draft.id, owner_id = %draft.owner_id, "draft inserted");
        Ok(())
    }

    async fn update_active(
        &self,
        id: &DraftId,
        patch: &DraftPatch,
    ) -> Result<Option<AssessmentDraft>, RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;

        let sql = format!(
            "UPDATE assessment_drafts
             SET current_step = ?, form_data = ?, metadata = ?, device_info = ?,
                 last_saved_at = ?, version = version + 1,
                 auto_save_count = auto_save_count + ?
             WHERE id = ? AND is_draft = 1
             RETURNING {DRAFT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(&patch.current_step)
            .bind(to_json(&patch.form_data)?)
            .bind(to_json(&patch.metadata)?)
            .bind(to_json(&patch.device_info)?)
            .bind(format_datetime(&patch.saved_at))
            .bind(i64::from(patch.auto_save))
            .bind(id.to_string())
            .fetch_optional(&mut *tx)
            .await
            .map_err(query_err)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let draft = DraftRow::from_row(&row)?.into_draft()?;

        append_event(&mut tx, &draft, "saved", Some(&draft.form_data)).await?;
        tx.commit().await.map_err(query_err)?;

        tracing::debug!(draft_id = %draft.id, version = draft.version, "draft updated");
        Ok(Some(draft))
    }

    async fn complete(
        &self,
        id: &DraftId,
        completed_at: DateTime<Utc>,
    ) -> Result<Option<AssessmentDraft>, RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;

        let sql = format!(
            "UPDATE assessment_drafts
             SET is_draft = 0, completed_at = ?
             WHERE id = ? AND is_draft = 1
             RETURNING {DRAFT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(format_datetime(&completed_at))
            .bind(id.to_string())
            .fetch_optional(&mut *tx)
            .await
            .map_err(query_err)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let draft = DraftRow::from_row(&row)?.into_draft()?;

        append_event(&mut tx, &draft, "finalized", None).await?;
        tx.commit().await.map_err(query_err)?;

        tracing::debug!(draft_id = %draft.id, "draft completed");
        Ok(Some(draft))
    }

    async fn delete(&self, id: &DraftId) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;

        let sql = format!("SELECT {DRAFT_COLUMNS} FROM assessment_drafts WHERE id = ?");
        let existing = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&mut *tx)
            .await
            .map_err(query_err)?;

        let Some(row) = existing else {
            return Ok(false);
        };
        let draft = DraftRow::from_row(&row)?.into_draft()?;

        sqlx::query("DELETE FROM assessment_drafts WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;

        append_event(&mut tx, &draft, "deleted", None).await?;
        tx.commit().await.map_err(query_err)?;

        tracing::debug!(draft_id = %id, "draft deleted");
        Ok(true)
    }
}
