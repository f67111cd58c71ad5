//! Assessment draft repository trait definition.
//!
//! Mirrors the row-level operations of the draft table: select the newest
//! active row for a key, insert, patch an active row, complete, delete by id.
//! Insert-vs-update decisions live in `DraftStore`, not here.

use chrono::{DateTime, Utc};
use pillars_types::assessment::{AssessmentDraft, DraftId, DraftPatch};
use pillars_types::error::RepositoryError;

/// Repository trait for assessment draft persistence.
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait DraftRepository: Send + Sync {
    /// Newest row with `is_draft = true` for (owner, key), ordered by
    /// `last_saved_at` DESC, limit 1.
    fn find_active(
        &self,
        owner_id: &str,
        assessment_key: &str,
    ) -> impl std::future::Future<Output = Result<Option<AssessmentDraft>, RepositoryError>> + Send;

    /// Newest finalized row for (owner, key), ordered by `completed_at` DESC.
    fn find_completed(
        &self,
        owner_id: &str,
        assessment_key: &str,
    ) -> impl std::future::Future<Output = Result<Option<AssessmentDraft>, RepositoryError>> + Send;

    /// Get any row (active or finalized) by id.
    fn get(
        &self,
        id: &DraftId,
    ) -> impl std::future::Future<Output = Result<Option<AssessmentDraft>, RepositoryError>> + Send;

    /// List active drafts for an owner, most recently saved first.
    fn list_active(
        &self,
        owner_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<AssessmentDraft>, RepositoryError>> + Send;

    /// Insert a new row.
    ///
    /// Returns `RepositoryError::Conflict` if an active draft already exists
    /// for the same (owner, key).
    fn insert(
        &self,
        draft: &AssessmentDraft,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Apply a save to the row `id`, provided it is still an active draft.
    ///
    /// `version` and `auto_save_count` are incremented against the stored
    /// values. Returns the updated row, or `None` when the row is gone or has
    /// been finalized in the meantime.
    fn update_active(
        &self,
        id: &DraftId,
        patch: &DraftPatch,
    ) -> impl std::future::Future<Output = Result<Option<AssessmentDraft>, RepositoryError>> + Send;

    /// Flip an active draft to completed, touching nothing else.
    ///
    /// Returns the finalized row, or `None` when the row is gone or was
    /// already finalized.
    fn complete(
        &self,
        id: &DraftId,
        completed_at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<Option<AssessmentDraft>, RepositoryError>> + Send;

    /// Delete a row by id. Returns `true` if it existed.
    fn delete(
        &self,
        id: &DraftId,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;
}
