//! In-memory port implementations shared by the unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use pillars_types::assessment::{AssessmentDraft, DraftId, DraftPatch, RecoveryResponse};
use pillars_types::error::RepositoryError;

use crate::repository::draft::DraftRepository;
use crate::repository::recovery::RecoveryProcedure;

#[derive(Default)]
struct Inner {
    rows: Mutex<Vec<AssessmentDraft>>,
    writes: AtomicUsize,
    fail_reads: AtomicUsize,
    fail_writes: AtomicUsize,
    stale_find: Mutex<Option<AssessmentDraft>>,
    complete_after_find: AtomicBool,
}

/// Vec-backed draft repository with failure injection.
///
/// Clones share the same rows, so a test can keep a handle while the
/// store owns another.
#[derive(Clone, Default)]
pub struct MemoryDraftRepository {
    inner: Arc<Inner>,
}

impl MemoryDraftRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` reads fail.
    pub fn fail_next_reads(&self, n: usize) {
        self.inner.fail_reads.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` writes (insert/update/complete/delete) fail.
    pub fn fail_next_writes(&self, n: usize) {
        self.inner.fail_writes.store(n, Ordering::SeqCst);
    }

    /// Answer the next `find_active` with `draft` instead of the stored row,
    /// as if it had been loaded before later writes landed.
    pub fn serve_stale_once(&self, draft: AssessmentDraft) {
        *self.inner.stale_find.lock().unwrap() = Some(draft);
    }

    /// Finalize the found row right after the next `find_active` returns it,
    /// as if a submit committed between a save's load and its write.
    pub fn complete_after_next_find(&self) {
        self.inner.complete_after_find.store(true, Ordering::SeqCst);
    }

    /// Number of successful writes.
    pub fn write_count(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }

    pub fn rows(&self) -> Vec<AssessmentDraft> {
        self.inner.rows.lock().unwrap().clone()
    }

    pub fn push_row(&self, draft: AssessmentDraft) {
        self.inner.rows.lock().unwrap().push(draft);
    }

    fn check(counter: &AtomicUsize) -> Result<(), RepositoryError> {
        let remaining = counter.load(Ordering::SeqCst);
        if remaining > 0 {
            counter.store(remaining - 1, Ordering::SeqCst);
            return Err(RepositoryError::Query("injected failure".to_string()));
        }
        Ok(())
    }

    fn find(&self, owner_id: &str, key: &str, is_draft: bool) -> Option<AssessmentDraft> {
        let rows = self.inner.rows.lock().unwrap();
        rows.iter()
            .filter(|d| d.owner_id == owner_id && d.assessment_key == key && d.is_draft == is_draft)
            .max_by_key(|d| {
                if is_draft {
                    d.last_saved_at
                } else {
                    d.completed_at
                }
            })
            .cloned()
    }
}

impl DraftRepository for MemoryDraftRepository {
    async fn find_active(
        &self,
        owner_id: &str,
        assessment_key: &str,
    ) -> Result<Option<AssessmentDraft>, RepositoryError> {
        Self::check(&self.inner.fail_reads)?;
        if let Some(stale) = self.inner.stale_find.lock().unwrap().take() {
            return Ok(Some(stale));
        }
        let found = self.find(owner_id, assessment_key, true);
        if let Some(draft) = &found {
            if self.inner.complete_after_find.swap(false, Ordering::SeqCst) {
                let mut rows = self.inner.rows.lock().unwrap();
                if let Some(row) = rows.iter_mut().find(|d| d.id == draft.id) {
                    row.is_draft = false;
                    row.completed_at = Some(Utc::now());
                }
            }
        }
        Ok(found)
    }

    async fn find_completed(
        &self,
        owner_id: &str,
        assessment_key: &str,
    ) -> Result<Option<AssessmentDraft>, RepositoryError> {
        Self::check(&self.inner.fail_reads)?;
        Ok(self.find(owner_id, assessment_key, false))
    }

    async fn get(&self, id: &DraftId) -> Result<Option<AssessmentDraft>, RepositoryError> {
        Self::check(&self.inner.fail_reads)?;
        let rows = self.inner.rows.lock().unwrap();
        Ok(rows.iter().find(|d| d.id == *id).cloned())
    }

    async fn list_active(&self, owner_id: &str) -> Result<Vec<AssessmentDraft>, RepositoryError> {
        Self::check(&self.inner.fail_reads)?;
        let rows = self.inner.rows.lock().unwrap();
        let mut active: Vec<AssessmentDraft> = rows
            .iter()
            .filter(|d| d.owner_id == owner_id && d.is_draft)
            .cloned()
            .collect();
        active.sort_by(|a, b| b.last_saved_at.cmp(&a.last_saved_at));
        Ok(active)
    }

    async fn insert(&self, draft: &AssessmentDraft) -> Result<(), RepositoryError> {
        Self::check(&self.inner.fail_writes)?;
        let mut rows = self.inner.rows.lock().unwrap();
        if rows.iter().any(|d| {
            d.is_draft && d.owner_id == draft.owner_id && d.assessment_key == draft.assessment_key
        }) {
            return Err(RepositoryError::Conflict("active draft exists".to_string()));
        }
        rows.push(draft.clone());
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn update_active(
        &self,
        id: &DraftId,
        patch: &DraftPatch,
    ) -> Result<Option<AssessmentDraft>, RepositoryError> {
        Self::check(&self.inner.fail_writes)?;
        let mut rows = self.inner.rows.lock().unwrap();
        let Some(row) = rows.iter_mut().find(|d| d.id == *id && d.is_draft) else {
            return Ok(None);
        };
        row.current_step = patch.current_step.clone();
        row.form_data = patch.form_data.clone();
        row.metadata = patch.metadata.clone();
        row.device_info = patch.device_info.clone();
        row.last_saved_at = Some(patch.saved_at);
        row.version += 1;
        if patch.auto_save {
            row.auto_save_count += 1;
        }
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        Ok(Some(row.clone()))
    }

    async fn complete(
        &self,
        id: &DraftId,
        completed_at: DateTime<Utc>,
    ) -> Result<Option<AssessmentDraft>, RepositoryError> {
        Self::check(&self.inner.fail_writes)?;
        let mut rows = self.inner.rows.lock().unwrap();
        let Some(row) = rows.iter_mut().find(|d| d.id == *id && d.is_draft) else {
            return Ok(None);
        };
        row.is_draft = false;
        row.completed_at = Some(completed_at);
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        Ok(Some(row.clone()))
    }

    async fn delete(&self, id: &DraftId) -> Result<bool, RepositoryError> {
        Self::check(&self.inner.fail_writes)?;
        let mut rows = self.inner.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|d| d.id != *id);
        let removed = rows.len() != before;
        if removed {
            self.inner.writes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(removed)
    }
}

/// Recovery procedure returning a canned response (or an error).
#[derive(Clone)]
pub struct CannedRecovery {
    response: Option<RecoveryResponse>,
    calls: Arc<AtomicUsize>,
}

impl CannedRecovery {
    pub fn returning(response: RecoveryResponse) -> Self {
        Self {
            response: Some(response),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing() -> Self {
        Self {
            response: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RecoveryProcedure for CannedRecovery {
    async fn recover(
        &self,
        _owner_id: &str,
        _assessment_key: &str,
    ) -> Result<RecoveryResponse, RepositoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.response
            .clone()
            .ok_or_else(|| RepositoryError::Query("recovery procedure unavailable".to_string()))
    }
}
