//! Assessment draft service.
//!
//! Orchestrates the mount flow of an assessment form (load draft, classify,
//! fall back to recovery) and the user-facing actions on it. Manual actions
//! propagate `DraftError` so the caller can show a "could not save" notice;
//! the auto-save callback built here reports failures to the scheduler only.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::FutureExt;
use serde_json::{Map, Value};

use pillars_types::assessment::{
    AssessmentDraft, DraftStatus, DraftSummary, DraftView, SaveDraftRequest, SaveKind,
};
use pillars_types::error::DraftError;

use crate::draft::autosave::{AutoSaveScheduler, FlushFn};
use crate::draft::conflict::{ConflictGuard, idle_hours};
use crate::draft::form::{FormSnapshot, FormState};
use crate::draft::recovery::RecoveryAdvisor;
use crate::draft::store::DraftStore;
use crate::repository::draft::DraftRepository;
use crate::repository::recovery::RecoveryProcedure;

/// Fields stamped onto every save issued from one form.
#[derive(Debug, Clone)]
pub struct SaveContext {
    pub owner_id: String,
    pub assessment_type: String,
    pub assessment_key: String,
    pub metadata: Map<String, Value>,
    pub device_info: Map<String, Value>,
}

impl SaveContext {
    pub fn new(
        owner_id: impl Into<String>,
        assessment_type: impl Into<String>,
        assessment_key: impl Into<String>,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            assessment_type: assessment_type.into(),
            assessment_key: assessment_key.into(),
            metadata: Map::new(),
            device_info: Map::new(),
        }
    }

    pub fn with_device(mut self, device_info: Map<String, Value>, metadata: Map<String, Value>) -> Self {
        self.device_info = device_info;
        self.metadata = metadata;
        self
    }

    /// Build a save request from a form snapshot.
    pub fn request(&self, snapshot: &FormSnapshot, kind: SaveKind) -> SaveDraftRequest {
        SaveDraftRequest {
            owner_id: self.owner_id.clone(),
            assessment_type: self.assessment_type.clone(),
            assessment_key: self.assessment_key.clone(),
            current_step: snapshot.current_step.clone(),
            form_data: snapshot.form_data.clone(),
            metadata: self.metadata.clone(),
            device_info: self.device_info.clone(),
            kind,
        }
    }
}

/// Service wiring DraftStore, ConflictGuard and RecoveryAdvisor together.
///
/// Generic over repository traits -- pillars-core never depends on
/// pillars-infra.
pub struct AssessmentService<R: DraftRepository, P: RecoveryProcedure> {
    store: Arc<DraftStore<R>>,
    guard: ConflictGuard,
    advisor: RecoveryAdvisor<P>,
}

impl<R: DraftRepository, P: RecoveryProcedure> AssessmentService<R, P> {
    pub fn new(store: DraftStore<R>, guard: ConflictGuard, advisor: RecoveryAdvisor<P>) -> Self {
        Self {
            store: Arc::new(store),
            guard,
            advisor,
        }
    }

    pub fn store(&self) -> &DraftStore<R> {
        &self.store
    }

    pub fn guard(&self) -> &ConflictGuard {
        &self.guard
    }

    /// Load everything a form needs to render.
    ///
    /// Never fails: a failed load yields `DraftStatus::Error` with the
    /// message. Recovery is only consulted when no active draft exists, and
    /// its result is returned alongside the view, never persisted.
    pub async fn open(&self, owner_id: &str, assessment_key: &str) -> DraftView {
        let now = Utc::now();
        let loaded = self.store.load(owner_id, assessment_key).await;

        let completed = match self.store.load_completed(owner_id, assessment_key).await {
            Ok(completed) => completed,
            Err(e) => {
                tracing::warn!(owner_id, assessment_key, error = %e, "failed to load completed record");
                None
            }
        };

        let status = self
            .guard
            .classify_load(&loaded, completed.as_ref(), now);

        let (draft, error) = match loaded {
            Ok(draft) => (draft, None),
            Err(e) => {
                tracing::warn!(owner_id, assessment_key, error = %e, "failed to load draft");
                (None, Some(e.to_string()))
            }
        };

        let recovered = if draft.is_none() && status != DraftStatus::Error {
            self.advisor.recover(owner_id, assessment_key).await
        } else {
            None
        };

        DraftView {
            owner_id: owner_id.to_string(),
            assessment_key: assessment_key.to_string(),
            status,
            idle_hours: draft.as_ref().map(|d| idle_hours(d, now)),
            draft,
            completed,
            recovered,
            error,
        }
    }

    /// Save on explicit user action. Errors propagate.
    pub async fn save(&self, request: SaveDraftRequest) -> Result<AssessmentDraft, DraftError> {
        self.store.save(request).await
    }

    /// Save the whole form on explicit user action and mark it saved.
    pub async fn save_form(
        &self,
        context: &SaveContext,
        form: &FormState,
    ) -> Result<AssessmentDraft, DraftError> {
        let snapshot = form.snapshot();
        let draft = self
            .store
            .save(context.request(&snapshot, SaveKind::Manual))
            .await?;
        form.mark_saved(&snapshot);
        Ok(draft)
    }

    /// Delete the active draft ("start over"). Returns `true` if one existed.
    pub async fn clear(&self, owner_id: &str, assessment_key: &str) -> Result<bool, DraftError> {
        match self.store.load(owner_id, assessment_key).await? {
            Some(draft) => {
                self.store.delete(&draft.id).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Finalize the active draft for (owner, key).
    pub async fn finalize(
        &self,
        owner_id: &str,
        assessment_key: &str,
    ) -> Result<AssessmentDraft, DraftError> {
        let draft = self
            .store
            .load(owner_id, assessment_key)
            .await?
            .ok_or_else(|| DraftError::NotFound(format!("{owner_id}/{assessment_key}")))?;
        self.store.finalize(&draft.id, Utc::now()).await
    }

    pub async fn list(&self, owner_id: &str) -> Result<Vec<DraftSummary>, DraftError> {
        self.store.list(owner_id).await
    }
}

impl<R: DraftRepository + 'static, P: RecoveryProcedure> AssessmentService<R, P> {
    /// Build the auto-save callback for one form: every flush is a
    /// `SaveKind::Auto` save of the snapshot.
    pub fn auto_save_flush(&self, context: SaveContext) -> FlushFn {
        let store = Arc::clone(&self.store);
        Arc::new(move |snapshot: FormSnapshot| {
            let store = Arc::clone(&store);
            let request = context.request(&snapshot, SaveKind::Auto);
            async move { store.save(request).await.map(|_| ()) }.boxed()
        })
    }

    /// A stopped auto-save scheduler for one form.
    pub fn scheduler(&self, context: SaveContext, interval: Duration) -> AutoSaveScheduler {
        AutoSaveScheduler::new(interval, self.auto_save_flush(context))
    }
}
