//! Durable persistence of one active draft per (owner, assessment key).
//!
//! `DraftStore` wraps a `DraftRepository` and owns the save rules: look for
//! an existing active draft, then either patch it (the repository bumps
//! `version`) or insert a fresh row with `version = 1`. Every repository call runs under a
//! timeout; a timeout is reported as a persistence failure.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;

use pillars_types::assessment::{
    AssessmentDraft, DraftId, DraftPatch, DraftSummary, LAST_WRITE_WINS,
    META_CONFLICT_RESOLUTION, META_SAVE_TYPE, SaveDraftRequest, SaveKind,
};
use pillars_types::config::DEFAULT_REMOTE_TIMEOUT_SECS;
use pillars_types::error::{DraftError, RepositoryError};

use crate::repository::draft::DraftRepository;

/// Rounds of reload-and-retry before a save gives up on a contended key.
const MAX_SAVE_ATTEMPTS: usize = 3;

/// Draft persistence service, generic over the storage backend.
pub struct DraftStore<R: DraftRepository> {
    repo: R,
    timeout: Duration,
}

impl<R: DraftRepository> DraftStore<R> {
    /// Create a store with the default remote timeout.
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            timeout: Duration::from_secs(DEFAULT_REMOTE_TIMEOUT_SECS),
        }
    }

    /// Override the timeout applied to each repository call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Access the underlying repository.
    pub fn repo(&self) -> &R {
        &self.repo
    }

    async fn timed<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = Result<T, RepositoryError>>,
    ) -> Result<T, RepositoryError> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(RepositoryError::Query(format!(
                "{op} timed out after {}ms",
                self.timeout.as_millis()
            ))),
        }
    }

    /// Fetch the newest active draft for (owner, key).
    ///
    /// `Ok(None)` when no draft exists; that is a normal outcome.
    pub async fn load(
        &self,
        owner_id: &str,
        assessment_key: &str,
    ) -> Result<Option<AssessmentDraft>, DraftError> {
        let draft = self
            .timed("load", self.repo.find_active(owner_id, assessment_key))
            .await?;
        tracing::debug!(owner_id, assessment_key, found = draft.is_some(), "loaded draft");
        Ok(draft)
    }

    /// Fetch the newest finalized record for (owner, key).
    pub async fn load_completed(
        &self,
        owner_id: &str,
        assessment_key: &str,
    ) -> Result<Option<AssessmentDraft>, DraftError> {
        Ok(self
            .timed(
                "load_completed",
                self.repo.find_completed(owner_id, assessment_key),
            )
            .await?)
    }

    /// List active drafts for an owner, most recently saved first.
    pub async fn list(&self, owner_id: &str) -> Result<Vec<DraftSummary>, DraftError> {
        let drafts = self.timed("list", self.repo.list_active(owner_id)).await?;
        Ok(drafts.iter().map(DraftSummary::from).collect())
    }

    /// Save the request as the active draft for its (owner, key).
    ///
    /// Patches the existing active draft (`version += 1`, and
    /// `auto_save_count += 1` for automatic saves) or inserts a new one with
    /// `version = 1`. The counters are bumped by the repository against the
    /// stored row, so a stale save never lowers them. If the draft was
    /// finalized or removed since it was loaded, or an insert loses a race
    /// against a concurrent save, the active draft is looked up again and the
    /// request re-applied (last write wins).
    pub async fn save(&self, request: SaveDraftRequest) -> Result<AssessmentDraft, DraftError> {
        let request = validate(request)?;
        let now = Utc::now();
        let patch = patch_for(&request, now);

        let mut existing = self
            .timed(
                "load",
                self.repo
                    .find_active(&request.owner_id, &request.assessment_key),
            )
            .await?;

        for _ in 0..MAX_SAVE_ATTEMPTS {
            if let Some(active) = existing {
                match self
                    .timed("update", self.repo.update_active(&active.id, &patch))
                    .await?
                {
                    Some(draft) => {
                        tracing::debug!(
                            draft_id = %draft.id,
                            version = draft.version,
                            auto_save_count = draft.auto_save_count,
                            kind = %request.kind,
                            "updated draft"
                        );
                        return Ok(draft);
                    }
                    None => {
                        tracing::debug!(
                            draft_id = %active.id,
                            "draft finalized or removed since load, reloading"
                        );
                    }
                }
            } else {
                let draft = new_draft(&request, now);
                match self.timed("insert", self.repo.insert(&draft)).await {
                    Ok(()) => {
                        tracing::info!(
                            draft_id = %draft.id,
                            owner_id = %draft.owner_id,
                            assessment_key = %draft.assessment_key,
                            kind = %request.kind,
                            "created draft"
                        );
                        return Ok(draft);
                    }
                    Err(RepositoryError::Conflict(_)) => {
                        tracing::debug!(
                            owner_id = %request.owner_id,
                            assessment_key = %request.assessment_key,
                            "insert raced with another save, applying as update"
                        );
                    }
                    Err(e) => return Err(e.into()),
                }
            }

            existing = self
                .timed(
                    "load",
                    self.repo
                        .find_active(&request.owner_id, &request.assessment_key),
                )
                .await?;
        }

        Err(DraftError::Persistence(format!(
            "save for {}/{} kept racing concurrent writers",
            request.owner_id, request.assessment_key
        )))
    }

    /// Mark a draft as completed.
    ///
    /// Idempotent: finalizing an already finalized record returns it
    /// unchanged and keeps the original `completed_at`.
    pub async fn finalize(
        &self,
        draft_id: &DraftId,
        completed_at: DateTime<Utc>,
    ) -> Result<AssessmentDraft, DraftError> {
        if let Some(draft) = self
            .timed("finalize", self.repo.complete(draft_id, completed_at))
            .await?
        {
            tracing::info!(%draft_id, version = draft.version, "finalized draft");
            return Ok(draft);
        }

        match self.timed("get", self.repo.get(draft_id)).await? {
            Some(draft) if !draft.is_draft => {
                tracing::debug!(%draft_id, "draft already finalized");
                Ok(draft)
            }
            _ => Err(DraftError::NotFound(draft_id.to_string())),
        }
    }

    /// Hard-delete a draft. A row that is already gone counts as success.
    pub async fn delete(&self, draft_id: &DraftId) -> Result<(), DraftError> {
        let existed = self.timed("delete", self.repo.delete(draft_id)).await?;
        if existed {
            tracing::info!(%draft_id, "deleted draft");
        } else {
            tracing::debug!(%draft_id, "draft already gone, nothing to delete");
        }
        Ok(())
    }
}

fn validate(mut request: SaveDraftRequest) -> Result<SaveDraftRequest, DraftError> {
    if request.owner_id.trim().is_empty() {
        return Err(DraftError::Invalid("owner_id cannot be empty".to_string()));
    }
    if request.assessment_key.trim().is_empty() {
        return Err(DraftError::Invalid(
            "assessment_key cannot be empty".to_string(),
        ));
    }
    request.current_step = request.current_step.trim().to_string();
    Ok(request)
}

fn stamp_metadata(metadata: &mut serde_json::Map<String, Value>, kind: SaveKind) {
    metadata.insert(META_SAVE_TYPE.to_string(), Value::String(kind.to_string()));
    metadata.insert(
        META_CONFLICT_RESOLUTION.to_string(),
        Value::String(LAST_WRITE_WINS.to_string()),
    );
}

fn patch_for(request: &SaveDraftRequest, now: DateTime<Utc>) -> DraftPatch {
    let mut metadata = request.metadata.clone();
    stamp_metadata(&mut metadata, request.kind);

    DraftPatch {
        current_step: request.current_step.clone(),
        form_data: request.form_data.clone(),
        metadata,
        device_info: request.device_info.clone(),
        saved_at: now,
        auto_save: request.kind == SaveKind::Auto,
    }
}

fn new_draft(request: &SaveDraftRequest, now: DateTime<Utc>) -> AssessmentDraft {
    let mut metadata = request.metadata.clone();
    stamp_metadata(&mut metadata, request.kind);

    AssessmentDraft {
        id: DraftId::new(),
        owner_id: request.owner_id.clone(),
        assessment_type: request.assessment_type.clone(),
        assessment_key: request.assessment_key.clone(),
        current_step: request.current_step.clone(),
        form_data: request.form_data.clone(),
        metadata,
        is_draft: true,
        version: 1,
        auto_save_count: i64::from(request.kind == SaveKind::Auto),
        started_at: now,
        last_saved_at: Some(now),
        completed_at: None,
        device_info: request.device_info.clone(),
    }
}
