//! Assessment draft HTTP handlers.
//!
//! Endpoints:
//! - GET    /api/v1/owners/{owner}/assessments/{key}          - Draft view (status, draft, recovery)
//! - PUT    /api/v1/owners/{owner}/assessments/{key}/draft    - Save the draft
//! - DELETE /api/v1/owners/{owner}/assessments/{key}/draft    - Discard the draft
//! - POST   /api/v1/owners/{owner}/assessments/{key}/finalize - Finalize the draft
//! - POST   /api/v1/owners/{owner}/assessments/{key}/recover  - Look for lost answers
//! - GET    /api/v1/owners/{owner}/drafts                     - List active drafts

use std::time::Instant;

use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use uuid::Uuid;

use pillars_infra::device::device_metadata;
use pillars_types::assessment::{
    AssessmentDraft, DraftSummary, DraftView, FormData, RecoveredData, SaveDraftRequest, SaveKind,
};

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// Request body for saving a draft.
#[derive(Debug, Deserialize)]
pub struct SaveDraftBody {
    /// Category label; defaults to the assessment key.
    pub assessment_type: Option<String>,
    #[serde(default)]
    pub current_step: String,
    #[serde(default)]
    pub form_data: FormData,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Client device snapshot. Fingerprinted into the metadata when present.
    #[serde(default)]
    pub device_info: Map<String, Value>,
    #[serde(default)]
    pub kind: SaveKind,
}

impl SaveDraftBody {
    fn into_request(self, owner_id: String, assessment_key: String) -> Result<SaveDraftRequest, AppError> {
        let assessment_type = match self.assessment_type {
            Some(t) if t.trim().is_empty() => {
                return Err(AppError::Validation(
                    "assessment_type must not be blank".to_string(),
                ));
            }
            Some(t) => t,
            None => assessment_key.clone(),
        };

        let mut metadata = self.metadata;
        if !self.device_info.is_empty() {
            metadata.extend(device_metadata(&self.device_info));
        }

        Ok(SaveDraftRequest {
            owner_id,
            assessment_type,
            assessment_key,
            current_step: self.current_step,
            form_data: self.form_data,
            metadata,
            device_info: self.device_info,
            kind: self.kind,
        })
    }
}

fn assessment_href(owner: &str, key: &str) -> String {
    format!("/api/v1/owners/{owner}/assessments/{key}")
}

/// GET /api/v1/owners/{owner}/assessments/{key} - Everything a form needs on mount.
pub async fn get_assessment(
    State(state): State<AppState>,
    Path((owner, key)): Path<(String, String)>,
) -> Result<Json<ApiResponse<DraftView>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let view = state.assessment_service.open(&owner, &key).await;

    let elapsed = start.elapsed().as_millis() as u64;
    let href = assessment_href(&owner, &key);
    Ok(Json(
        ApiResponse::success(view, request_id, elapsed)
            .with_link("self", &href)
            .with_link("draft", &format!("{href}/draft")),
    ))
}

/// PUT /api/v1/owners/{owner}/assessments/{key}/draft - Save (create or update) the draft.
pub async fn save_draft(
    State(state): State<AppState>,
    Path((owner, key)): Path<(String, String)>,
    Json(body): Json<SaveDraftBody>,
) -> Result<Json<ApiResponse<AssessmentDraft>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let request = body.into_request(owner.clone(), key.clone())?;
    let draft = state.assessment_service.save(request).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(
        ApiResponse::success(draft, request_id, elapsed)
            .with_link("assessment", &assessment_href(&owner, &key)),
    ))
}

/// DELETE /api/v1/owners/{owner}/assessments/{key}/draft - Discard the draft ("start over").
pub async fn clear_draft(
    State(state): State<AppState>,
    Path((owner, key)): Path<(String, String)>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let deleted = state.assessment_service.clear(&owner, &key).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(
        json!({ "deleted": deleted }),
        request_id,
        elapsed,
    )))
}

/// POST /api/v1/owners/{owner}/assessments/{key}/finalize - Mark the draft completed.
pub async fn finalize_draft(
    State(state): State<AppState>,
    Path((owner, key)): Path<(String, String)>,
) -> Result<Json<ApiResponse<AssessmentDraft>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let draft = state.assessment_service.finalize(&owner, &key).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(draft, request_id, elapsed)))
}

/// POST /api/v1/owners/{owner}/assessments/{key}/recover - Offer answers lost outside the draft table.
///
/// Nothing is written; the client saves the answers explicitly if the user accepts them.
pub async fn recover_draft(
    State(state): State<AppState>,
    Path((owner, key)): Path<(String, String)>,
) -> Result<Json<ApiResponse<Option<RecoveredData>>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let view = state.assessment_service.open(&owner, &key).await;
    if let Some(error) = view.error {
        return Err(AppError::Internal(error));
    }

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(view.recovered, request_id, elapsed)))
}

/// GET /api/v1/owners/{owner}/drafts - List active drafts.
pub async fn list_drafts(
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> Result<Json<ApiResponse<Vec<DraftSummary>>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let drafts = state.assessment_service.list(&owner).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(
        ApiResponse::success(drafts, request_id, elapsed)
            .with_link("self", &format!("/api/v1/owners/{owner}/drafts")),
    ))
}
