use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Open question-key -> answer mapping. Question sets vary per assessment
/// type, so answers stay an opaque JSON document.
pub type FormData = Map<String, Value>;

/// Metadata key recording whether a save was manual or automatic.
pub const META_SAVE_TYPE: &str = "save_type";
/// Metadata key recording the SHA-256 fingerprint of the saving device.
pub const META_DEVICE_FINGERPRINT: &str = "device_fingerprint";
/// Metadata key recording how concurrent saves are arbitrated.
pub const META_CONFLICT_RESOLUTION: &str = "conflict_resolution";
/// The only conflict strategy the store implements.
pub const LAST_WRITE_WINS: &str = "last_write_wins";

/// Unique identifier for an assessment draft, wrapping a UUID v7 (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DraftId(pub Uuid);

impl DraftId {
    /// Create a new DraftId using UUID v7.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Create a DraftId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for DraftId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DraftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DraftId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// One in-progress or completed self-assessment attempt.
///
/// At most one row with `is_draft = true` exists per
/// (`owner_id`, `assessment_key`). `version` only ever increases, and
/// `is_draft` flips from true to false exactly once (finalization).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentDraft {
    pub id: DraftId,
    /// The user who owns the draft.
    pub owner_id: String,
    /// Category label (e.g. "self_care", "welcome").
    pub assessment_type: String,
    /// Logical instance key distinguishing drafts of the same type.
    pub assessment_key: String,
    /// Free-form progress marker.
    pub current_step: String,
    /// Question-key -> answer.
    pub form_data: FormData,
    /// Save provenance (save type, device fingerprint, conflict strategy).
    pub metadata: Map<String, Value>,
    /// False once finalized.
    pub is_draft: bool,
    /// Incremented on every successful save.
    pub version: i64,
    /// Incremented only by timer-driven saves.
    pub auto_save_count: i64,
    pub started_at: DateTime<Utc>,
    pub last_saved_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Device snapshot captured at save time. Informational only.
    pub device_info: Map<String, Value>,
}

impl AssessmentDraft {
    /// The timestamp activity is measured from: the last save, or the
    /// start of the attempt if it was never saved.
    pub fn last_activity_at(&self) -> DateTime<Utc> {
        self.last_saved_at.unwrap_or(self.started_at)
    }

    /// Number of answered questions.
    pub fn answered_count(&self) -> usize {
        self.form_data.values().filter(|v| !v.is_null()).count()
    }
}

/// Provenance of a save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveKind {
    /// Explicit user action. Failures are surfaced.
    Manual,
    /// Timer-driven. Failures are logged and retried on the next tick.
    Auto,
}

impl fmt::Display for SaveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveKind::Manual => write!(f, "manual"),
            SaveKind::Auto => write!(f, "auto"),
        }
    }
}

impl FromStr for SaveKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "manual" => Ok(SaveKind::Manual),
            "auto" | "automatic" => Ok(SaveKind::Auto),
            other => Err(format!("invalid save kind: '{other}'")),
        }
    }
}

impl Default for SaveKind {
    fn default() -> Self {
        SaveKind::Manual
    }
}

/// Input of a draft save.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveDraftRequest {
    pub owner_id: String,
    pub assessment_type: String,
    pub assessment_key: String,
    #[serde(default)]
    pub current_step: String,
    #[serde(default)]
    pub form_data: FormData,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub device_info: Map<String, Value>,
    #[serde(default)]
    pub kind: SaveKind,
}

/// Fields a save writes onto an existing active draft.
///
/// Counters are not part of the patch: the repository bumps `version` (and
/// `auto_save_count` when `auto_save` is set) relative to the stored row.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftPatch {
    pub current_step: String,
    pub form_data: FormData,
    pub metadata: Map<String, Value>,
    pub device_info: Map<String, Value>,
    pub saved_at: DateTime<Utc>,
    pub auto_save: bool,
}

/// Display state of an assessment, driving UI branching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftStatus {
    /// No draft and no completed assessment.
    NotStarted,
    /// Active draft younger than the expiry threshold.
    InProgress,
    /// Active draft at or past the expiry threshold.
    Expired,
    /// A finalized record exists and no newer draft is active.
    Completed,
    /// The draft could not be loaded.
    Error,
}

impl fmt::Display for DraftStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DraftStatus::NotStarted => write!(f, "not_started"),
            DraftStatus::InProgress => write!(f, "in_progress"),
            DraftStatus::Expired => write!(f, "expired"),
            DraftStatus::Completed => write!(f, "completed"),
            DraftStatus::Error => write!(f, "error"),
        }
    }
}

impl FromStr for DraftStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "not_started" => Ok(DraftStatus::NotStarted),
            "in_progress" => Ok(DraftStatus::InProgress),
            "expired" => Ok(DraftStatus::Expired),
            "completed" => Ok(DraftStatus::Completed),
            "error" => Ok(DraftStatus::Error),
            other => Err(format!("invalid draft status: '{other}'")),
        }
    }
}

/// Wire shape returned by the remote recovery procedure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecoveryResponse {
    pub recovered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_data: Option<FormData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
    /// When the trace the answers were reconstructed from was written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovered_from: Option<DateTime<Utc>>,
}

impl RecoveryResponse {
    /// Nothing to recover.
    pub fn nothing() -> Self {
        Self::default()
    }
}

/// Answers reconstructed outside the primary draft table.
///
/// Shown to the user as a notice. Never persisted until the user saves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveredData {
    pub form_data: FormData,
    pub current_step: Option<String>,
    pub recovered_from: Option<DateTime<Utc>>,
}

/// Lightweight draft listing row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftSummary {
    pub id: DraftId,
    pub assessment_type: String,
    pub assessment_key: String,
    pub current_step: String,
    pub version: i64,
    pub answered: usize,
    pub last_saved_at: Option<DateTime<Utc>>,
}

impl From<&AssessmentDraft> for DraftSummary {
    fn from(draft: &AssessmentDraft) -> Self {
        Self {
            id: draft.id,
            assessment_type: draft.assessment_type.clone(),
            assessment_key: draft.assessment_key.clone(),
            current_step: draft.current_step.clone(),
            version: draft.version,
            answered: draft.answered_count(),
            last_saved_at: draft.last_saved_at,
        }
    }
}

/// Everything a form needs to render on mount.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftView {
    pub owner_id: String,
    pub assessment_key: String,
    pub status: DraftStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft: Option<AssessmentDraft>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<AssessmentDraft>,
    /// Best-effort recovered answers, offered as a notice.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovered: Option<RecoveredData>,
    /// Whole hours since the draft was last touched (display only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_hours: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
