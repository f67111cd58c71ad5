//! Draft classification for display.
//!
//! `ConflictGuard` maps (active draft, completed record, now) to exactly one
//! `DraftStatus`. It is pure: no I/O, no clock reads.
//!
//! The expiry boundary is inclusive: a draft whose age equals the threshold
//! is `Expired`.

use chrono::{DateTime, TimeDelta, Utc};

use pillars_types::assessment::{AssessmentDraft, DraftStatus};
use pillars_types::config::DEFAULT_EXPIRY_THRESHOLD_HOURS;
use pillars_types::error::DraftError;

/// Classifies loaded drafts into display states.
#[derive(Debug, Clone, Copy)]
pub struct ConflictGuard {
    expiry: TimeDelta,
}

impl Default for ConflictGuard {
    fn default() -> Self {
        Self::new(TimeDelta::hours(DEFAULT_EXPIRY_THRESHOLD_HOURS))
    }
}

impl ConflictGuard {
    pub fn new(expiry: TimeDelta) -> Self {
        Self { expiry }
    }

    pub fn expiry(&self) -> TimeDelta {
        self.expiry
    }

    /// Classify an active draft (if any) and a completed record (if any).
    ///
    /// An active draft wins over a completed record: a retake in progress
    /// is shown as such.
    pub fn classify(
        &self,
        draft: Option<&AssessmentDraft>,
        completed: Option<&AssessmentDraft>,
        now: DateTime<Utc>,
    ) -> DraftStatus {
        match (draft.filter(|d| d.is_draft), completed) {
            (Some(draft), _) => {
                if now - draft.last_activity_at() >= self.expiry {
                    DraftStatus::Expired
                } else {
                    DraftStatus::InProgress
                }
            }
            (None, Some(_)) => DraftStatus::Completed,
            (None, None) => DraftStatus::NotStarted,
        }
    }

    /// Classify the outcome of a load. A failed load is `Error`.
    pub fn classify_load(
        &self,
        loaded: &Result<Option<AssessmentDraft>, DraftError>,
        completed: Option<&AssessmentDraft>,
        now: DateTime<Utc>,
    ) -> DraftStatus {
        match loaded {
            Ok(draft) => self.classify(draft.as_ref(), completed, now),
            Err(_) => DraftStatus::Error,
        }
    }
}

/// Whole hours since the draft was last touched, for the "last active N
/// hours ago" notice. Display only; never used for classification.
pub fn idle_hours(draft: &AssessmentDraft, now: DateTime<Utc>) -> i64 {
    (now - draft.last_activity_at()).num_hours().max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pillars_types::assessment::DraftId;
    use serde_json::{Map, json};

    fn draft_saved_at(last_saved_at: DateTime<Utc>) -> AssessmentDraft {
        AssessmentDraft {
            id: DraftId::new(),
            owner_id: "user-1".to_string(),
            assessment_type: "self_care".to_string(),
            assessment_key: "self_care".to_string(),
            current_step: "2".to_string(),
            form_data: Map::new(),
            metadata: Map::new(),
            is_draft: true,
            version: 3,
            auto_save_count: 1,
            started_at: last_saved_at - TimeDelta::hours(1),
            last_saved_at: Some(last_saved_at),
            completed_at: None,
            device_info: Map::new(),
        }
    }

    #[test]
    fn test_nothing_is_not_started() {
        let guard = ConflictGuard::default();
        assert_eq!(guard.classify(None, None, Utc::now()), DraftStatus::NotStarted);
    }

    #[test]
    fn test_completed_without_draft() {
        let guard = ConflictGuard::default();
        let now = Utc::now();
        let mut done = draft_saved_at(now);
        done.is_draft = false;
        done.completed_at = Some(now);
        assert_eq!(guard.classify(None, Some(&done), now), DraftStatus::Completed);
    }

    #[test]
    fn test_active_draft_wins_over_completed_record() {
        let guard = ConflictGuard::default();
        let now = Utc::now();
        let mut done = draft_saved_at(now - TimeDelta::days(30));
        done.is_draft = false;
        let active = draft_saved_at(now - TimeDelta::minutes(5));
        assert_eq!(
            guard.classify(Some(&active), Some(&done), now),
            DraftStatus::InProgress
        );
    }

    #[test]
    fn test_finalized_row_passed_as_draft_is_ignored() {
        let guard = ConflictGuard::default();
        let now = Utc::now();
        let mut finalized = draft_saved_at(now);
        finalized.is_draft = false;
        assert_eq!(
            guard.classify(Some(&finalized), None, now),
            DraftStatus::NotStarted
        );
    }

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let threshold = TimeDelta::hours(DEFAULT_EXPIRY_THRESHOLD_HOURS);
        let guard = ConflictGuard::default();
        let now = Utc::now();

        let older = draft_saved_at(now - threshold - TimeDelta::seconds(1));
        let exactly = draft_saved_at(now - threshold);
        let younger = draft_saved_at(now - threshold + TimeDelta::seconds(1));

        assert_eq!(guard.classify(Some(&older), None, now), DraftStatus::Expired);
        assert_eq!(guard.classify(Some(&exactly), None, now), DraftStatus::Expired);
        assert_eq!(guard.classify(Some(&younger), None, now), DraftStatus::InProgress);
    }

    #[test]
    fn test_never_saved_draft_uses_started_at() {
        let guard = ConflictGuard::new(TimeDelta::hours(2));
        let now = Utc::now();
        let mut draft = draft_saved_at(now);
        draft.last_saved_at = None;
        draft.started_at = now - TimeDelta::hours(3);
        assert_eq!(guard.classify(Some(&draft), None, now), DraftStatus::Expired);
    }

    #[test]
    fn test_future_timestamp_counts_as_fresh() {
        let guard = ConflictGuard::default();
        let now = Utc::now();
        let draft = draft_saved_at(now + TimeDelta::minutes(10));
        assert_eq!(guard.classify(Some(&draft), None, now), DraftStatus::InProgress);
        assert_eq!(idle_hours(&draft, now), 0);
    }

    #[test]
    fn test_classification_ignores_unrelated_fields() {
        let guard = ConflictGuard::default();
        let now = Utc::now();
        let draft = draft_saved_at(now - TimeDelta::hours(5));
        let before = guard.classify(Some(&draft), None, now);

        let mut changed = draft.clone();
        changed
            .device_info
            .insert("user_agent".to_string(), json!("pillars/0.1 (linux)"));
        changed.form_data.insert("sleep".to_string(), json!(2));
        changed.metadata.insert("save_type".to_string(), json!("auto"));

        assert_eq!(guard.classify(Some(&changed), None, now), before);
        assert_eq!(guard.classify(Some(&draft), None, now), before);
    }

    #[test]
    fn test_load_error_is_error_state() {
        let guard = ConflictGuard::default();
        let loaded = Err(DraftError::Persistence("offline".to_string()));
        assert_eq!(
            guard.classify_load(&loaded, None, Utc::now()),
            DraftStatus::Error
        );
    }

    #[test]
    fn test_idle_hours_truncates() {
        let now = Utc::now();
        let draft = draft_saved_at(now - TimeDelta::minutes(150));
        assert_eq!(idle_hours(&draft, now), 2);
    }
}
