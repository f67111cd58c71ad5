//! Best-effort recovery of answers lost outside the draft table.
//!
//! Consulted only when no active draft exists. Any failure of the
//! recovery procedure is logged and treated as "nothing to recover".

use std::time::Duration;

use pillars_types::assessment::{RecoveredData, RecoveryResponse};
use pillars_types::config::DEFAULT_REMOTE_TIMEOUT_SECS;
use pillars_types::error::DraftError;

use crate::repository::recovery::RecoveryProcedure;

pub struct RecoveryAdvisor<P: RecoveryProcedure> {
    procedure: P,
    timeout: Duration,
}

impl<P: RecoveryProcedure> RecoveryAdvisor<P> {
    pub fn new(procedure: P) -> Self {
        Self {
            procedure,
            timeout: Duration::from_secs(DEFAULT_REMOTE_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Ask the recovery procedure for reconstructable answers.
    ///
    /// Never fails; `None` covers both "nothing found" and "procedure failed".
    pub async fn recover(&self, owner_id: &str, assessment_key: &str) -> Option<RecoveredData> {
        match self.try_recover(owner_id, assessment_key).await {
            Ok(recovered) => {
                if recovered.is_some() {
                    tracing::info!(owner_id, assessment_key, "recovered orphaned answers");
                }
                recovered
            }
            Err(e) => {
                tracing::warn!(owner_id, assessment_key, error = %e, "draft recovery failed");
                None
            }
        }
    }

    async fn try_recover(
        &self,
        owner_id: &str,
        assessment_key: &str,
    ) -> Result<Option<RecoveredData>, DraftError> {
        let response = tokio::time::timeout(
            self.timeout,
            self.procedure.recover(owner_id, assessment_key),
        )
        .await
        .map_err(|_| DraftError::Recovery("recovery procedure timed out".to_string()))?
        .map_err(|e| DraftError::Recovery(e.to_string()))?;

        Ok(into_recovered(response))
    }
}

fn into_recovered(response: RecoveryResponse) -> Option<RecoveredData> {
    if !response.recovered {
        return None;
    }
    let form_data = response.form_data.filter(|data| !data.is_empty())?;
    Some(RecoveredData {
        form_data,
        current_step: response.current_step,
        recovered_from: response.recovered_from,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CannedRecovery;
    use pillars_types::assessment::FormData;
    use pillars_types::error::RepositoryError;
    use serde_json::json;

    fn answers() -> FormData {
        serde_json::from_value(json!({"sleep": 2, "nutrition": "mostly ok"})).unwrap()
    }

    #[tokio::test]
    async fn test_recovered_answers_are_returned() {
        let advisor = RecoveryAdvisor::new(CannedRecovery::returning(RecoveryResponse {
            recovered: true,
            form_data: Some(answers()),
            current_step: Some("4".to_string()),
            recovered_from: None,
        }));

        let recovered = advisor.recover("user-1", "self_care").await.unwrap();
        assert_eq!(recovered.form_data, answers());
        assert_eq!(recovered.current_step.as_deref(), Some("4"));
    }

    #[tokio::test]
    async fn test_not_recovered_is_none() {
        let advisor = RecoveryAdvisor::new(CannedRecovery::returning(RecoveryResponse::nothing()));
        assert!(advisor.recover("user-1", "self_care").await.is_none());
    }

    #[tokio::test]
    async fn test_recovered_flag_without_answers_is_none() {
        let advisor = RecoveryAdvisor::new(CannedRecovery::returning(RecoveryResponse {
            recovered: true,
            form_data: Some(FormData::new()),
            ..Default::default()
        }));
        assert!(advisor.recover("user-1", "self_care").await.is_none());
    }

    #[tokio::test]
    async fn test_procedure_failure_is_swallowed() {
        let procedure = CannedRecovery::failing();
        let advisor = RecoveryAdvisor::new(procedure.clone());
        assert!(advisor.recover("user-1", "self_care").await.is_none());
        assert_eq!(procedure.calls(), 1);
    }

    struct StalledProcedure;

    impl RecoveryProcedure for StalledProcedure {
        async fn recover(
            &self,
            _owner_id: &str,
            _assessment_key: &str,
        ) -> Result<RecoveryResponse, RepositoryError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_swallowed() {
        let advisor = RecoveryAdvisor::new(StalledProcedure).with_timeout(Duration::from_secs(5));
        assert!(advisor.recover("user-1", "self_care").await.is_none());
    }
}
