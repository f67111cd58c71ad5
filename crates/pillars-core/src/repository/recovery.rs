//! Recovery procedure port.

use pillars_types::assessment::RecoveryResponse;
use pillars_types::error::RepositoryError;

/// Server-side procedure that searches secondary data trails (audit/event
/// logs) for answers of a draft that no longer exists in the primary table.
pub trait RecoveryProcedure: Send + Sync {
    /// Look for recoverable answers for (owner, key).
    ///
    /// `RecoveryResponse { recovered: false, .. }` means nothing was found.
    fn recover(
        &self,
        owner_id: &str,
        assessment_key: &str,
    ) -> impl std::future::Future<Output = Result<RecoveryResponse, RepositoryError>> + Send;
}
