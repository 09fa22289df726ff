use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars::JsonSchema;

/// Applications per batch. Plans are sold in multiples of this, but nothing
/// cross-checks plan credit counts against it.
pub const BATCH_CAPACITY: i64 = 150;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Pending => "pending",
            BatchStatus::Processing => "processing",
            BatchStatus::Completed => "completed",
            BatchStatus::Failed => "failed",
        }
    }

    /// Forward-only lifecycle: pending → processing → completed, with
    /// failed reachable from either non-terminal state. Admin override
    /// bypasses this check at the route level.
    pub fn can_transition(self, to: BatchStatus) -> bool {
        matches!(
            (self, to),
            (BatchStatus::Pending, BatchStatus::Processing)
                | (BatchStatus::Pending, BatchStatus::Failed)
                | (BatchStatus::Processing, BatchStatus::Completed)
                | (BatchStatus::Processing, BatchStatus::Failed)
        )
    }
}

/// Which batch a user's next applications land in. Batches fill strictly in
/// order, so the number falls out of the existing application count.
pub fn batch_number_for(existing_application_count: i64) -> i64 {
    existing_application_count / BATCH_CAPACITY + 1
}

/// Aggregate over Applications sharing (user_id, batch_number). Created
/// lazily when the first application of a new batch number is inserted;
/// status is driven by admin action only.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ApplicationBatch {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub batch_number: i64,
    pub total_applications: i64,
    pub status: BatchStatus,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateBatchStatusDto {
    pub status: BatchStatus,
    /// Bypasses the forward-only transition rule.
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct BatchResponse {
    pub id: String,
    pub batch_number: i64,
    pub total_applications: i64,
    pub capacity: i64,
    pub status: BatchStatus,
}

impl From<ApplicationBatch> for BatchResponse {
    fn from(batch: ApplicationBatch) -> Self {
        BatchResponse {
            id: batch.id.unwrap().to_hex(),
            batch_number: batch.batch_number,
            total_applications: batch.total_applications,
            capacity: BATCH_CAPACITY,
            status: batch.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_batch_starts_at_one() {
        assert_eq!(batch_number_for(0), 1);
        assert_eq!(batch_number_for(1), 1);
        assert_eq!(batch_number_for(149), 1);
    }

    #[test]
    fn new_batch_opens_at_capacity() {
        assert_eq!(batch_number_for(150), 2);
        assert_eq!(batch_number_for(299), 2);
        assert_eq!(batch_number_for(300), 3);
    }

    #[test]
    fn forward_transitions_allowed() {
        assert!(BatchStatus::Pending.can_transition(BatchStatus::Processing));
        assert!(BatchStatus::Processing.can_transition(BatchStatus::Completed));
        assert!(BatchStatus::Pending.can_transition(BatchStatus::Failed));
        assert!(BatchStatus::Processing.can_transition(BatchStatus::Failed));
    }

    #[test]
    fn backward_and_terminal_transitions_rejected() {
        assert!(!BatchStatus::Processing.can_transition(BatchStatus::Pending));
        assert!(!BatchStatus::Completed.can_transition(BatchStatus::Processing));
        assert!(!BatchStatus::Completed.can_transition(BatchStatus::Failed));
        assert!(!BatchStatus::Failed.can_transition(BatchStatus::Pending));
        assert!(!BatchStatus::Pending.can_transition(BatchStatus::Completed));
    }
}
