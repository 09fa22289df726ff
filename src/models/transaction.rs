use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars::JsonSchema;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Purchase,
    Subscription,
    Renewal,
    Refund,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

/// Billing record. Created pending when a checkout session is opened and
/// resolved by the payment webhook.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Transaction {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub plan_id: ObjectId,
    pub transaction_type: TransactionType,
    /// Final amount charged, after any promo discount.
    pub amount: f64,
    pub currency: String,
    pub promo_code: Option<String>,
    pub status: TransactionStatus,
    pub stripe_session_id: Option<String>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct TransactionResponse {
    pub id: String,
    pub transaction_type: TransactionType,
    pub amount: f64,
    pub currency: String,
    pub promo_code: Option<String>,
    pub status: TransactionStatus,
    pub created_at: String,
}

impl From<Transaction> for TransactionResponse {
    fn from(tx: Transaction) -> Self {
        TransactionResponse {
            id: tx.id.unwrap().to_hex(),
            transaction_type: tx.transaction_type,
            amount: tx.amount,
            currency: tx.currency,
            promo_code: tx.promo_code,
            status: tx.status,
            created_at: tx.created_at.try_to_rfc3339_string().unwrap_or_default(),
        }
    }
}
