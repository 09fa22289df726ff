use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars::JsonSchema;

/// Catalog entry. Immutable reference data managed by admins; purchases
/// snapshot the credit count into a UserPlan.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Plan {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub sku: String,
    pub name: String,
    pub credits: i64,
    pub price: f64,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

/// A purchased plan instance. `credits_remaining` only ever decrements;
/// the document is never deleted, only exhausted. `transaction_id` keys the
/// grant to the payment that funded it, so a retried settlement webhook
/// cannot grant the same purchase twice.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserPlan {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub plan_id: ObjectId,
    pub transaction_id: ObjectId,
    pub sku: String,
    pub plan_name: String,
    pub credits_total: i64,
    pub credits_remaining: i64,
    pub purchased_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreatePlanDto {
    pub sku: String,
    pub name: String,
    pub credits: i64,
    pub price: f64,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdatePlanDto {
    pub name: Option<String>,
    pub credits: Option<i64>,
    pub price: Option<f64>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct PlanResponse {
    pub id: String,
    pub sku: String,
    pub name: String,
    pub credits: i64,
    pub price: f64,
    pub description: Option<String>,
}

impl From<Plan> for PlanResponse {
    fn from(plan: Plan) -> Self {
        PlanResponse {
            id: plan.id.unwrap().to_hex(),
            sku: plan.sku,
            name: plan.name,
            credits: plan.credits,
            price: plan.price,
            description: plan.description,
        }
    }
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct UserPlanResponse {
    pub id: String,
    pub sku: String,
    pub plan_name: String,
    pub credits_total: i64,
    pub credits_remaining: i64,
}

impl From<UserPlan> for UserPlanResponse {
    fn from(up: UserPlan) -> Self {
        UserPlanResponse {
            id: up.id.unwrap().to_hex(),
            sku: up.sku,
            plan_name: up.plan_name,
            credits_total: up.credits_total,
            credits_remaining: up.credits_remaining,
        }
    }
}

/// Aggregate over all of a user's plans, for the dashboard header.
#[derive(Debug, Serialize, JsonSchema)]
pub struct CreditsSummary {
    pub credits_total: i64,
    pub credits_remaining: i64,
    pub credits_used: i64,
    pub plans: Vec<UserPlanResponse>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson;

    // Every credit grant carries the transaction that funded it; the
    // settlement webhook looks this field up to stay idempotent on retries.
    #[test]
    fn user_plan_document_keys_the_grant_to_its_transaction() {
        let tx_id = ObjectId::new();
        let now = DateTime::now();
        let user_plan = UserPlan {
            id: None,
            user_id: ObjectId::new(),
            plan_id: ObjectId::new(),
            transaction_id: tx_id,
            sku: "starter-150".to_string(),
            plan_name: "Starter".to_string(),
            credits_total: 150,
            credits_remaining: 150,
            purchased_at: now,
            updated_at: now,
        };

        let doc = bson::to_document(&user_plan).unwrap();
        assert_eq!(doc.get_object_id("transaction_id").unwrap(), tx_id);
        assert!(doc.get("_id").is_none());
    }
}
