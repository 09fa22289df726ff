use rocket::serde::json::Json;
use rocket::State;
use mongodb::bson::doc;
use mongodb::options::FindOptions;
use rocket_okapi::openapi;
use crate::db::DbConn;
use crate::guards::AuthGuard;
use crate::models::{CreditsSummary, Plan, PlanResponse, UserPlan, UserPlanResponse};
use crate::utils::{ApiError, ApiResponse};

#[openapi(tag = "Plans")]
#[get("/plans")]
pub async fn get_all_plans(
    db: &State<DbConn>,
) -> Result<Json<ApiResponse<Vec<PlanResponse>>>, ApiError> {
    let find_options = FindOptions::builder().sort(doc! { "price": 1 }).build();

    let mut cursor = db
        .collection::<Plan>("plans")
        .find(doc! { "is_active": true }, find_options)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?;

    let mut plans = Vec::new();
    while cursor
        .advance()
        .await
        .map_err(|e| ApiError::internal_error(format!("Cursor error: {}", e)))?
    {
        let plan = cursor
            .deserialize_current()
            .map_err(|e| ApiError::internal_error(format!("Deserialization error: {}", e)))?;
        plans.push(PlanResponse::from(plan));
    }

    Ok(Json(ApiResponse::success(plans)))
}

#[openapi(tag = "Plans")]
#[get("/plans/mine")]
pub async fn get_my_plans(
    db: &State<DbConn>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<Vec<UserPlanResponse>>>, ApiError> {
    let find_options = FindOptions::builder().sort(doc! { "purchased_at": -1 }).build();

    let mut cursor = db
        .collection::<UserPlan>("user_plans")
        .find(doc! { "user_id": auth.user_id }, find_options)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?;

    let mut plans = Vec::new();
    while cursor
        .advance()
        .await
        .map_err(|e| ApiError::internal_error(format!("Cursor error: {}", e)))?
    {
        let plan = cursor
            .deserialize_current()
            .map_err(|e| ApiError::internal_error(format!("Deserialization error: {}", e)))?;
        plans.push(UserPlanResponse::from(plan));
    }

    Ok(Json(ApiResponse::success(plans)))
}

/// Dashboard aggregate across every plan the user has purchased.
#[openapi(tag = "Plans")]
#[get("/plans/credits")]
pub async fn credits_summary(
    db: &State<DbConn>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<CreditsSummary>>, ApiError> {
    let mut cursor = db
        .collection::<UserPlan>("user_plans")
        .find(doc! { "user_id": auth.user_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?;

    let mut plans = Vec::new();
    let mut credits_total = 0i64;
    let mut credits_remaining = 0i64;

    while cursor
        .advance()
        .await
        .map_err(|e| ApiError::internal_error(format!("Cursor error: {}", e)))?
    {
        let plan = cursor
            .deserialize_current()
            .map_err(|e| ApiError::internal_error(format!("Deserialization error: {}", e)))?;
        credits_total += plan.credits_total;
        credits_remaining += plan.credits_remaining;
        plans.push(UserPlanResponse::from(plan));
    }

    Ok(Json(ApiResponse::success(CreditsSummary {
        credits_total,
        credits_remaining,
        credits_used: credits_total - credits_remaining,
        plans,
    })))
}
