use rocket::serde::json::Json;
use rocket::State;
use mongodb::bson::doc;
use mongodb::options::FindOptions;
use rocket_okapi::openapi;
use crate::db::DbConn;
use crate::guards::AuthGuard;
use crate::models::{ApplicationBatch, BatchResponse};
use crate::utils::{ApiError, ApiResponse};

#[openapi(tag = "Batches")]
#[get("/batches")]
pub async fn get_my_batches(
    db: &State<DbConn>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<Vec<BatchResponse>>>, ApiError> {
    let find_options = FindOptions::builder().sort(doc! { "batch_number": 1 }).build();

    let mut cursor = db
        .collection::<ApplicationBatch>("application_batches")
        .find(doc! { "user_id": auth.user_id }, find_options)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?;

    let mut batches = Vec::new();
    while cursor
        .advance()
        .await
        .map_err(|e| ApiError::internal_error(format!("Cursor error: {}", e)))?
    {
        let batch = cursor
            .deserialize_current()
            .map_err(|e| ApiError::internal_error(format!("Deserialization error: {}", e)))?;
        batches.push(BatchResponse::from(batch));
    }

    Ok(Json(ApiResponse::success(batches)))
}

#[openapi(tag = "Batches")]
#[get("/batches/<batch_number>")]
pub async fn get_my_batch(
    db: &State<DbConn>,
    auth: AuthGuard,
    batch_number: i64,
) -> Result<Json<ApiResponse<BatchResponse>>, ApiError> {
    let batch = db
        .collection::<ApplicationBatch>("application_batches")
        .find_one(
            doc! { "user_id": auth.user_id, "batch_number": batch_number },
            None,
        )
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?
        .ok_or_else(|| ApiError::not_found("Batch not found"))?;

    Ok(Json(ApiResponse::success(BatchResponse::from(batch))))
}
