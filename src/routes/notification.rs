use rocket::serde::json::Json;
use rocket::State;
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::options::FindOptions;
use rocket_okapi::openapi;
use crate::db::DbConn;
use crate::guards::AuthGuard;
use crate::models::{Notification, NotificationResponse};
use crate::utils::{ApiError, ApiResponse};

#[openapi(tag = "Notifications")]
#[get("/notifications")]
pub async fn get_notifications(
    db: &State<DbConn>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let find_options = FindOptions::builder()
        .sort(doc! { "created_at": -1 })
        .limit(100)
        .build();

    let mut cursor = db
        .collection::<Notification>("notifications")
        .find(doc! { "user_id": auth.user_id }, find_options)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?;

    let mut notifications = Vec::new();
    while cursor
        .advance()
        .await
        .map_err(|e| ApiError::internal_error(format!("Cursor error: {}", e)))?
    {
        let n = cursor
            .deserialize_current()
            .map_err(|e| ApiError::internal_error(format!("Deserialization error: {}", e)))?;
        notifications.push(NotificationResponse::from(n));
    }

    let unread = db
        .collection::<Notification>("notifications")
        .count_documents(doc! { "user_id": auth.user_id, "read": false }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Count error: {}", e)))?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "notifications": notifications,
        "unread": unread
    }))))
}

#[openapi(tag = "Notifications")]
#[put("/notifications/<notification_id>/read")]
pub async fn mark_read(
    db: &State<DbConn>,
    auth: AuthGuard,
    notification_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let object_id = ObjectId::parse_str(&notification_id)
        .map_err(|_| ApiError::bad_request("Invalid notification ID"))?;

    let result = db
        .collection::<Notification>("notifications")
        .update_one(
            doc! { "_id": object_id, "user_id": auth.user_id },
            doc! { "$set": { "read": true } },
            None,
        )
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    if result.matched_count == 0 {
        return Err(ApiError::not_found("Notification not found"));
    }

    Ok(Json(ApiResponse::success(serde_json::json!({
        "message": "Notification marked as read"
    }))))
}

#[openapi(tag = "Notifications")]
#[put("/notifications/read-all")]
pub async fn mark_all_read(
    db: &State<DbConn>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let result = db
        .collection::<Notification>("notifications")
        .update_many(
            doc! { "user_id": auth.user_id, "read": false },
            doc! { "$set": { "read": true } },
            None,
        )
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "message": "All notifications marked as read",
        "updated": result.modified_count
    }))))
}
