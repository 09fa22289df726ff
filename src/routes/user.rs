use rocket::serde::json::Json;
use rocket::State;
use mongodb::bson::{doc, DateTime};
use rocket_okapi::openapi;
use crate::db::DbConn;
use crate::guards::AuthGuard;
use crate::models::{UpdateProfileDto, User, UserResponse};
use crate::utils::{validate_email, ApiError, ApiResponse};

#[openapi(tag = "User")]
#[get("/user/profile")]
pub async fn get_profile(
    db: &State<DbConn>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let user = db
        .collection::<User>("users")
        .find_one(doc! { "_id": auth.user_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(ApiResponse::success(UserResponse::from(user))))
}

#[openapi(tag = "User")]
#[put("/user/profile", data = "<dto>")]
pub async fn update_profile(
    db: &State<DbConn>,
    auth: AuthGuard,
    dto: Json<UpdateProfileDto>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let mut update_doc = doc! {
        "updated_at": DateTime::now()
    };

    if let Some(ref name) = dto.name {
        update_doc.insert("name", name);
    }
    if let Some(ref email) = dto.email {
        let email = email.trim().to_lowercase();
        if !validate_email(&email) {
            return Err(ApiError::bad_request("Invalid email address"));
        }

        let taken = db
            .collection::<User>("users")
            .find_one(doc! { "email": &email, "_id": { "$ne": auth.user_id } }, None)
            .await
            .map_err(|e| ApiError::internal_error(e.to_string()))?;
        if taken.is_some() {
            return Err(ApiError::conflict("Email already in use"));
        }

        update_doc.insert("email", email);
    }

    let users = db.collection::<User>("users");
    let result = users
        .update_one(doc! { "_id": auth.user_id }, doc! { "$set": update_doc }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to update profile: {}", e)))?;

    if result.matched_count == 0 {
        return Err(ApiError::not_found("User not found"));
    }

    let user = users
        .find_one(doc! { "_id": auth.user_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(ApiResponse::success_with_message(
        "Profile updated successfully".to_string(),
        UserResponse::from(user),
    )))
}
