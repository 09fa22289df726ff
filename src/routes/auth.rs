use rocket::serde::json::Json;
use rocket::State;
use mongodb::bson::{doc, DateTime};
use rocket_okapi::openapi;
use crate::db::DbConn;
use crate::models::{LoginDto, RefreshTokenDto, RegisterDto, User, UserResponse, UserRole};
use crate::services::{EmailService, JwtService};
use crate::utils::{validate_email, validate_password, ApiError, ApiResponse};

fn token_payload(user: &User, access: String, refresh: String) -> serde_json::Value {
    serde_json::json!({
        "user": UserResponse::from(user.clone()),
        "access_token": access,
        "refresh_token": refresh
    })
}

#[openapi(tag = "Auth")]
#[post("/auth/register", data = "<dto>")]
pub async fn register(
    db: &State<DbConn>,
    dto: Json<RegisterDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let email = dto.email.trim().to_lowercase();

    if !validate_email(&email) {
        return Err(ApiError::bad_request("Invalid email address"));
    }
    if !validate_password(&dto.password) {
        return Err(ApiError::bad_request("Password must be at least 8 characters"));
    }

    let users = db.collection::<User>("users");

    let existing = users
        .find_one(doc! { "email": &email }, None)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    if existing.is_some() {
        return Err(ApiError::conflict("An account with this email already exists"));
    }

    let password_hash = bcrypt::hash(&dto.password, bcrypt::DEFAULT_COST)
        .map_err(|e| ApiError::internal_error(format!("Password hashing failed: {}", e)))?;

    let now = DateTime::now();
    let user = User {
        id: None,
        email: email.clone(),
        password_hash,
        name: dto.name.clone(),
        role: UserRole::User,
        is_active: true,
        last_login_at: now,
        created_at: now,
        updated_at: now,
    };

    let result = users
        .insert_one(&user, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to create account: {}", e)))?;

    let user_id = result
        .inserted_id
        .as_object_id()
        .ok_or_else(|| ApiError::internal_error("Invalid user ID"))?;

    // Best effort; registration succeeds even when SMTP is down.
    EmailService::send_welcome_email(&email, user.name.as_deref().unwrap_or("")).await;

    let access = JwtService::generate_access_token(&user_id, &email, "user")
        .map_err(|e| ApiError::internal_error(e.to_string()))?;
    let refresh = JwtService::generate_refresh_token(&user_id, &email, "user")
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    let mut created = user;
    created.id = Some(user_id);

    Ok(Json(ApiResponse::success_with_message(
        "Account created successfully".to_string(),
        token_payload(&created, access, refresh),
    )))
}

#[openapi(tag = "Auth")]
#[post("/auth/login", data = "<dto>")]
pub async fn login(
    db: &State<DbConn>,
    dto: Json<LoginDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let email = dto.email.trim().to_lowercase();
    let users = db.collection::<User>("users");

    let user = users
        .find_one(doc! { "email": &email }, None)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?
        .ok_or_else(|| ApiError::unauthorized("Invalid email or password"))?;

    if !user.is_active {
        return Err(ApiError::forbidden("This account has been deactivated"));
    }

    let valid = bcrypt::verify(&dto.password, &user.password_hash)
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    if !valid {
        return Err(ApiError::unauthorized("Invalid email or password"));
    }

    let user_id = user
        .id
        .ok_or_else(|| ApiError::internal_error("User document missing _id"))?;

    users
        .update_one(
            doc! { "_id": user_id },
            doc! { "$set": { "last_login_at": DateTime::now() } },
            None,
        )
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    let role = format!("{:?}", user.role).to_lowercase();
    let access = JwtService::generate_access_token(&user_id, &email, &role)
        .map_err(|e| ApiError::internal_error(e.to_string()))?;
    let refresh = JwtService::generate_refresh_token(&user_id, &email, &role)
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    Ok(Json(ApiResponse::success(token_payload(&user, access, refresh))))
}

#[openapi(tag = "Auth")]
#[post("/auth/refresh", data = "<dto>")]
pub async fn refresh_token(
    db: &State<DbConn>,
    dto: Json<RefreshTokenDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let claims = JwtService::verify_token(&dto.refresh_token, true)
        .map_err(|_| ApiError::unauthorized("Invalid or expired refresh token"))?;

    let user_id = mongodb::bson::oid::ObjectId::parse_str(&claims.sub)
        .map_err(|_| ApiError::unauthorized("Invalid token subject"))?;

    // The account may have been deactivated since the token was issued.
    let user = db
        .collection::<User>("users")
        .find_one(doc! { "_id": user_id, "is_active": true }, None)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?
        .ok_or_else(|| ApiError::unauthorized("Account not found or deactivated"))?;

    let role = format!("{:?}", user.role).to_lowercase();
    let access = JwtService::generate_access_token(&user_id, &user.email, &role)
        .map_err(|e| ApiError::internal_error(e.to_string()))?;
    let refresh = JwtService::generate_refresh_token(&user_id, &user.email, &role)
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "access_token": access,
        "refresh_token": refresh
    }))))
}
