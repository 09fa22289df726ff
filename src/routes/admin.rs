use rocket::serde::json::Json;
use rocket::State;
use mongodb::bson::{doc, oid::ObjectId, DateTime};
use mongodb::options::FindOptions;
use rocket_okapi::openapi;
use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::Deserialize;

use crate::db::DbConn;
use crate::guards::AdminGuard;
use crate::models::{
    Application, ApplicationBatch, BatchResponse, BatchStatus, CreatePlanDto, CreatePromoCodeDto,
    Notification, NotificationKind, Plan, PlanResponse, PromoCode, SubmissionMode,
    UpdateBatchStatusDto, UpdatePlanDto, User, UserResponse,
};
use crate::routes::application::{refund_credit, register_in_batch, try_deduct_credit};
use crate::services::EmailService;
use crate::utils::{parse_applications_csv, ApiError, ApiResponse};

// ============================================================================
// USERS
// ============================================================================

#[derive(FromForm, Deserialize, JsonSchema)]
pub struct ListUsersQuery {
    pub email: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[openapi(tag = "Admin")]
#[get("/admin/users?<query..>")]
pub async fn get_all_users(
    db: &State<DbConn>,
    _admin: AdminGuard,
    query: ListUsersQuery,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).min(100);
    let skip = (page - 1) * limit;

    let mut filter = doc! {};
    if let Some(ref email) = query.email {
        filter.insert("email", doc! { "$regex": email, "$options": "i" });
    }

    let find_options = FindOptions::builder()
        .skip(skip as u64)
        .limit(limit)
        .sort(doc! { "created_at": -1 })
        .build();

    let mut cursor = db
        .collection::<User>("users")
        .find(filter.clone(), find_options)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?;

    let mut users = Vec::new();
    while cursor
        .advance()
        .await
        .map_err(|e| ApiError::internal_error(format!("Cursor error: {}", e)))?
    {
        let user = cursor
            .deserialize_current()
            .map_err(|e| ApiError::internal_error(format!("Deserialization error: {}", e)))?;
        users.push(UserResponse::from(user));
    }

    let total = db
        .collection::<User>("users")
        .count_documents(filter, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Count error: {}", e)))?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "users": users,
        "pagination": {
            "page": page,
            "limit": limit,
            "total": total,
            "pages": (total as f64 / limit as f64).ceil() as i64,
        }
    }))))
}

// ============================================================================
// BULK CSV UPLOAD (on behalf of a user)
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UploadApplicationsCsvDto {
    /// Base64-encoded CSV with columns:
    /// Job ID, Job Title, Company, Application Date, Status
    pub data: String,
}

#[openapi(tag = "Admin")]
#[post("/admin/users/<user_id>/applications/csv", data = "<dto>")]
pub async fn upload_applications_csv(
    db: &State<DbConn>,
    _admin: AdminGuard,
    user_id: String,
    dto: Json<UploadApplicationsCsvDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    use data_encoding::BASE64;

    let user_oid =
        ObjectId::parse_str(&user_id).map_err(|_| ApiError::bad_request("Invalid user ID"))?;

    let user = db
        .collection::<User>("users")
        .find_one(doc! { "_id": user_oid }, None)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let bytes = BASE64
        .decode(dto.data.as_bytes())
        .map_err(|_| ApiError::bad_request("Invalid base64 data"))?;

    // Every row must parse before anything is inserted.
    let rows = parse_applications_csv(&bytes).map_err(ApiError::bad_request)?;

    let applications = db.collection::<Application>("applications");
    let mut inserted = 0usize;
    let mut touched_batches: Vec<i64> = Vec::new();

    for row in &rows {
        // Per-row deduction; stop cleanly when the user runs dry. A database
        // error is not exhaustion and aborts the whole upload instead.
        let user_plan = match try_deduct_credit(db, user_oid).await? {
            Some(plan) => plan,
            None => break,
        };

        let batch_number = register_in_batch(db, user_oid).await?;
        if !touched_batches.contains(&batch_number) {
            touched_batches.push(batch_number);
        }

        let applied_millis = row
            .applied_on
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| ApiError::internal_error("Invalid date"))?
            .and_utc()
            .timestamp_millis();

        let now = DateTime::now();
        let application = Application {
            id: None,
            user_id: user_oid,
            user_plan_id: user_plan.id.unwrap(),
            batch_number,
            job_id: row.job_id.clone(),
            job_title: row.job_title.clone(),
            company: row.company.clone(),
            applied_at: DateTime::from_millis(applied_millis),
            status: row.status,
            submission_mode: SubmissionMode::Automated,
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = applications.insert_one(&application, None).await {
            refund_credit(db, application.user_plan_id).await;
            return Err(ApiError::internal_error(format!("Insert failed: {}", e)));
        }
        inserted += 1;
    }

    // Counter drift from the incremental $inc path gets squashed here.
    for batch_number in &touched_batches {
        recompute_batch_total(db, user_oid, *batch_number).await?;
    }

    let skipped = rows.len() - inserted;
    if inserted == 0 {
        return Err(ApiError::payment_required(format!(
            "{} has no remaining credits; nothing was uploaded",
            user.email
        )));
    }

    Ok(Json(ApiResponse::success_with_message(
        format!(
            "Uploaded {} applications for {}{}",
            inserted,
            user.email,
            if skipped > 0 {
                format!(" ({} rows skipped: credits exhausted)", skipped)
            } else {
                String::new()
            }
        ),
        serde_json::json!({
            "inserted": inserted,
            "skipped": skipped,
            "batches": touched_batches
        }),
    )))
}

// ============================================================================
// BATCHES
// ============================================================================

async fn recompute_batch_total(
    db: &DbConn,
    user_id: ObjectId,
    batch_number: i64,
) -> Result<i64, ApiError> {
    let count = db
        .collection::<Application>("applications")
        .count_documents(doc! { "user_id": user_id, "batch_number": batch_number }, None)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))? as i64;

    db.collection::<ApplicationBatch>("application_batches")
        .update_one(
            doc! { "user_id": user_id, "batch_number": batch_number },
            doc! { "$set": { "total_applications": count, "updated_at": DateTime::now() } },
            None,
        )
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    Ok(count)
}

#[derive(FromForm, Deserialize, JsonSchema)]
pub struct ListBatchesQuery {
    pub user_id: Option<String>,
    pub status: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[openapi(tag = "Admin")]
#[get("/admin/batches?<query..>")]
pub async fn get_all_batches(
    db: &State<DbConn>,
    _admin: AdminGuard,
    query: ListBatchesQuery,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).min(100);
    let skip = (page - 1) * limit;

    let mut filter = doc! {};
    if let Some(ref user_id) = query.user_id {
        let oid = ObjectId::parse_str(user_id)
            .map_err(|_| ApiError::bad_request("Invalid user ID"))?;
        filter.insert("user_id", oid);
    }
    if let Some(ref status) = query.status {
        filter.insert("status", status.to_lowercase());
    }

    let find_options = FindOptions::builder()
        .skip(skip as u64)
        .limit(limit)
        .sort(doc! { "updated_at": -1 })
        .build();

    let mut cursor = db
        .collection::<ApplicationBatch>("application_batches")
        .find(filter.clone(), find_options)
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

    let total = db
        .collection::<ApplicationBatch>("application_batches")
        .count_documents(filter, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Count error: {}", e)))?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "batches": batches,
        "pagination": {
            "page": page,
            "limit": limit,
            "total": total,
            "pages": (total as f64 / limit as f64).ceil() as i64,
        }
    }))))
}

#[openapi(tag = "Admin")]
#[put("/admin/users/<user_id>/batches/<batch_number>/status", data = "<dto>")]
pub async fn update_batch_status(
    db: &State<DbConn>,
    _admin: AdminGuard,
    user_id: String,
    batch_number: i64,
    dto: Json<UpdateBatchStatusDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let user_oid =
        ObjectId::parse_str(&user_id).map_err(|_| ApiError::bad_request("Invalid user ID"))?;

    let batches = db.collection::<ApplicationBatch>("application_batches");
    let batch = batches
        .find_one(doc! { "user_id": user_oid, "batch_number": batch_number }, None)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?
        .ok_or_else(|| ApiError::not_found("Batch not found"))?;

    if !dto.force && !batch.status.can_transition(dto.status) {
        return Err(ApiError::bad_request(format!(
            "Cannot move batch from '{}' to '{}' (use force to override)",
            batch.status.as_str(),
            dto.status.as_str()
        )));
    }

    batches
        .update_one(
            doc! { "user_id": user_oid, "batch_number": batch_number },
            doc! { "$set": {
                "status": dto.status.as_str(),
                "updated_at": DateTime::now()
            } },
            None,
        )
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    if dto.status == BatchStatus::Completed {
        let notification = Notification::new(
            user_oid,
            NotificationKind::Batch,
            "Batch completed",
            &format!(
                "Batch #{} is done: all {} applications submitted",
                batch_number, batch.total_applications
            ),
        );
        db.collection::<Notification>("notifications")
            .insert_one(&notification, None)
            .await
            .map_err(|e| ApiError::internal_error(e.to_string()))?;

        if let Ok(Some(user)) = db
            .collection::<User>("users")
            .find_one(doc! { "_id": user_oid }, None)
            .await
        {
            EmailService::send_batch_completed_email(
                &user.email,
                batch_number,
                batch.total_applications,
            )
            .await;
        }
    }

    Ok(Json(ApiResponse::success(serde_json::json!({
        "message": "Batch status updated",
        "status": dto.status.as_str()
    }))))
}

#[openapi(tag = "Admin")]
#[post("/admin/users/<user_id>/batches/<batch_number>/recompute")]
pub async fn recompute_batch(
    db: &State<DbConn>,
    _admin: AdminGuard,
    user_id: String,
    batch_number: i64,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let user_oid =
        ObjectId::parse_str(&user_id).map_err(|_| ApiError::bad_request("Invalid user ID"))?;

    let total = recompute_batch_total(db, user_oid, batch_number).await?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "batch_number": batch_number,
        "total_applications": total
    }))))
}

// ============================================================================
// PLAN CATALOG
// ============================================================================

#[openapi(tag = "Admin")]
#[post("/admin/plans", data = "<dto>")]
pub async fn create_plan(
    db: &State<DbConn>,
    _admin: AdminGuard,
    dto: Json<CreatePlanDto>,
) -> Result<Json<ApiResponse<PlanResponse>>, ApiError> {
    if dto.credits <= 0 {
        return Err(ApiError::bad_request("credits must be positive"));
    }
    if dto.price < 0.0 {
        return Err(ApiError::bad_request("price cannot be negative"));
    }

    let plans = db.collection::<Plan>("plans");

    let existing = plans
        .find_one(doc! { "sku": &dto.sku }, None)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;
    if existing.is_some() {
        return Err(ApiError::conflict("A plan with this SKU already exists"));
    }

    let now = DateTime::now();
    let plan = Plan {
        id: None,
        sku: dto.sku.clone(),
        name: dto.name.clone(),
        credits: dto.credits,
        price: dto.price,
        description: dto.description.clone(),
        is_active: true,
        created_at: now,
        updated_at: now,
    };

    let result = plans
        .insert_one(&plan, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to create plan: {}", e)))?;

    let mut created = plan;
    created.id = result.inserted_id.as_object_id();

    Ok(Json(ApiResponse::success_with_message(
        "Plan created".to_string(),
        PlanResponse::from(created),
    )))
}

#[openapi(tag = "Admin")]
#[put("/admin/plans/<plan_id>", data = "<dto>")]
pub async fn update_plan(
    db: &State<DbConn>,
    _admin: AdminGuard,
    plan_id: String,
    dto: Json<UpdatePlanDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let object_id =
        ObjectId::parse_str(&plan_id).map_err(|_| ApiError::bad_request("Invalid plan ID"))?;

    let mut update_doc = doc! {
        "updated_at": DateTime::now()
    };

    if let Some(ref name) = dto.name {
        update_doc.insert("name", name);
    }
    if let Some(credits) = dto.credits {
        if credits <= 0 {
            return Err(ApiError::bad_request("credits must be positive"));
        }
        update_doc.insert("credits", credits);
    }
    if let Some(price) = dto.price {
        if price < 0.0 {
            return Err(ApiError::bad_request("price cannot be negative"));
        }
        update_doc.insert("price", price);
    }
    if let Some(ref description) = dto.description {
        update_doc.insert("description", description);
    }
    if let Some(is_active) = dto.is_active {
        update_doc.insert("is_active", is_active);
    }

    let result = db
        .collection::<Plan>("plans")
        .update_one(doc! { "_id": object_id }, doc! { "$set": update_doc }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to update plan: {}", e)))?;

    if result.matched_count == 0 {
        return Err(ApiError::not_found("Plan not found"));
    }

    Ok(Json(ApiResponse::success(serde_json::json!({
        "message": "Plan updated"
    }))))
}

#[openapi(tag = "Admin")]
#[delete("/admin/plans/<plan_id>")]
pub async fn delete_plan(
    db: &State<DbConn>,
    _admin: AdminGuard,
    plan_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let object_id =
        ObjectId::parse_str(&plan_id).map_err(|_| ApiError::bad_request("Invalid plan ID"))?;

    // Purchased UserPlans snapshot their credits, so retiring the catalog
    // entry is just a deactivation.
    let result = db
        .collection::<Plan>("plans")
        .update_one(
            doc! { "_id": object_id },
            doc! { "$set": { "is_active": false, "updated_at": DateTime::now() } },
            None,
        )
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    if result.matched_count == 0 {
        return Err(ApiError::not_found("Plan not found"));
    }

    Ok(Json(ApiResponse::success(serde_json::json!({
        "message": "Plan deactivated"
    }))))
}

// ============================================================================
// PROMO CODES
// ============================================================================

fn parse_promo_date(raw: &str) -> Result<DateTime, ApiError> {
    let raw = raw.trim();

    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Ok(DateTime::from_millis(dt.timestamp_millis()));
    }

    let date = chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ApiError::bad_request(format!("Invalid date '{}'", raw)))?;
    let millis = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| ApiError::internal_error("Invalid date"))?
        .and_utc()
        .timestamp_millis();
    Ok(DateTime::from_millis(millis))
}

#[openapi(tag = "Admin")]
#[post("/admin/promos", data = "<dto>")]
pub async fn create_promo_code(
    db: &State<DbConn>,
    _admin: AdminGuard,
    dto: Json<CreatePromoCodeDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let code = dto.code.trim().to_uppercase();
    if code.is_empty() {
        return Err(ApiError::bad_request("code is required"));
    }
    if dto.value <= 0.0 {
        return Err(ApiError::bad_request("value must be positive"));
    }
    if matches!(dto.discount_type, crate::models::DiscountType::Percentage) && dto.value > 100.0 {
        return Err(ApiError::bad_request("percentage discount cannot exceed 100"));
    }

    let promos = db.collection::<PromoCode>("promo_codes");

    let existing = promos
        .find_one(doc! { "code": &code }, None)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;
    if existing.is_some() {
        return Err(ApiError::conflict("Promo code already exists"));
    }

    let valid_from = match dto.valid_from {
        Some(ref raw) => parse_promo_date(raw)?,
        None => DateTime::now(),
    };
    let valid_until = match dto.valid_until {
        Some(ref raw) => Some(parse_promo_date(raw)?),
        None => None,
    };

    let now = DateTime::now();
    let promo = PromoCode {
        id: None,
        code: code.clone(),
        discount_type: dto.discount_type,
        value: dto.value,
        valid_from,
        valid_until,
        max_uses: dto.max_uses,
        used_count: 0,
        is_active: true,
        created_at: now,
        updated_at: now,
    };

    let result = promos
        .insert_one(&promo, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to create promo code: {}", e)))?;

    Ok(Json(ApiResponse::success_with_message(
        "Promo code created".to_string(),
        serde_json::json!({
            "id": result.inserted_id.as_object_id().unwrap().to_hex(),
            "code": code
        }),
    )))
}

#[openapi(tag = "Admin")]
#[get("/admin/promos")]
pub async fn get_all_promo_codes(
    db: &State<DbConn>,
    _admin: AdminGuard,
) -> Result<Json<ApiResponse<Vec<serde_json::Value>>>, ApiError> {
    let find_options = FindOptions::builder().sort(doc! { "created_at": -1 }).build();

    let mut cursor = db
        .collection::<PromoCode>("promo_codes")
        .find(None, find_options)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?;

    let mut promos = Vec::new();
    while cursor
        .advance()
        .await
        .map_err(|e| ApiError::internal_error(format!("Cursor error: {}", e)))?
    {
        let promo = cursor
            .deserialize_current()
            .map_err(|e| ApiError::internal_error(format!("Deserialization error: {}", e)))?;

        promos.push(serde_json::json!({
            "id": promo.id.unwrap().to_hex(),
            "code": promo.code,
            "discount_type": promo.discount_type,
            "value": promo.value,
            "used_count": promo.used_count,
            "max_uses": promo.max_uses,
            "is_active": promo.is_active
        }));
    }

    Ok(Json(ApiResponse::success(promos)))
}

#[openapi(tag = "Admin")]
#[put("/admin/promos/<promo_id>/deactivate")]
pub async fn deactivate_promo_code(
    db: &State<DbConn>,
    _admin: AdminGuard,
    promo_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let object_id =
        ObjectId::parse_str(&promo_id).map_err(|_| ApiError::bad_request("Invalid promo ID"))?;

    let result = db
        .collection::<PromoCode>("promo_codes")
        .update_one(
            doc! { "_id": object_id },
            doc! { "$set": { "is_active": false, "updated_at": DateTime::now() } },
            None,
        )
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    if result.matched_count == 0 {
        return Err(ApiError::not_found("Promo code not found"));
    }

    Ok(Json(ApiResponse::success(serde_json::json!({
        "message": "Promo code deactivated"
    }))))
}
