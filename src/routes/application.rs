use rocket::http::ContentType;
use rocket::serde::json::Json;
use rocket::State;
use mongodb::bson::{doc, oid::ObjectId, DateTime};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument, UpdateOptions};
use rocket_okapi::openapi;
use std::str::FromStr;

use crate::db::DbConn;
use crate::guards::AuthGuard;
use crate::models::{
    batch_number_for, Application, ApplicationAnalytics, ApplicationBatch, ApplicationResponse,
    ApplicationStatus, BatchStatus, CreateApplicationDto, SubmissionMode,
    UpdateApplicationStatusDto, UserPlan,
};
use crate::utils::{write_applications_csv, ApiError, ApiResponse};

/// Takes one credit from the user's oldest plan that still has any.
///
/// The filter and `$inc` run as a single document update, so two requests
/// racing for the last credit cannot both win; the loser gets `Ok(None)`.
/// Exhaustion and database failures are distinct outcomes here so callers
/// that loop (the admin bulk upload) can stop on the former and abort on
/// the latter.
pub async fn try_deduct_credit(
    db: &DbConn,
    user_id: ObjectId,
) -> Result<Option<UserPlan>, ApiError> {
    let options = FindOneAndUpdateOptions::builder()
        .sort(doc! { "purchased_at": 1 })
        .return_document(ReturnDocument::After)
        .build();

    db.collection::<UserPlan>("user_plans")
        .find_one_and_update(
            doc! {
                "user_id": user_id,
                "credits_remaining": { "$gt": 0 }
            },
            doc! {
                "$inc": { "credits_remaining": -1 },
                "$set": { "updated_at": DateTime::now() }
            },
            options,
        )
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))
}

/// Single-application variant: out of credits is a 402, before anything is
/// written.
pub async fn deduct_credit(db: &DbConn, user_id: ObjectId) -> Result<UserPlan, ApiError> {
    try_deduct_credit(db, user_id).await?.ok_or_else(|| {
        ApiError::payment_required("Insufficient credits. Purchase a plan to continue applying")
    })
}

/// Returns a credit taken by `deduct_credit` when the application insert it
/// was paired with never happened. Best effort: the invariant at stake is
/// "paid credits are spendable", so a failure here is logged, not surfaced.
pub async fn refund_credit(db: &DbConn, user_plan_id: ObjectId) {
    let result = db
        .collection::<UserPlan>("user_plans")
        .update_one(
            doc! { "_id": user_plan_id },
            doc! {
                "$inc": { "credits_remaining": 1 },
                "$set": { "updated_at": DateTime::now() }
            },
            None,
        )
        .await;

    if let Err(e) = result {
        error!(
            "Failed to return credit to plan {}: {}",
            user_plan_id.to_hex(),
            e
        );
    }
}

/// Puts the next application into its batch and keeps the batch document's
/// counter in sync. The batch is created lazily on first touch.
pub async fn register_in_batch(db: &DbConn, user_id: ObjectId) -> Result<i64, ApiError> {
    let existing = db
        .collection::<Application>("applications")
        .count_documents(doc! { "user_id": user_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))? as i64;

    let batch_number = batch_number_for(existing);

    let options = UpdateOptions::builder().upsert(true).build();
    db.collection::<ApplicationBatch>("application_batches")
        .update_one(
            doc! { "user_id": user_id, "batch_number": batch_number },
            doc! {
                "$inc": { "total_applications": 1 },
                "$set": { "updated_at": DateTime::now() },
                "$setOnInsert": {
                    "status": BatchStatus::Pending.as_str(),
                    "created_at": DateTime::now()
                }
            },
            options,
        )
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    Ok(batch_number)
}

fn parse_applied_on(raw: &Option<String>) -> Result<DateTime, ApiError> {
    match raw {
        None => Ok(DateTime::now()),
        Some(s) => {
            let date = chrono::NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map_err(|_| ApiError::bad_request("applied_on must be YYYY-MM-DD"))?;
            let millis = date
                .and_hms_opt(0, 0, 0)
                .ok_or_else(|| ApiError::internal_error("Invalid date"))?
                .and_utc()
                .timestamp_millis();
            Ok(DateTime::from_millis(millis))
        }
    }
}

#[openapi(tag = "Applications")]
#[post("/applications", data = "<dto>")]
pub async fn create_application(
    db: &State<DbConn>,
    auth: AuthGuard,
    dto: Json<CreateApplicationDto>,
) -> Result<Json<ApiResponse<ApplicationResponse>>, ApiError> {
    if dto.job_title.trim().is_empty() {
        return Err(ApiError::bad_request("job_title is required"));
    }
    if dto.company.trim().is_empty() {
        return Err(ApiError::bad_request("company is required"));
    }

    let applied_at = parse_applied_on(&dto.applied_on)?;

    // Credit first: if the user is out, nothing is written.
    let user_plan = deduct_credit(db, auth.user_id).await?;
    let batch_number = register_in_batch(db, auth.user_id).await?;

    let now = DateTime::now();
    let application = Application {
        id: None,
        user_id: auth.user_id,
        user_plan_id: user_plan.id.unwrap(),
        batch_number,
        job_id: dto.job_id.trim().to_string(),
        job_title: dto.job_title.trim().to_string(),
        company: dto.company.trim().to_string(),
        applied_at,
        status: ApplicationStatus::Applied,
        submission_mode: SubmissionMode::Manual,
        created_at: now,
        updated_at: now,
    };

    let result = match db
        .collection::<Application>("applications")
        .insert_one(&application, None)
        .await
    {
        Ok(result) => result,
        Err(e) => {
            // The credit was already taken; give it back before failing.
            refund_credit(db, application.user_plan_id).await;
            return Err(ApiError::internal_error(format!(
                "Failed to record application: {}",
                e
            )));
        }
    };

    let mut created = application;
    created.id = result.inserted_id.as_object_id();

    Ok(Json(ApiResponse::success_with_message(
        "Application recorded".to_string(),
        ApplicationResponse::from(created),
    )))
}

#[derive(FromForm, serde::Deserialize, rocket_okapi::okapi::schemars::JsonSchema)]
pub struct ListApplicationsQuery {
    pub status: Option<String>,
    pub batch: Option<i64>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[openapi(tag = "Applications")]
#[get("/applications?<query..>")]
pub async fn list_applications(
    db: &State<DbConn>,
    auth: AuthGuard,
    query: ListApplicationsQuery,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).min(100);
    let skip = (page - 1) * limit;

    let mut filter = doc! { "user_id": auth.user_id };

    if let Some(ref status) = query.status {
        let status = ApplicationStatus::from_str(status).map_err(ApiError::bad_request)?;
        filter.insert("status", status.as_str());
    }
    if let Some(batch) = query.batch {
        filter.insert("batch_number", batch);
    }

    let find_options = FindOptions::builder()
        .skip(skip as u64)
        .limit(limit)
        .sort(doc! { "applied_at": -1 })
        .build();

    let mut cursor = db
        .collection::<Application>("applications")
        .find(filter.clone(), find_options)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?;

    let mut applications = Vec::new();
    while cursor
        .advance()
        .await
        .map_err(|e| ApiError::internal_error(format!("Cursor error: {}", e)))?
    {
        let app = cursor
            .deserialize_current()
            .map_err(|e| ApiError::internal_error(format!("Deserialization error: {}", e)))?;
        applications.push(ApplicationResponse::from(app));
    }

    let total = db
        .collection::<Application>("applications")
        .count_documents(filter, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Count error: {}", e)))?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "applications": applications,
        "pagination": {
            "page": page,
            "limit": limit,
            "total": total,
            "pages": (total as f64 / limit as f64).ceil() as i64,
        }
    }))))
}

#[openapi(tag = "Applications")]
#[put("/applications/<application_id>/status", data = "<dto>")]
pub async fn update_application_status(
    db: &State<DbConn>,
    auth: AuthGuard,
    application_id: String,
    dto: Json<UpdateApplicationStatusDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let object_id = ObjectId::parse_str(&application_id)
        .map_err(|_| ApiError::bad_request("Invalid application ID"))?;

    let result = db
        .collection::<Application>("applications")
        .update_one(
            doc! { "_id": object_id, "user_id": auth.user_id },
            doc! {
                "$set": {
                    "status": dto.status.as_str(),
                    "updated_at": DateTime::now()
                }
            },
            None,
        )
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    if result.matched_count == 0 {
        return Err(ApiError::not_found("Application not found"));
    }

    Ok(Json(ApiResponse::success(serde_json::json!({
        "message": "Status updated",
        "status": dto.status.as_str()
    }))))
}

// CSV download; not part of the OpenAPI surface.
#[get("/applications/export")]
pub async fn export_applications(
    db: &State<DbConn>,
    auth: AuthGuard,
) -> Result<(ContentType, String), ApiError> {
    let find_options = FindOptions::builder().sort(doc! { "applied_at": 1 }).build();

    let mut cursor = db
        .collection::<Application>("applications")
        .find(doc! { "user_id": auth.user_id }, find_options)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?;

    let mut applications = Vec::new();
    while cursor
        .advance()
        .await
        .map_err(|e| ApiError::internal_error(format!("Cursor error: {}", e)))?
    {
        let app = cursor
            .deserialize_current()
            .map_err(|e| ApiError::internal_error(format!("Deserialization error: {}", e)))?;
        applications.push(app);
    }

    let csv = write_applications_csv(&applications).map_err(ApiError::internal_error)?;

    Ok((ContentType::CSV, csv))
}

#[openapi(tag = "Applications")]
#[get("/applications/analytics")]
pub async fn get_analytics(
    db: &State<DbConn>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<ApplicationAnalytics>>, ApiError> {
    let collection = db.collection::<Application>("applications");

    let mut counts = [0i64; 5];
    let statuses = [
        ApplicationStatus::Applied,
        ApplicationStatus::InReview,
        ApplicationStatus::Interviewing,
        ApplicationStatus::Rejected,
        ApplicationStatus::Offer,
    ];

    for (i, status) in statuses.iter().enumerate() {
        counts[i] = collection
            .count_documents(
                doc! { "user_id": auth.user_id, "status": status.as_str() },
                None,
            )
            .await
            .map_err(|e| ApiError::internal_error(format!("Count error: {}", e)))? as i64;
    }

    let total: i64 = counts.iter().sum();
    let responded = total - counts[0];
    let response_rate = if total > 0 {
        (responded as f64 / total as f64 * 1000.0).round() / 10.0
    } else {
        0.0
    };

    Ok(Json(ApiResponse::success(ApplicationAnalytics {
        total,
        applied: counts[0],
        in_review: counts[1],
        interviewing: counts[2],
        rejected: counts[3],
        offers: counts[4],
        response_rate,
    })))
}

#[cfg(test)]
mod tests {
    use rocket::http::Status;

    use crate::utils::ApiError;

    // The admin bulk upload stops inserting when credits run out but must
    // abort the request on any other failure; the two outcomes are separate
    // types (`Ok(None)` vs `Err`) and separate statuses at the edge.
    #[test]
    fn credit_exhaustion_is_distinct_from_database_failure() {
        let exhausted = ApiError::payment_required(
            "Insufficient credits. Purchase a plan to continue applying",
        );
        let db_error = ApiError::internal_error("connection reset by peer");

        assert_eq!(exhausted.status, Status::PaymentRequired);
        assert_eq!(db_error.status, Status::InternalServerError);
        assert_ne!(exhausted.status, db_error.status);
    }
}
