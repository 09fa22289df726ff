use rocket::request::{self, FromRequest, Outcome, Request};
use rocket::serde::json::Json;
use rocket::State;
use mongodb::bson::{doc, oid::ObjectId, DateTime};
use mongodb::options::FindOptions;
use rocket_okapi::openapi;

use crate::db::DbConn;
use crate::guards::AuthGuard;
use crate::models::{
    Notification, NotificationKind, Plan, PromoCode, PromoValidationResponse, Transaction,
    TransactionResponse, TransactionStatus, TransactionType, UserPlan, ValidatePromoDto,
};
use crate::services::StripeService;
use crate::utils::{ApiError, ApiResponse};

#[openapi(tag = "Billing")]
#[post("/billing/promo/validate", data = "<dto>")]
pub async fn validate_promo(
    db: &State<DbConn>,
    _auth: AuthGuard,
    dto: Json<ValidatePromoDto>,
) -> Result<Json<ApiResponse<PromoValidationResponse>>, ApiError> {
    let code = dto.code.trim().to_uppercase();
    if code.is_empty() {
        return Err(ApiError::bad_request("Promo code is required"));
    }

    let promo = db
        .collection::<PromoCode>("promo_codes")
        .find_one(doc! { "code": &code }, None)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    let Some(promo) = promo else {
        return Ok(Json(ApiResponse::success(PromoValidationResponse {
            valid: false,
            reason: Some("not_found".to_string()),
            discounted: None,
        })));
    };

    match promo.validate(chrono::Utc::now()) {
        Ok(()) => Ok(Json(ApiResponse::success(PromoValidationResponse {
            valid: true,
            reason: None,
            discounted: dto.amount.map(|a| promo.apply_discount(a)),
        }))),
        Err(rejection) => Ok(Json(ApiResponse::success(PromoValidationResponse {
            valid: false,
            reason: Some(rejection.as_str().to_string()),
            discounted: None,
        }))),
    }
}

#[derive(serde::Deserialize, rocket_okapi::okapi::schemars::JsonSchema)]
pub struct CheckoutDto {
    pub plan_id: String,
    pub promo_code: Option<String>,
}

#[openapi(tag = "Billing")]
#[post("/billing/checkout", data = "<dto>")]
pub async fn create_checkout(
    db: &State<DbConn>,
    auth: AuthGuard,
    dto: Json<CheckoutDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let plan_id = ObjectId::parse_str(&dto.plan_id)
        .map_err(|_| ApiError::bad_request("Invalid plan ID"))?;

    let plan = db
        .collection::<Plan>("plans")
        .find_one(doc! { "_id": plan_id, "is_active": true }, None)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?
        .ok_or_else(|| ApiError::not_found("Plan not found"))?;

    let mut amount = plan.price;
    let mut applied_code = None;

    if let Some(ref raw_code) = dto.promo_code {
        let code = raw_code.trim().to_uppercase();
        let promo = db
            .collection::<PromoCode>("promo_codes")
            .find_one(doc! { "code": &code }, None)
            .await
            .map_err(|e| ApiError::internal_error(e.to_string()))?
            .ok_or_else(|| ApiError::bad_request("Unknown promo code"))?;

        promo
            .validate(chrono::Utc::now())
            .map_err(|r| ApiError::bad_request(format!("Promo code rejected: {}", r.as_str())))?;

        amount = promo.apply_discount(amount);
        applied_code = Some(code);
    }

    let now = DateTime::now();
    let transaction = Transaction {
        id: None,
        user_id: auth.user_id,
        plan_id,
        transaction_type: TransactionType::Purchase,
        amount,
        currency: "usd".to_string(),
        promo_code: applied_code.clone(),
        status: TransactionStatus::Pending,
        stripe_session_id: None,
        created_at: now,
        updated_at: now,
    };

    let tx_result = db
        .collection::<Transaction>("transactions")
        .insert_one(&transaction, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to create transaction: {}", e)))?;

    let tx_oid = tx_result
        .inserted_id
        .as_object_id()
        .ok_or_else(|| ApiError::internal_error("Invalid transaction ID"))?;
    let transaction_id = tx_oid.to_hex();

    let session = StripeService::create_checkout_session(amount, &plan.name, &transaction_id)
        .await
        .map_err(|e| {
            error!("Stripe checkout failed: {}", e);
            ApiError::bad_gateway("Payment provider is unavailable. Please try again later")
        })?;

    let session_id = session["id"].as_str().unwrap_or_default().to_string();
    let checkout_url = session["url"].as_str().unwrap_or_default().to_string();

    db.collection::<Transaction>("transactions")
        .update_one(
            doc! { "_id": tx_oid },
            doc! { "$set": { "stripe_session_id": &session_id, "updated_at": DateTime::now() } },
            None,
        )
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "transaction_id": transaction_id,
        "checkout_url": checkout_url,
        "amount": amount,
        "promo_code": applied_code
    }))))
}

pub struct StripeSignature(pub String);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for StripeSignature {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        match req.headers().get_one("Stripe-Signature") {
            Some(sig) => Outcome::Success(StripeSignature(sig.to_string())),
            None => Outcome::Error((rocket::http::Status::BadRequest, ())),
        }
    }
}

/// Stripe settlement callback. Not in the OpenAPI surface; Stripe is the
/// only caller.
#[post("/billing/webhook", data = "<payload>")]
pub async fn stripe_webhook(
    db: &State<DbConn>,
    signature: StripeSignature,
    payload: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let secret = crate::config::Config::stripe_webhook_secret()
        .ok_or_else(|| ApiError::internal_error("Stripe webhook secret not configured"))?;

    StripeService::verify_webhook_signature(&payload, &signature.0, &secret)
        .map_err(ApiError::bad_request)?;

    let event: serde_json::Value =
        serde_json::from_str(&payload).map_err(|_| ApiError::bad_request("Malformed payload"))?;

    match event["type"].as_str().unwrap_or_default() {
        "checkout.session.completed" => {
            complete_purchase(db, &event["data"]["object"]).await?;
        }
        "checkout.session.expired" => {
            if let Some(tx_id) = event["data"]["object"]["metadata"]["transaction_id"].as_str() {
                mark_transaction(db, tx_id, TransactionStatus::Failed).await?;
            }
        }
        other => {
            info!("Ignoring Stripe event type '{}'", other);
        }
    }

    Ok(Json(ApiResponse::success(serde_json::json!({ "received": true }))))
}

async fn mark_transaction(
    db: &DbConn,
    transaction_id: &str,
    status: TransactionStatus,
) -> Result<(), ApiError> {
    let tx_id = ObjectId::parse_str(transaction_id)
        .map_err(|_| ApiError::bad_request("Invalid transaction ID in metadata"))?;

    db.collection::<Transaction>("transactions")
        .update_one(
            doc! { "_id": tx_id },
            doc! { "$set": {
                "status": match status {
                    TransactionStatus::Pending => "pending",
                    TransactionStatus::Completed => "completed",
                    TransactionStatus::Failed => "failed",
                    TransactionStatus::Refunded => "refunded",
                },
                "updated_at": DateTime::now()
            } },
            None,
        )
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    Ok(())
}

/// Settles a completed checkout: credits granted, promo usage counted, user
/// notified, and the transaction marked completed LAST. The transaction only
/// leaves "pending" once everything the user paid for exists, so a Stripe
/// retry after a mid-settlement failure finds the transaction still pending
/// and finishes the job. The grant itself is keyed on `transaction_id`, so
/// such a retry never inserts a second UserPlan for the same payment.
async fn complete_purchase(db: &DbConn, session: &serde_json::Value) -> Result<(), ApiError> {
    let transaction_id = session["metadata"]["transaction_id"]
        .as_str()
        .ok_or_else(|| ApiError::bad_request("Session missing transaction metadata"))?;
    let tx_id = ObjectId::parse_str(transaction_id)
        .map_err(|_| ApiError::bad_request("Invalid transaction ID in metadata"))?;

    let transaction = db
        .collection::<Transaction>("transactions")
        .find_one(doc! { "_id": tx_id, "status": "pending" }, None)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    let Some(transaction) = transaction else {
        info!("Webhook replay or unknown transaction {}; ignoring", transaction_id);
        return Ok(());
    };

    let plan = db
        .collection::<Plan>("plans")
        .find_one(doc! { "_id": transaction.plan_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?
        .ok_or_else(|| ApiError::internal_error("Plan referenced by transaction is missing"))?;

    let already_granted = db
        .collection::<UserPlan>("user_plans")
        .find_one(doc! { "transaction_id": tx_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?
        .is_some();

    if !already_granted {
        let now = DateTime::now();
        let user_plan = UserPlan {
            id: None,
            user_id: transaction.user_id,
            plan_id: transaction.plan_id,
            transaction_id: tx_id,
            sku: plan.sku.clone(),
            plan_name: plan.name.clone(),
            credits_total: plan.credits,
            credits_remaining: plan.credits,
            purchased_at: now,
            updated_at: now,
        };

        db.collection::<UserPlan>("user_plans")
            .insert_one(&user_plan, None)
            .await
            .map_err(|e| ApiError::internal_error(format!("Failed to grant credits: {}", e)))?;

        if let Some(ref code) = transaction.promo_code {
            db.collection::<PromoCode>("promo_codes")
                .update_one(
                    doc! { "code": code },
                    doc! { "$inc": { "used_count": 1 }, "$set": { "updated_at": DateTime::now() } },
                    None,
                )
                .await
                .map_err(|e| ApiError::internal_error(e.to_string()))?;
        }

        let notification = Notification::new(
            transaction.user_id,
            NotificationKind::Billing,
            "Purchase complete",
            &format!(
                "Your {} plan is active: {} application credits added",
                plan.name, plan.credits
            ),
        );
        db.collection::<Notification>("notifications")
            .insert_one(&notification, None)
            .await
            .map_err(|e| ApiError::internal_error(e.to_string()))?;
    }

    mark_transaction(db, transaction_id, TransactionStatus::Completed).await?;

    Ok(())
}

#[openapi(tag = "Billing")]
#[get("/billing/transactions")]
pub async fn get_transactions(
    db: &State<DbConn>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<Vec<TransactionResponse>>>, ApiError> {
    let find_options = FindOptions::builder().sort(doc! { "created_at": -1 }).build();

    let mut cursor = db
        .collection::<Transaction>("transactions")
        .find(doc! { "user_id": auth.user_id }, find_options)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?;

    let mut transactions = Vec::new();
    while cursor
        .advance()
        .await
        .map_err(|e| ApiError::internal_error(format!("Cursor error: {}", e)))?
    {
        let tx = cursor
            .deserialize_current()
            .map_err(|e| ApiError::internal_error(format!("Deserialization error: {}", e)))?;
        transactions.push(TransactionResponse::from(tx));
    }

    Ok(Json(ApiResponse::success(transactions)))
}
