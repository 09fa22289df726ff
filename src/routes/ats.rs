use rocket::serde::json::Json;
use rocket::serde::Deserialize;
use rocket_okapi::openapi;
use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;
use crate::guards::AuthGuard;
use crate::services::ats::{AtsScore, AtsService};
use crate::utils::{validate_cv_file, ApiError, ApiResponse};

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct ScoreCvRequest {
    pub filename: String,
    /// Base64-encoded file contents.
    pub data: String,
}

/// Scores an uploaded CV. The file itself is validated and then discarded;
/// see `services::ats` for what the score actually is.
#[openapi(tag = "ATS")]
#[post("/ats/score", data = "<dto>")]
pub async fn score_cv(
    _auth: AuthGuard,
    dto: Json<ScoreCvRequest>,
) -> Result<Json<ApiResponse<AtsScore>>, ApiError> {
    use data_encoding::BASE64;

    let bytes = BASE64
        .decode(dto.data.as_bytes())
        .map_err(|_| ApiError::bad_request("Invalid base64 data"))?;

    validate_cv_file(&dto.filename, bytes.len()).map_err(ApiError::bad_request)?;

    let score = AtsService::calculate_score(&dto.filename);

    Ok(Json(ApiResponse::success(score)))
}
