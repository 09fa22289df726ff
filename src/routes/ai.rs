use rocket::serde::json::Json;
use rocket::serde::Deserialize;
use rocket_okapi::openapi;
use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;
use crate::guards::AuthGuard;
use crate::services::OpenAiService;
use crate::utils::{ApiError, ApiResponse};

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct CoverLetterRequest {
    pub job_title: String,
    pub company: String,
    /// Free-form notes about the candidate's relevant experience.
    pub highlights: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct CvSummaryRequest {
    pub highlights: String,
}

#[openapi(tag = "AI")]
#[post("/ai/cover-letter", data = "<dto>")]
pub async fn generate_cover_letter(
    _auth: AuthGuard,
    dto: Json<CoverLetterRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    if dto.job_title.trim().is_empty() || dto.company.trim().is_empty() {
        return Err(ApiError::bad_request("job_title and company are required"));
    }

    let text = OpenAiService::generate_cover_letter(&dto.job_title, &dto.company, &dto.highlights)
        .await
        .map_err(|e| {
            error!("Cover letter generation failed: {}", e);
            ApiError::bad_gateway("Generation failed. Please try again later")
        })?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "cover_letter": text
    }))))
}

#[openapi(tag = "AI")]
#[post("/ai/cv-summary", data = "<dto>")]
pub async fn generate_cv_summary(
    _auth: AuthGuard,
    dto: Json<CvSummaryRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    if dto.highlights.trim().is_empty() {
        return Err(ApiError::bad_request("highlights is required"));
    }

    let text = OpenAiService::generate_cv_summary(&dto.highlights)
        .await
        .map_err(|e| {
            error!("CV summary generation failed: {}", e);
            ApiError::bad_gateway("Generation failed. Please try again later")
        })?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "summary": text
    }))))
}
