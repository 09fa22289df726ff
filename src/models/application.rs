use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars::JsonSchema;
use std::str::FromStr;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Applied,
    InReview,
    Interviewing,
    Rejected,
    Offer,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Applied => "applied",
            ApplicationStatus::InReview => "in_review",
            ApplicationStatus::Interviewing => "interviewing",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Offer => "offer",
        }
    }
}

impl FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(' ', "_").as_str() {
            "applied" => Ok(ApplicationStatus::Applied),
            "in_review" => Ok(ApplicationStatus::InReview),
            "interviewing" => Ok(ApplicationStatus::Interviewing),
            "rejected" => Ok(ApplicationStatus::Rejected),
            "offer" => Ok(ApplicationStatus::Offer),
            other => Err(format!("Unknown application status '{}'", other)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionMode {
    Manual,
    Automated,
}

/// One job submission. Belongs to a User and the UserPlan whose credit it
/// consumed; `batch_number` groups it with its siblings.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Application {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub user_plan_id: ObjectId,
    pub batch_number: i64,
    pub job_id: String,
    pub job_title: String,
    pub company: String,
    pub applied_at: DateTime,
    pub status: ApplicationStatus,
    pub submission_mode: SubmissionMode,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateApplicationDto {
    pub job_id: String,
    pub job_title: String,
    pub company: String,
    /// ISO date (YYYY-MM-DD); defaults to today when omitted.
    pub applied_on: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateApplicationStatusDto {
    pub status: ApplicationStatus,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ApplicationResponse {
    pub id: String,
    pub batch_number: i64,
    pub job_id: String,
    pub job_title: String,
    pub company: String,
    pub applied_at: String,
    pub status: ApplicationStatus,
    pub submission_mode: SubmissionMode,
}

impl From<Application> for ApplicationResponse {
    fn from(app: Application) -> Self {
        ApplicationResponse {
            id: app.id.unwrap().to_hex(),
            batch_number: app.batch_number,
            job_id: app.job_id,
            job_title: app.job_title,
            company: app.company,
            applied_at: app
                .applied_at
                .try_to_rfc3339_string()
                .unwrap_or_default(),
            status: app.status,
            submission_mode: app.submission_mode,
        }
    }
}

/// Per-status counts plus headline rates for the analytics page.
#[derive(Debug, Serialize, JsonSchema)]
pub struct ApplicationAnalytics {
    pub total: i64,
    pub applied: i64,
    pub in_review: i64,
    pub interviewing: i64,
    pub rejected: i64,
    pub offers: i64,
    /// Share of applications that progressed past "applied".
    pub response_rate: f64,
}
