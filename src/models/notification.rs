use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars::JsonSchema;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Billing,
    Batch,
    System,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Notification {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub read: bool,
    pub created_at: DateTime,
}

impl Notification {
    pub fn new(user_id: ObjectId, kind: NotificationKind, title: &str, message: &str) -> Self {
        Notification {
            id: None,
            user_id,
            title: title.to_string(),
            message: message.to_string(),
            kind,
            read: false,
            created_at: DateTime::now(),
        }
    }
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct NotificationResponse {
    pub id: String,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub read: bool,
    pub created_at: String,
}

impl From<Notification> for NotificationResponse {
    fn from(n: Notification) -> Self {
        NotificationResponse {
            id: n.id.unwrap().to_hex(),
            title: n.title,
            message: n.message,
            kind: n.kind,
            read: n.read,
            created_at: n.created_at.try_to_rfc3339_string().unwrap_or_default(),
        }
    }
}
