//! Records produced by the assistant for a user: documents, conversations,
//! chat queries and voice calls. This crate only reads them.

mod repository;

pub use repository::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::user::UserId;

/// Uploaded financial document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Document {
    pub id: i64,
    pub user: UserId,
    pub title: String,
    pub document_type: String,
    pub is_processed: bool,
    pub created_at: DateTime<Utc>,
}

/// Chat thread with the assistant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Conversation {
    pub id: i64,
    pub user: UserId,
    pub title: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One question asked to the assistant. Only counted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ChatQuery {
    pub id: i64,
    pub user: UserId,
    pub created_at: DateTime<Utc>,
}

/// Voice call with an advisor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, FromRow)]
pub struct VoiceCall {
    pub id: i64,
    pub user: UserId,
    pub topic: String,
    pub status: String,
    pub scheduled_time: DateTime<Utc>,
    pub duration_minutes: i32,
}

/// Status of a call still to come.
pub const CALL_SCHEDULED: &str = "scheduled";
