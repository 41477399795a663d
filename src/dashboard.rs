//! Aggregated read view of a user's activity.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::activity::{ActivityRepository, Conversation, Document, VoiceCall};
use crate::clock::start_of_month;
use crate::error::Result;
use crate::user::User;

/// Rows returned in every recent list.
pub const RECENT_LIMIT: i64 = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocStats {
    pub total_documents: i64,
    pub monthly_analyzed: i64,
}

/// List wrapper, serialized as `{"results": [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Results<T> {
    pub results: Vec<T>,
}

impl<T> From<Vec<T>> for Results<T> {
    fn from(results: Vec<T>) -> Self {
        Self { results }
    }
}

/// Dashboard payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    #[serde(rename = "docStats")]
    pub doc_stats: DocStats,
    #[serde(rename = "queryHistory")]
    pub query_history: Results<Conversation>,
    pub documents: Results<Document>,
    #[serde(rename = "voiceCalls")]
    pub voice_calls: Results<VoiceCall>,
    /// Requester, with `queries_used` counted over the current month.
    pub current_user_data: User,
}

/// Build the dashboard of `user` at `now`.
///
/// Monthly counters start at the first instant of the calendar month of
/// `now` in `tz`. Any failing sub-query fails the whole view.
pub async fn aggregate(
    activity: &dyn ActivityRepository,
    mut user: User,
    now: DateTime<Utc>,
    tz: FixedOffset,
) -> Result<Dashboard> {
    let since = start_of_month(now, tz);
    let id = user.id;

    let (total_documents, monthly_analyzed, monthly_queries, conversations, documents, calls) =
        tokio::try_join!(
            activity.count_documents(id),
            activity.count_processed_documents_since(id, since),
            activity.count_queries_since(id, since),
            activity.recent_active_conversations(id, RECENT_LIMIT),
            activity.recent_documents(id, RECENT_LIMIT),
            activity.upcoming_calls(id, now, RECENT_LIMIT),
        )?;

    user.queries_used = i32::try_from(monthly_queries).unwrap_or(i32::MAX);

    Ok(Dashboard {
        doc_stats: DocStats {
            total_documents,
            monthly_analyzed,
        },
        query_history: conversations.into(),
        documents: documents.into(),
        voice_calls: calls.into(),
        current_user_data: user,
    })
}
