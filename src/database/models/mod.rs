
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};

/// A chat session. Transitions: active -> completed (explicit end) or
/// active -> expired (inactivity sweep). Terminal states never change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub id: String,
    pub status: SessionStatus,
    pub created_at: NaiveDateTime,
    pub last_activity: NaiveDateTime,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub user_purpose: Option<String>,
    pub user_info_collected: bool,
    pub summary: Option<String>,
    pub email_sent: bool,
    pub ended_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
    Expired,
}

impl std::fmt::Display for SessionStatus {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            SessionStatus::Active => write!(f, "Active"),
            SessionStatus::Completed => write!(f, "Completed"),
            SessionStatus::Expired => write!(f, "Expired"),
        }
    }
}

/// One message in a session's transcript. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Interaction {
    pub id: i64,
    pub session_id: String,
    pub role: InteractionRole,
    pub content: String,
    pub rag_used: bool,
    /// JSON array of document ids that informed the response.
    pub documents_referenced: String,
    pub created_at: NaiveDateTime,
}

impl Interaction {
    /// Decode the referenced document ids, tolerating legacy rows.
    #[inline]
    pub fn referenced_ids(&self) -> Vec<String> {
        serde_json::from_str(&self.documents_referenced).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InteractionRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewInteraction {
    pub session_id: String,
    pub role: InteractionRole,
    pub content: String,
    pub rag_used: bool,
    pub documents_referenced: Vec<String>,
}

/// A document row as persisted; the extracted text lives only in the
/// vector store payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct DocumentRow {
    pub id: String,
    pub session_id: String,
    pub file_name: String,
    pub file_type: String,
    pub file_size: i64,
    pub chunk_count: i64,
    pub vector_stored: bool,
    pub extracted: bool,
    pub upload_time: NaiveDateTime,
}

/// Recurring-user record keyed by email, maintained across sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct UserProfile {
    pub email: String,
    pub name: String,
    pub purpose: Option<String>,
    pub session_count: i64,
    pub first_seen: NaiveDateTime,
    pub last_seen: NaiveDateTime,
}

/// One analytics data point. Fields not relevant to an event type are null.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct AnalyticsEvent {
    pub id: i64,
    pub event_type: EventType,
    pub session_id: Option<String>,
    pub created_at: NaiveDateTime,
    pub duration_ms: Option<i64>,
    pub success: Option<bool>,
    pub rag_used: Option<bool>,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Conversation,
    Voice,
    AiPerformance,
    Engagement,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAnalyticsEvent {
    pub event_type: EventType,
    pub session_id: Option<String>,
    pub duration_ms: Option<i64>,
    pub success: Option<bool>,
    pub rag_used: Option<bool>,
    pub detail: Option<String>,
}

impl NewAnalyticsEvent {
    #[inline]
    pub fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            session_id: None,
            duration_ms: None,
            success: None,
            rag_used: None,
            detail: None,
        }
    }
}
