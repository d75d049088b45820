use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::Serialize;
use utoipa::ToSchema;

use crate::model::user::UserBrief;

#[derive(Debug, sqlx::FromRow)]
pub struct Conversation {
    pub id: u64,
    pub is_group_chat: bool,
    pub group_name: Option<String>,
    pub group_notice: Option<String>,
    pub group_note: Option<String>,
    pub group_admin_id: Option<u64>,
    pub last_message_id: Option<u64>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Preview of the newest message, embedded in conversation listings.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LastMessage {
    pub id: u64,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub sender: Option<UserBrief>,
    pub is_recalled: bool,
    pub read_by: Vec<u64>,
    #[schema(value_type = String)]
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConversationView {
    pub id: u64,
    pub is_group_chat: bool,
    pub group_name: Option<String>,
    pub group_notice: Option<String>,
    pub group_note: Option<String>,
    pub group_admin: Option<UserBrief>,
    pub participants: Vec<UserBrief>,
    pub last_message: Option<LastMessage>,
    /// Stored per-participant counters, keyed by user id.
    pub unread_counts: HashMap<u64, i32>,
    /// Count of messages the viewer has not read, recomputed per request.
    pub unread_count: i64,
    #[schema(value_type = String)]
    pub created_at: NaiveDateTime,
    #[schema(value_type = String)]
    pub updated_at: NaiveDateTime,
}
