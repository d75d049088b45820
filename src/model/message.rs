use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::model::user::UserBrief;

#[derive(Debug, FromRow)]
pub struct Message {
    pub id: u64,
    pub conversation_id: u64,
    pub sender_id: u64,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub reply_to_id: Option<u64>,
    pub is_recalled: bool,
    pub created_at: NaiveDateTime,
}

/// Flat row from the message listing join: sender, quoted message and the
/// readers list come back in one query.
#[derive(Debug, FromRow)]
pub struct MessageJoined {
    pub id: u64,
    pub conversation_id: u64,
    pub sender_id: u64,
    pub sender_name: String,
    pub sender_avatar: Option<String>,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub is_recalled: bool,
    pub reply_id: Option<u64>,
    pub reply_content: Option<String>,
    pub reply_image_url: Option<String>,
    pub reply_sender_name: Option<String>,
    pub read_by: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReplySender {
    pub full_name: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReplyBrief {
    pub id: u64,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub sender: ReplySender,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: u64,
    pub conversation_id: u64,
    pub sender: UserBrief,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub reply_to: Option<ReplyBrief>,
    pub is_recalled: bool,
    pub read_by: Vec<u64>,
    #[schema(value_type = String)]
    pub created_at: NaiveDateTime,
}

impl From<MessageJoined> for MessageView {
    fn from(m: MessageJoined) -> Self {
        let reply_to = m.reply_id.map(|id| ReplyBrief {
            id,
            content: m.reply_content,
            image_url: m.reply_image_url,
            sender: ReplySender {
                full_name: m.reply_sender_name.unwrap_or_default(),
            },
        });

        MessageView {
            id: m.id,
            conversation_id: m.conversation_id,
            sender: UserBrief {
                id: m.sender_id,
                full_name: m.sender_name,
                profile_picture_url: m.sender_avatar,
            },
            content: m.content,
            image_url: m.image_url,
            reply_to,
            is_recalled: m.is_recalled,
            read_by: parse_id_list(m.read_by.as_deref()),
            created_at: m.created_at,
        }
    }
}

/// Parse a GROUP_CONCAT id list ("3,17,42") into ids, dropping junk.
pub fn parse_id_list(concat: Option<&str>) -> Vec<u64> {
    concat
        .unwrap_or("")
        .split(',')
        .filter_map(|part| part.trim().parse::<u64>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_list_parses_comma_separated_values() {
        assert_eq!(parse_id_list(Some("3,17,42")), vec![3, 17, 42]);
        assert_eq!(parse_id_list(Some(" 5 , 6 ")), vec![5, 6]);
    }

    #[test]
    fn id_list_tolerates_null_and_garbage() {
        assert!(parse_id_list(None).is_empty());
        assert!(parse_id_list(Some("")).is_empty());
        assert_eq!(parse_id_list(Some("1,x,2")), vec![1, 2]);
    }
}
