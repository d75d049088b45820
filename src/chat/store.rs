use std::collections::HashMap;

use sqlx::MySqlPool;

use crate::model::conversation::{Conversation, ConversationView, LastMessage};
use crate::model::message::{parse_id_list, MessageJoined, MessageView};
use crate::model::user::UserBrief;

const CONVERSATION_COLUMNS: &str = "id, is_group_chat, group_name, group_notice, group_note, \
     group_admin_id, last_message_id, created_at, updated_at";

/// Message listing join: sender, quoted message and readers in one query.
const MESSAGE_SELECT: &str = "SELECT m.id, m.conversation_id, m.sender_id, \
     u.full_name AS sender_name, u.profile_picture_url AS sender_avatar, \
     m.content, m.image_url, m.is_recalled, \
     r.id AS reply_id, r.content AS reply_content, r.image_url AS reply_image_url, \
     ru.full_name AS reply_sender_name, \
     CAST(GROUP_CONCAT(mr.user_id) AS CHAR) AS read_by, \
     m.created_at \
     FROM messages m \
     JOIN users u ON u.id = m.sender_id \
     LEFT JOIN messages r ON r.id = m.reply_to_id \
     LEFT JOIN users ru ON ru.id = r.sender_id \
     LEFT JOIN message_reads mr ON mr.message_id = m.id";

const MESSAGE_GROUP: &str = "GROUP BY m.id, m.conversation_id, m.sender_id, \
     u.full_name, u.profile_picture_url, m.content, m.image_url, m.is_recalled, \
     r.id, r.content, r.image_url, ru.full_name, m.created_at";

#[derive(Debug, derive_more::Display)]
pub enum SendError {
    #[display(fmt = "Failed to send message: Invalid data.")]
    EmptyMessage,
    #[display(fmt = "Not authorized to send message.")]
    NotParticipant,
    #[display(fmt = "Failed to save or broadcast message.")]
    Db(sqlx::Error),
}

impl From<sqlx::Error> for SendError {
    fn from(e: sqlx::Error) -> Self {
        SendError::Db(e)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ParticipantRow {
    id: u64,
    full_name: String,
    profile_picture_url: Option<String>,
    unread_count: i32,
}

#[derive(Debug, sqlx::FromRow)]
struct LastMessageRow {
    id: u64,
    content: Option<String>,
    image_url: Option<String>,
    is_recalled: bool,
    sender_id: u64,
    sender_name: String,
    sender_avatar: Option<String>,
    read_by: Option<String>,
    created_at: chrono::NaiveDateTime,
}

pub async fn conversation_ids_for(pool: &MySqlPool, user_id: u64) -> Result<Vec<u64>, sqlx::Error> {
    sqlx::query_scalar::<_, u64>(
        "SELECT conversation_id FROM conversation_participants WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub async fn is_participant(
    pool: &MySqlPool,
    conversation_id: u64,
    user_id: u64,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM conversation_participants WHERE conversation_id = ? AND user_id = ?)",
    )
    .bind(conversation_id)
    .bind(user_id)
    .fetch_one(pool)
    .await
}

/// Every conversation the viewer belongs to, newest activity first.
pub async fn conversations_for(
    pool: &MySqlPool,
    viewer_id: u64,
) -> Result<Vec<ConversationView>, sqlx::Error> {
    let conversations = sqlx::query_as::<_, Conversation>(
        "SELECT c.id, c.is_group_chat, c.group_name, c.group_notice, c.group_note, \
         c.group_admin_id, c.last_message_id, c.created_at, c.updated_at \
         FROM conversations c \
         JOIN conversation_participants cp ON cp.conversation_id = c.id \
         WHERE cp.user_id = ? ORDER BY c.updated_at DESC",
    )
    .bind(viewer_id)
    .fetch_all(pool)
    .await?;

    let mut views = Vec::with_capacity(conversations.len());
    for conversation in conversations {
        views.push(hydrate(pool, conversation, viewer_id).await?);
    }
    Ok(views)
}

pub async fn conversation_view(
    pool: &MySqlPool,
    conversation_id: u64,
    viewer_id: u64,
) -> Result<Option<ConversationView>, sqlx::Error> {
    let conversation = sqlx::query_as::<_, Conversation>(&format!(
        "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?"
    ))
    .bind(conversation_id)
    .fetch_optional(pool)
    .await?;

    match conversation {
        Some(c) => Ok(Some(hydrate(pool, c, viewer_id).await?)),
        None => Ok(None),
    }
}

async fn hydrate(
    pool: &MySqlPool,
    conversation: Conversation,
    viewer_id: u64,
) -> Result<ConversationView, sqlx::Error> {
    let rows = sqlx::query_as::<_, ParticipantRow>(
        "SELECT u.id, u.full_name, u.profile_picture_url, cp.unread_count \
         FROM conversation_participants cp \
         JOIN users u ON u.id = cp.user_id \
         WHERE cp.conversation_id = ? ORDER BY u.id",
    )
    .bind(conversation.id)
    .fetch_all(pool)
    .await?;

    let mut participants = Vec::with_capacity(rows.len());
    let mut unread_counts = HashMap::with_capacity(rows.len());
    for row in rows {
        unread_counts.insert(row.id, row.unread_count);
        participants.push(UserBrief {
            id: row.id,
            full_name: row.full_name,
            profile_picture_url: row.profile_picture_url,
        });
    }

    let group_admin = match conversation.group_admin_id {
        Some(admin_id) => {
            sqlx::query_as::<_, UserBrief>(
                "SELECT id, full_name, profile_picture_url FROM users WHERE id = ?",
            )
            .bind(admin_id)
            .fetch_optional(pool)
            .await?
        }
        None => None,
    };

    let last_message = match conversation.last_message_id {
        Some(message_id) => last_message_preview(pool, message_id).await?,
        None => None,
    };

    // A failed count must not sink the whole listing.
    let unread_count = real_unread_count(pool, conversation.id, viewer_id)
        .await
        .unwrap_or(0);

    Ok(ConversationView {
        id: conversation.id,
        is_group_chat: conversation.is_group_chat,
        group_name: conversation.group_name,
        group_notice: conversation.group_notice,
        group_note: conversation.group_note,
        group_admin,
        participants,
        last_message,
        unread_counts,
        unread_count,
        created_at: conversation.created_at,
        updated_at: conversation.updated_at,
    })
}

async fn last_message_preview(
    pool: &MySqlPool,
    message_id: u64,
) -> Result<Option<LastMessage>, sqlx::Error> {
    let row = sqlx::query_as::<_, LastMessageRow>(
        "SELECT m.id, m.content, m.image_url, m.is_recalled, m.created_at, \
         u.id AS sender_id, u.full_name AS sender_name, u.profile_picture_url AS sender_avatar, \
         CAST(GROUP_CONCAT(mr.user_id) AS CHAR) AS read_by \
         FROM messages m \
         JOIN users u ON u.id = m.sender_id \
         LEFT JOIN message_reads mr ON mr.message_id = m.id \
         WHERE m.id = ? \
         GROUP BY m.id, m.content, m.image_url, m.is_recalled, m.created_at, \
         u.id, u.full_name, u.profile_picture_url",
    )
    .bind(message_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| LastMessage {
        id: r.id,
        content: r.content,
        image_url: r.image_url,
        sender: Some(UserBrief {
            id: r.sender_id,
            full_name: r.sender_name,
            profile_picture_url: r.sender_avatar,
        }),
        is_recalled: r.is_recalled,
        read_by: parse_id_list(r.read_by.as_deref()),
        created_at: r.created_at,
    }))
}

/// Messages the viewer has not read yet, excluding their own.
async fn real_unread_count(
    pool: &MySqlPool,
    conversation_id: u64,
    viewer_id: u64,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM messages m \
         WHERE m.conversation_id = ? AND m.sender_id != ? \
         AND NOT EXISTS (SELECT 1 FROM message_reads mr WHERE mr.message_id = m.id AND mr.user_id = ?)",
    )
    .bind(conversation_id)
    .bind(viewer_id)
    .bind(viewer_id)
    .fetch_one(pool)
    .await
}

/// Full history of one conversation, oldest first.
pub async fn messages_for(
    pool: &MySqlPool,
    conversation_id: u64,
) -> Result<Vec<MessageView>, sqlx::Error> {
    let rows = sqlx::query_as::<_, MessageJoined>(&format!(
        "{MESSAGE_SELECT} WHERE m.conversation_id = ? {MESSAGE_GROUP} \
         ORDER BY m.created_at ASC, m.id ASC"
    ))
    .bind(conversation_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(MessageView::from).collect())
}

pub async fn message_view(
    pool: &MySqlPool,
    message_id: u64,
) -> Result<Option<MessageView>, sqlx::Error> {
    let row = sqlx::query_as::<_, MessageJoined>(&format!(
        "{MESSAGE_SELECT} WHERE m.id = ? {MESSAGE_GROUP}"
    ))
    .bind(message_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(MessageView::from))
}

/// Persist a message and roll the conversation forward.
///
/// The sender counts as having read their own message. Everyone else's
/// stored unread counter bumps by one; the conversation's last-message
/// pointer and activity timestamp move with it.
pub async fn send_message(
    pool: &MySqlPool,
    sender_id: u64,
    conversation_id: u64,
    content: Option<&str>,
    image_url: Option<&str>,
    reply_to: Option<u64>,
) -> Result<MessageView, SendError> {
    let content = content.map(str::trim).filter(|c| !c.is_empty());
    let image_url = image_url.map(str::trim).filter(|u| !u.is_empty());
    if content.is_none() && image_url.is_none() {
        return Err(SendError::EmptyMessage);
    }

    if !is_participant(pool, conversation_id, sender_id).await? {
        return Err(SendError::NotParticipant);
    }

    let result = sqlx::query(
        "INSERT INTO messages (conversation_id, sender_id, content, image_url, reply_to_id) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(conversation_id)
    .bind(sender_id)
    .bind(content)
    .bind(image_url)
    .bind(reply_to)
    .execute(pool)
    .await?;

    // LAST_INSERT_ID() is per-connection; a follow-up query through the
    // pool may land on another connection, so take the id from the result.
    let message_id = result.last_insert_id();

    sqlx::query("INSERT INTO message_reads (message_id, user_id) VALUES (?, ?)")
        .bind(message_id)
        .bind(sender_id)
        .execute(pool)
        .await?;

    sqlx::query(
        "UPDATE conversation_participants SET unread_count = unread_count + 1 \
         WHERE conversation_id = ? AND user_id != ?",
    )
    .bind(conversation_id)
    .bind(sender_id)
    .execute(pool)
    .await?;

    sqlx::query("UPDATE conversations SET last_message_id = ?, updated_at = NOW() WHERE id = ?")
        .bind(message_id)
        .bind(conversation_id)
        .execute(pool)
        .await?;

    message_view(pool, message_id)
        .await?
        .ok_or(SendError::Db(sqlx::Error::RowNotFound))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_errors_carry_client_facing_messages() {
        assert_eq!(
            SendError::EmptyMessage.to_string(),
            "Failed to send message: Invalid data."
        );
        assert_eq!(
            SendError::NotParticipant.to_string(),
            "Not authorized to send message."
        );
        assert_eq!(
            SendError::Db(sqlx::Error::RowNotFound).to_string(),
            "Failed to save or broadcast message."
        );
    }
}
