use std::collections::HashSet;

use actix_web::{HttpResponse, Responder, web};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::error;
use utoipa::ToSchema;

use crate::{
    auth::auth::AuthUser,
    chat::{ChatHub, events::ServerEvent, store},
    model::{message::Message, role::Role},
    utils::db_utils::{build_update_sql, execute_update},
};

/// Seconds a sender has to take a message back.
const RECALL_WINDOW_SECS: i64 = 10;

/// Sentinel marking a message as a collaborative group note. The rest of
/// the content is JSON with an `entries` array members append to.
const GROUP_NOTE_PREFIX: &str = "@@GROUP_NOTE@@";

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateDm {
    pub recipient_id: u64,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroup {
    pub group_name: String,
    pub participant_ids: Vec<u64>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GroupAdd {
    pub conversation_id: u64,
    pub new_participant_ids: Vec<u64>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GroupRemove {
    pub conversation_id: u64,
    pub participant_id: u64,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JoinNote {
    pub message_id: u64,
    /// Appended to the note's `entries` array as-is.
    #[schema(value_type = Object)]
    pub new_entry: serde_json::Value,
}

#[utoipa::path(
    get,
    path = "/api/chat",
    responses((status = 200, description = "Caller's conversations, newest activity first")),
    security(("bearer_auth" = [])),
    tag = "Chat"
)]
pub async fn list_conversations(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let conversations = store::conversations_for(pool.get_ref(), auth.user_id)
        .await
        .map_err(|e| {
            error!(error = %e, user_id = auth.user_id, "Failed to fetch conversations");
            actix_web::error::ErrorInternalServerError("Server Error")
        })?;

    Ok(HttpResponse::Ok().json(conversations))
}

#[utoipa::path(
    get,
    path = "/api/chat/messages/{conversation_id}",
    params(("conversation_id", description = "Conversation ID")),
    responses(
        (status = 200, description = "Messages oldest first, sender and reply populated"),
        (status = 403, description = "Caller is not a participant")
    ),
    security(("bearer_auth" = [])),
    tag = "Chat"
)]
pub async fn get_messages(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let conversation_id = path.into_inner();

    let member = store::is_participant(pool.get_ref(), conversation_id, auth.user_id)
        .await
        .map_err(|e| {
            error!(error = %e, conversation_id, "Membership check failed");
            actix_web::error::ErrorInternalServerError("Server error.")
        })?;
    if !member {
        return Ok(HttpResponse::Forbidden().json(json!({ "message": "Not authorized" })));
    }

    let messages = store::messages_for(pool.get_ref(), conversation_id)
        .await
        .map_err(|e| {
            error!(error = %e, conversation_id, "Failed to fetch messages");
            actix_web::error::ErrorInternalServerError("Server error.")
        })?;

    Ok(HttpResponse::Ok().json(messages))
}

#[utoipa::path(
    post,
    path = "/api/chat",
    request_body = CreateDm,
    responses(
        (status = 200, description = "Existing two-person conversation"),
        (status = 201, description = "Conversation created")
    ),
    security(("bearer_auth" = [])),
    tag = "Chat"
)]
pub async fn create_dm(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateDm>,
) -> actix_web::Result<impl Responder> {
    let sender_id = auth.user_id;
    let recipient_id = payload.recipient_id;

    let existing = sqlx::query_scalar::<_, u64>(
        "SELECT c.id FROM conversations c \
         JOIN conversation_participants p1 ON p1.conversation_id = c.id AND p1.user_id = ? \
         JOIN conversation_participants p2 ON p2.conversation_id = c.id AND p2.user_id = ? \
         WHERE c.is_group_chat = FALSE \
         AND (SELECT COUNT(*) FROM conversation_participants cp WHERE cp.conversation_id = c.id) = 2 \
         LIMIT 1",
    )
    .bind(sender_id)
    .bind(recipient_id)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to look up direct conversation");
        actix_web::error::ErrorInternalServerError("Server error.")
    })?;

    if let Some(conversation_id) = existing {
        let view = fetch_conversation(pool.get_ref(), conversation_id, sender_id).await?;
        return Ok(HttpResponse::Ok().json(view));
    }

    let result = sqlx::query("INSERT INTO conversations (is_group_chat) VALUES (FALSE)")
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to create conversation");
            actix_web::error::ErrorInternalServerError("Server error.")
        })?;

    let conversation_id = result.last_insert_id();

    sqlx::query("INSERT INTO conversation_participants (conversation_id, user_id) VALUES (?, ?), (?, ?)")
        .bind(conversation_id)
        .bind(sender_id)
        .bind(conversation_id)
        .bind(recipient_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, conversation_id, "Failed to add participants");
            actix_web::error::ErrorInternalServerError("Server error.")
        })?;

    let view = fetch_conversation(pool.get_ref(), conversation_id, sender_id).await?;
    Ok(HttpResponse::Created().json(view))
}

#[utoipa::path(
    post,
    path = "/api/chat/group",
    request_body = CreateGroup,
    responses((status = 201, description = "Group created, caller is group admin")),
    security(("bearer_auth" = [])),
    tag = "Chat"
)]
pub async fn create_group(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateGroup>,
) -> actix_web::Result<impl Responder> {
    let admin_id = auth.user_id;
    let group_name = payload.group_name.trim();

    let result = sqlx::query(
        "INSERT INTO conversations (is_group_chat, group_name, group_admin_id) VALUES (TRUE, ?, ?)",
    )
    .bind(group_name)
    .bind(admin_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to create group");
        actix_web::error::ErrorInternalServerError("Server error.")
    })?;

    let conversation_id = result.last_insert_id();

    // The creator is always a member; duplicate ids collapse to one row.
    let mut seen = HashSet::new();
    for user_id in std::iter::once(admin_id).chain(payload.participant_ids.iter().copied()) {
        if !seen.insert(user_id) {
            continue;
        }
        sqlx::query("INSERT IGNORE INTO conversation_participants (conversation_id, user_id) VALUES (?, ?)")
            .bind(conversation_id)
            .bind(user_id)
            .execute(pool.get_ref())
            .await
            .map_err(|e| {
                error!(error = %e, conversation_id, user_id, "Failed to add group member");
                actix_web::error::ErrorInternalServerError("Server error.")
            })?;
    }

    let view = fetch_conversation(pool.get_ref(), conversation_id, admin_id).await?;
    Ok(HttpResponse::Created().json(view))
}

#[utoipa::path(
    put,
    path = "/api/chat/group/{conversation_id}",
    request_body = serde_json::Value,
    params(("conversation_id", description = "Conversation ID")),
    responses(
        (status = 200, description = "Updated conversation"),
        (status = 404, description = "Conversation not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Chat"
)]
pub async fn update_group(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<serde_json::Value>,
) -> actix_web::Result<impl Responder> {
    let conversation_id = path.into_inner();

    let update = build_update_sql(
        "conversations",
        &payload,
        &[
            ("groupName", "group_name"),
            ("groupNotice", "group_notice"),
            ("groupNote", "group_note"),
        ],
        "id",
        conversation_id,
    )?;

    execute_update(pool.get_ref(), update).await.map_err(|e| {
        error!(error = %e, conversation_id, "Failed to update group");
        actix_web::error::ErrorInternalServerError("Server Error")
    })?;

    let view = store::conversation_view(pool.get_ref(), conversation_id, auth.user_id)
        .await
        .map_err(|e| {
            error!(error = %e, conversation_id, "Failed to fetch group");
            actix_web::error::ErrorInternalServerError("Server Error")
        })?;

    match view {
        Some(v) => Ok(HttpResponse::Ok().json(v)),
        None => Ok(HttpResponse::NotFound().json(json!({ "message": "Conversation not found" }))),
    }
}

#[utoipa::path(
    put,
    path = "/api/chat/groupadd",
    request_body = GroupAdd,
    responses((status = 200, description = "Updated conversation")),
    security(("bearer_auth" = [])),
    tag = "Chat"
)]
pub async fn group_add(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    hub: web::Data<ChatHub>,
    payload: web::Json<GroupAdd>,
) -> actix_web::Result<impl Responder> {
    let conversation_id = payload.conversation_id;

    for user_id in &payload.new_participant_ids {
        sqlx::query("INSERT IGNORE INTO conversation_participants (conversation_id, user_id) VALUES (?, ?)")
            .bind(conversation_id)
            .bind(user_id)
            .execute(pool.get_ref())
            .await
            .map_err(|e| {
                error!(error = %e, conversation_id, user_id, "Failed to add participant");
                actix_web::error::ErrorInternalServerError("Server error.")
            })?;

        // Connected members start receiving room broadcasts right away.
        if hub.is_online(*user_id) {
            hub.join_room(conversation_id, *user_id);
        }
    }

    let view = fetch_conversation(pool.get_ref(), conversation_id, auth.user_id).await?;
    Ok(HttpResponse::Ok().json(view))
}

#[utoipa::path(
    put,
    path = "/api/chat/groupremove",
    request_body = GroupRemove,
    responses((status = 200, description = "Participant removed")),
    security(("bearer_auth" = [])),
    tag = "Chat"
)]
pub async fn group_remove(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    hub: web::Data<ChatHub>,
    payload: web::Json<GroupRemove>,
) -> actix_web::Result<impl Responder> {
    sqlx::query("DELETE FROM conversation_participants WHERE conversation_id = ? AND user_id = ?")
        .bind(payload.conversation_id)
        .bind(payload.participant_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, conversation_id = payload.conversation_id, "Failed to remove participant");
            actix_web::error::ErrorInternalServerError("Error")
        })?;

    hub.leave_room(payload.conversation_id, payload.participant_id);

    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

#[utoipa::path(
    post,
    path = "/api/chat/read/{conversation_id}",
    params(("conversation_id", description = "Conversation ID")),
    responses((status = 200, description = "Conversation marked read for the caller")),
    security(("bearer_auth" = [])),
    tag = "Chat"
)]
pub async fn mark_read(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let conversation_id = path.into_inner();

    sqlx::query(
        "UPDATE conversation_participants SET unread_count = 0 \
         WHERE conversation_id = ? AND user_id = ?",
    )
    .bind(conversation_id)
    .bind(auth.user_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, conversation_id, "Failed to reset unread counter");
        actix_web::error::ErrorInternalServerError("Server error.")
    })?;

    sqlx::query(
        "INSERT IGNORE INTO message_reads (message_id, user_id) \
         SELECT m.id, ? FROM messages m \
         WHERE m.conversation_id = ? AND m.sender_id != ?",
    )
    .bind(auth.user_id)
    .bind(conversation_id)
    .bind(auth.user_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, conversation_id, "Failed to mark messages read");
        actix_web::error::ErrorInternalServerError("Server error.")
    })?;

    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

#[utoipa::path(
    put,
    path = "/api/chat/note/join",
    request_body = JoinNote,
    responses(
        (status = 200, description = "Updated note message"),
        (status = 400, description = "Message is not a group note")
    ),
    security(("bearer_auth" = [])),
    tag = "Chat"
)]
pub async fn join_note(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    hub: web::Data<ChatHub>,
    payload: web::Json<JoinNote>,
) -> actix_web::Result<impl Responder> {
    let message_id = payload.message_id;

    let msg = match fetch_message(pool.get_ref(), message_id).await? {
        Some(m) => m,
        None => {
            return Ok(HttpResponse::BadRequest().json(json!({ "message": "Invalid note" })));
        }
    };

    let updated = msg
        .content
        .as_deref()
        .and_then(|content| append_note_entry(content, &payload.new_entry));
    let updated = match updated {
        Some(content) => content,
        None => {
            return Ok(HttpResponse::BadRequest().json(json!({ "message": "Invalid note" })));
        }
    };

    sqlx::query("UPDATE messages SET content = ? WHERE id = ?")
        .bind(&updated)
        .bind(message_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, message_id, "Failed to update group note");
            actix_web::error::ErrorInternalServerError("Server error")
        })?;

    let view = store::message_view(pool.get_ref(), message_id)
        .await
        .map_err(|e| {
            error!(error = %e, message_id, "Failed to fetch updated note");
            actix_web::error::ErrorInternalServerError("Server error")
        })?;

    match view {
        Some(v) => {
            hub.broadcast_to_room(msg.conversation_id, &ServerEvent::MessageUpdated(v.clone()));
            Ok(HttpResponse::Ok().json(v))
        }
        None => Ok(HttpResponse::BadRequest().json(json!({ "message": "Invalid note" }))),
    }
}

/// Append one entry to a group-note message body. Returns None when the
/// content is not a well-formed note, leaving the message untouched.
fn append_note_entry(content: &str, entry: &serde_json::Value) -> Option<String> {
    let body = content.strip_prefix(GROUP_NOTE_PREFIX)?;
    let mut note: serde_json::Value = serde_json::from_str(body).ok()?;
    note.get_mut("entries")?.as_array_mut()?.push(entry.clone());
    Some(format!("{GROUP_NOTE_PREFIX}{note}"))
}

#[utoipa::path(
    put,
    path = "/api/chat/recall/{message_id}",
    params(("message_id", description = "Message ID")),
    responses(
        (status = 200, description = "Message recalled"),
        (status = 400, description = "Recall window expired"),
        (status = 403, description = "Only the sender may recall"),
        (status = 404, description = "Message not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Chat"
)]
pub async fn recall_message(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    hub: web::Data<ChatHub>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let message_id = path.into_inner();

    let msg = match fetch_message(pool.get_ref(), message_id).await? {
        Some(m) => m,
        None => {
            return Ok(HttpResponse::NotFound().json(json!({ "message": "Message not found" })));
        }
    };

    if msg.sender_id != auth.user_id {
        return Ok(HttpResponse::Forbidden().json(json!({ "message": "Not authorized" })));
    }

    let age = Utc::now().naive_utc() - msg.created_at;
    if age > chrono::Duration::seconds(RECALL_WINDOW_SECS) {
        return Ok(HttpResponse::BadRequest()
            .json(json!({ "message": "Recall time expired (10s limit)" })));
    }

    sqlx::query("UPDATE messages SET is_recalled = TRUE WHERE id = ?")
        .bind(message_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, message_id, "Failed to recall message");
            actix_web::error::ErrorInternalServerError("Server error")
        })?;

    let view = store::message_view(pool.get_ref(), message_id)
        .await
        .map_err(|e| {
            error!(error = %e, message_id, "Failed to fetch recalled message");
            actix_web::error::ErrorInternalServerError("Server error")
        })?;

    match view {
        Some(v) => {
            hub.broadcast_to_room(msg.conversation_id, &ServerEvent::MessageUpdated(v.clone()));
            Ok(HttpResponse::Ok().json(json!({ "success": true, "message": v })))
        }
        None => Ok(HttpResponse::NotFound().json(json!({ "message": "Message not found" }))),
    }
}

#[utoipa::path(
    delete,
    path = "/api/chat/message/{message_id}",
    params(("message_id", description = "Message ID")),
    responses(
        (status = 200, description = "Message deleted"),
        (status = 403, description = "Sender or admin only"),
        (status = 404, description = "Message not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Chat"
)]
pub async fn delete_message(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    hub: web::Data<ChatHub>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let message_id = path.into_inner();

    let msg = match fetch_message(pool.get_ref(), message_id).await? {
        Some(m) => m,
        None => return Ok(HttpResponse::NotFound().json(json!({ "message": "Not found" }))),
    };

    let is_admin_user = auth.role == Role::Admin;
    if msg.sender_id != auth.user_id && !is_admin_user {
        return Ok(HttpResponse::Forbidden().json(json!({ "message": "Not authorized" })));
    }

    sqlx::query("DELETE FROM messages WHERE id = ?")
        .bind(message_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, message_id, "Failed to delete message");
            actix_web::error::ErrorInternalServerError("Server error")
        })?;

    hub.broadcast_to_room(msg.conversation_id, &ServerEvent::MessageDeleted { message_id });

    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

async fn fetch_message(pool: &MySqlPool, message_id: u64) -> actix_web::Result<Option<Message>> {
    sqlx::query_as::<_, Message>(
        "SELECT id, conversation_id, sender_id, content, image_url, reply_to_id, is_recalled, \
         created_at FROM messages WHERE id = ?",
    )
    .bind(message_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| {
        error!(error = %e, message_id, "Failed to fetch message");
        actix_web::error::ErrorInternalServerError("Server error")
    })
}

/// Hydrated view or 500; used where the conversation is known to exist.
async fn fetch_conversation(
    pool: &MySqlPool,
    conversation_id: u64,
    viewer_id: u64,
) -> actix_web::Result<crate::model::conversation::ConversationView> {
    store::conversation_view(pool, conversation_id, viewer_id)
        .await
        .map_err(|e| {
            error!(error = %e, conversation_id, "Failed to fetch conversation");
            actix_web::error::ErrorInternalServerError("Server error.")
        })?
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("Server error."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn note(entries: serde_json::Value) -> String {
        format!("{GROUP_NOTE_PREFIX}{}", json!({ "title": "Shift swap", "entries": entries }))
    }

    #[test]
    fn note_entry_appends_to_the_entries_array() {
        let content = note(json!([{ "user": 3, "text": "taking Tuesday" }]));
        let updated =
            append_note_entry(&content, &json!({ "user": 7, "text": "covering Friday" })).unwrap();

        assert!(updated.starts_with(GROUP_NOTE_PREFIX));
        let body: serde_json::Value =
            serde_json::from_str(updated.strip_prefix(GROUP_NOTE_PREFIX).unwrap()).unwrap();
        assert_eq!(body["entries"].as_array().unwrap().len(), 2);
        assert_eq!(body["entries"][1]["user"], 7);
        assert_eq!(body["title"], "Shift swap");
    }

    #[test]
    fn empty_note_accepts_the_first_entry() {
        let content = note(json!([]));
        let updated = append_note_entry(&content, &json!({ "user": 1 })).unwrap();
        let body: serde_json::Value =
            serde_json::from_str(updated.strip_prefix(GROUP_NOTE_PREFIX).unwrap()).unwrap();
        assert_eq!(body["entries"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn ordinary_messages_are_not_notes() {
        assert!(append_note_entry("hello there", &json!({})).is_none());
        assert!(append_note_entry("", &json!({})).is_none());
    }

    #[test]
    fn malformed_note_payloads_are_rejected() {
        let garbage = format!("{GROUP_NOTE_PREFIX}not json");
        assert!(append_note_entry(&garbage, &json!({})).is_none());

        let no_entries = format!("{GROUP_NOTE_PREFIX}{}", json!({ "title": "x" }));
        assert!(append_note_entry(&no_entries, &json!({})).is_none());

        let entries_not_array = format!("{GROUP_NOTE_PREFIX}{}", json!({ "entries": "x" }));
        assert!(append_note_entry(&entries_not_array, &json!({})).is_none());
    }
}
