use actix_web::{web, HttpRequest, HttpResponse};
use actix_ws::Message;
use futures_util::StreamExt;
use once_cell::sync::Lazy;
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::{error, info, warn};

use super::events::{ClientEvent, DedupWindow, OutboundMessage, ServerEvent};
use super::hub::ChatHub;
use super::store::{self, SendError};
use crate::auth::jwt::verify_token;
use crate::config::Config;

static SEND_DEDUP: Lazy<DedupWindow> = Lazy::new(DedupWindow::default);

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: String,
}

/// Socket upgrade endpoint: GET /ws?token=<jwt>
///
/// The token rides the query string because browsers cannot set headers
/// on a WebSocket handshake. After the upgrade the session joins one
/// room per conversation the user belongs to; rooms for conversations
/// created later are joined through the joinRoom frame.
pub async fn ws_entry(
    req: HttpRequest,
    stream: web::Payload,
    query: web::Query<WsQuery>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    hub: web::Data<ChatHub>,
) -> actix_web::Result<HttpResponse> {
    let claims = verify_token(&query.token, &config.jwt_secret)
        .map_err(|_| actix_web::error::ErrorUnauthorized("Authentication error"))?;
    let user_id = claims.user_id;

    let (response, session, msg_stream) = actix_ws::handle(&req, stream)?;

    let (conn_id, mut rx) = hub.connect(user_id);

    let conversation_ids = store::conversation_ids_for(pool.get_ref(), user_id)
        .await
        .map_err(|e| {
            error!(error = %e, user_id, "Failed to load conversation rooms");
            actix_web::error::ErrorInternalServerError("Server Error")
        })?;
    for conversation_id in &conversation_ids {
        hub.join_room(*conversation_id, user_id);
    }
    info!(user_id, rooms = conversation_ids.len(), "chat session started");

    // Writer: drains the hub channel into the socket. The channel closing
    // (hub replacement or disconnect) ends the session.
    let mut writer = session.clone();
    actix_web::rt::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if writer.text(frame).await.is_err() {
                break;
            }
        }
        let _ = writer.close(None).await;
    });

    // Reader: client frames in, cleanup on close or protocol error.
    actix_web::rt::spawn(async move {
        let mut msg_stream = msg_stream;
        let mut session = session;
        while let Some(Ok(msg)) = msg_stream.next().await {
            match msg {
                Message::Text(text) => {
                    handle_frame(&text, user_id, pool.get_ref(), &hub).await;
                }
                Message::Ping(bytes) => {
                    let _ = session.pong(&bytes).await;
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
        hub.disconnect(user_id, conn_id);
    });

    Ok(response)
}

async fn handle_frame(text: &str, user_id: u64, pool: &MySqlPool, hub: &ChatHub) {
    let event = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            warn!(user_id, error = %e, "Unparseable chat frame dropped");
            return;
        }
    };

    match event {
        ClientEvent::JoinRoom { conversation_id } => {
            match store::is_participant(pool, conversation_id, user_id).await {
                Ok(true) => hub.join_room(conversation_id, user_id),
                Ok(false) => {
                    warn!(user_id, conversation_id, "joinRoom refused, not a participant")
                }
                Err(e) => error!(error = %e, user_id, "Membership check failed"),
            }
        }
        ClientEvent::SendMessage {
            conversation_id,
            content,
            image_url,
            reply_to,
            pending_id,
        } => {
            let body = content.as_deref().or(image_url.as_deref()).unwrap_or("");
            if SEND_DEDUP.check(&DedupWindow::key(user_id, conversation_id, body)) {
                info!(user_id, conversation_id, "Duplicate send dropped");
                return;
            }

            let sent = store::send_message(
                pool,
                user_id,
                conversation_id,
                content.as_deref(),
                image_url.as_deref(),
                reply_to,
            )
            .await;

            match sent {
                Ok(message) => {
                    // The sender proved membership, so a missing room entry
                    // (conversation created after connect) is filled here.
                    hub.join_room(conversation_id, user_id);
                    deliver_message(pool, hub, conversation_id, user_id, message, pending_id)
                        .await;
                }
                Err(e) => {
                    if let SendError::Db(ref db_err) = e {
                        error!(error = %db_err, user_id, conversation_id, "Failed to store message");
                    }
                    hub.send_to_user(
                        user_id,
                        &ServerEvent::MessageError {
                            message: e.to_string(),
                        },
                    );
                }
            }
        }
        ClientEvent::Ping => hub.send_to_user(user_id, &ServerEvent::Pong),
    }
}

/// Fan a stored message out to the room: the message itself with the
/// sender's pending id, then the refreshed conversation snapshot.
async fn deliver_message(
    pool: &MySqlPool,
    hub: &ChatHub,
    conversation_id: u64,
    sender_id: u64,
    message: crate::model::message::MessageView,
    pending_id: Option<String>,
) {
    hub.broadcast_to_room(
        conversation_id,
        &ServerEvent::ReceiveMessage(OutboundMessage {
            message,
            pending_id,
        }),
    );

    match store::conversation_view(pool, conversation_id, sender_id).await {
        Ok(Some(conversation)) => {
            hub.broadcast_to_room(conversation_id, &ServerEvent::ConversationUpdated(conversation));
        }
        Ok(None) => {}
        Err(e) => {
            // The message is already delivered; only the snapshot is stale.
            warn!(error = %e, conversation_id, "Conversation refresh failed after send");
        }
    }
}
