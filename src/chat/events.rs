use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::model::conversation::ConversationView;
use crate::model::message::MessageView;

/// Frames a client may send over the socket. The wire format is
/// `{"event": "...", "data": {...}}`; unit events carry no data.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    JoinRoom { conversation_id: u64 },
    #[serde(rename_all = "camelCase")]
    SendMessage {
        conversation_id: u64,
        content: Option<String>,
        image_url: Option<String>,
        reply_to: Option<u64>,
        /// Client-side temp id, echoed back so the sender can reconcile
        /// its optimistic message with the stored one.
        pending_id: Option<String>,
    },
    Ping,
}

/// A stored message on its way out, with the sender's pending id attached.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundMessage {
    #[serde(flatten)]
    pub message: MessageView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_id: Option<String>,
}

/// Frames the server pushes to connected clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    ReceiveMessage(OutboundMessage),
    ConversationUpdated(ConversationView),
    MessageUpdated(MessageView),
    #[serde(rename_all = "camelCase")]
    MessageDeleted { message_id: u64 },
    MessageError { message: String },
    Pong,
}

impl ServerEvent {
    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

const DEDUP_PURGE_THRESHOLD: usize = 1024;

/// Collapses rapid duplicate sends. A retry storm after a flaky
/// connection can deliver the same sendMessage frame more than once;
/// the second arrival inside the window is dropped silently.
pub struct DedupWindow {
    seen: DashMap<String, Instant>,
    window: Duration,
}

impl DedupWindow {
    pub fn new(window: Duration) -> Self {
        Self {
            seen: DashMap::new(),
            window,
        }
    }

    pub fn key(sender_id: u64, conversation_id: u64, body: &str) -> String {
        format!("{}:{}:{}", sender_id, conversation_id, body)
    }

    /// Returns true when the key was seen inside the window. Records the
    /// key either way so the window restarts on every arrival.
    pub fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> bool {
        let duplicate = self
            .seen
            .get(key)
            .map(|hit| now.duration_since(*hit) < self.window)
            .unwrap_or(false);
        self.seen.insert(key.to_owned(), now);

        if self.seen.len() > DEDUP_PURGE_THRESHOLD {
            let window = self.window;
            self.seen.retain(|_, hit| now.duration_since(*hit) < window);
        }

        duplicate
    }
}

impl Default for DedupWindow {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::user::UserBrief;
    use chrono::NaiveDate;

    #[test]
    fn duplicate_inside_window_is_flagged() {
        let dedup = DedupWindow::new(Duration::from_secs(2));
        let base = Instant::now();
        let key = DedupWindow::key(7, 3, "hello");

        assert!(!dedup.check_at(&key, base));
        assert!(dedup.check_at(&key, base + Duration::from_millis(500)));
    }

    #[test]
    fn resend_after_window_passes() {
        let dedup = DedupWindow::new(Duration::from_secs(2));
        let base = Instant::now();
        let key = DedupWindow::key(7, 3, "hello");

        assert!(!dedup.check_at(&key, base));
        assert!(!dedup.check_at(&key, base + Duration::from_secs(3)));
    }

    #[test]
    fn different_bodies_do_not_collide() {
        let dedup = DedupWindow::new(Duration::from_secs(2));
        let base = Instant::now();

        assert!(!dedup.check_at(&DedupWindow::key(7, 3, "a"), base));
        assert!(!dedup.check_at(&DedupWindow::key(7, 3, "b"), base));
        assert!(!dedup.check_at(&DedupWindow::key(8, 3, "a"), base));
    }

    #[test]
    fn client_events_decode_from_tagged_json() {
        let joined: ClientEvent =
            serde_json::from_str(r#"{"event":"joinRoom","data":{"conversationId":5}}"#).unwrap();
        assert!(matches!(joined, ClientEvent::JoinRoom { conversation_id: 5 }));

        let sent: ClientEvent = serde_json::from_str(
            r#"{"event":"sendMessage","data":{"conversationId":5,"content":"hi","pendingId":"tmp-1"}}"#,
        )
        .unwrap();
        match sent {
            ClientEvent::SendMessage {
                conversation_id,
                content,
                image_url,
                pending_id,
                ..
            } => {
                assert_eq!(conversation_id, 5);
                assert_eq!(content.as_deref(), Some("hi"));
                assert!(image_url.is_none());
                assert_eq!(pending_id.as_deref(), Some("tmp-1"));
            }
            other => panic!("unexpected event: {:?}", other),
        }

        let ping: ClientEvent = serde_json::from_str(r#"{"event":"ping"}"#).unwrap();
        assert!(matches!(ping, ClientEvent::Ping));
    }

    #[test]
    fn server_events_encode_with_event_tag() {
        let deleted = ServerEvent::MessageDeleted { message_id: 42 };
        assert_eq!(
            deleted.encode(),
            r#"{"event":"messageDeleted","data":{"messageId":42}}"#
        );

        let failed = ServerEvent::MessageError {
            message: "Failed to send message: Invalid data.".into(),
        };
        let json: serde_json::Value = serde_json::from_str(&failed.encode()).unwrap();
        assert_eq!(json["event"], "messageError");
        assert_eq!(json["data"]["message"], "Failed to send message: Invalid data.");
    }

    #[test]
    fn outbound_message_flattens_and_echoes_pending_id() {
        let view = MessageView {
            id: 9,
            conversation_id: 4,
            sender: UserBrief {
                id: 2,
                full_name: "Aye Chan".into(),
                profile_picture_url: None,
            },
            content: Some("hello".into()),
            image_url: None,
            reply_to: None,
            is_recalled: false,
            read_by: vec![2],
            created_at: NaiveDate::from_ymd_opt(2026, 3, 1)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap(),
        };

        let event = ServerEvent::ReceiveMessage(OutboundMessage {
            message: view,
            pending_id: Some("tmp-7".into()),
        });
        let json: serde_json::Value = serde_json::from_str(&event.encode()).unwrap();
        assert_eq!(json["event"], "receiveMessage");
        assert_eq!(json["data"]["id"], 9);
        assert_eq!(json["data"]["conversationId"], 4);
        assert_eq!(json["data"]["pendingId"], "tmp-7");
        assert_eq!(json["data"]["sender"]["fullName"], "Aye Chan");
    }
}
