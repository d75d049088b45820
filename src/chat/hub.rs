use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc;

use super::events::ServerEvent;

/// Channel carrying encoded frames to one socket's writer task.
pub type WsSender = mpsc::UnboundedSender<String>;

pub type ConnectionId = u64;

/// Registry of live chat sockets and the conversation rooms they sit in.
///
/// One socket per user: a reconnect replaces the previous session, whose
/// sender is dropped so its writer task winds down on its own. Room
/// membership tracks only online users; offline members catch up through
/// the stored unread counters.
pub struct ChatHub {
    /// user_id -> (connection_id, sender)
    sessions: DashMap<u64, (ConnectionId, WsSender)>,
    /// conversation_id -> online member user ids
    rooms: DashMap<u64, HashSet<u64>>,
    next_conn_id: AtomicU64,
}

impl ChatHub {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            rooms: DashMap::new(),
            next_conn_id: AtomicU64::new(1),
        }
    }

    /// Register a socket for a user, displacing any previous one.
    ///
    /// Returns the connection id plus the receiving end the writer task
    /// drains. Dropping the displaced sender is what disconnects the old
    /// socket.
    pub fn connect(&self, user_id: u64) -> (ConnectionId, mpsc::UnboundedReceiver<String>) {
        let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();

        let replaced = self.sessions.insert(user_id, (conn_id, tx)).is_some();
        tracing::info!(user_id, conn_id, replaced, "chat socket connected");

        (conn_id, rx)
    }

    /// Drop a user's socket, but only if `conn_id` still owns the entry.
    ///
    /// The guard matters on reconnect: the displaced socket's cleanup runs
    /// after the replacement registered, and must not evict it or strip
    /// its rooms.
    pub fn disconnect(&self, user_id: u64, conn_id: ConnectionId) {
        let removed = self
            .sessions
            .remove_if(&user_id, |_, (owner, _)| *owner == conn_id)
            .is_some();

        if removed {
            self.rooms.retain(|_, members| {
                members.remove(&user_id);
                !members.is_empty()
            });
            tracing::info!(user_id, conn_id, "chat socket disconnected");
        }
    }

    pub fn join_room(&self, conversation_id: u64, user_id: u64) {
        self.rooms
            .entry(conversation_id)
            .or_default()
            .insert(user_id);
    }

    pub fn leave_room(&self, conversation_id: u64, user_id: u64) {
        if let Some(mut members) = self.rooms.get_mut(&conversation_id) {
            members.remove(&user_id);
            let empty = members.is_empty();
            drop(members); // release the shard before removing the key
            if empty {
                self.rooms.remove(&conversation_id);
            }
        }
    }

    pub fn is_online(&self, user_id: u64) -> bool {
        self.sessions.contains_key(&user_id)
    }

    /// Push a frame to one user's socket, if connected. Send failures mean
    /// the writer task already ended; the read loop cleans up the entry.
    pub fn send_to_user(&self, user_id: u64, event: &ServerEvent) {
        if let Some(session) = self.sessions.get(&user_id) {
            if session.1.send(event.encode()).is_err() {
                tracing::warn!(user_id, "chat frame dropped, socket writer gone");
            }
        }
    }

    /// Push a frame to every online member of a conversation.
    pub fn broadcast_to_room(&self, conversation_id: u64, event: &ServerEvent) {
        let members: Vec<u64> = match self.rooms.get(&conversation_id) {
            Some(members) => members.iter().copied().collect(),
            None => return,
        };
        let frame = event.encode();
        for user_id in members {
            if let Some(session) = self.sessions.get(&user_id) {
                let _ = session.1.send(frame.clone());
            }
        }
    }

    /// (online users, active rooms)
    pub fn stats(&self) -> (usize, usize) {
        (self.sessions.len(), self.rooms.len())
    }
}

impl Default for ChatHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_event(body: &str) -> ServerEvent {
        ServerEvent::MessageError {
            message: body.into(),
        }
    }

    #[test]
    fn connect_and_disconnect_lifecycle() {
        let hub = ChatHub::new();

        let (conn_id, _rx) = hub.connect(1001);
        assert!(hub.is_online(1001));
        assert_eq!(hub.stats(), (1, 0));

        hub.disconnect(1001, conn_id);
        assert!(!hub.is_online(1001));
        assert_eq!(hub.stats(), (0, 0));
    }

    #[test]
    fn reconnect_replaces_previous_session() {
        let hub = ChatHub::new();

        let (old_conn, mut old_rx) = hub.connect(1001);
        let (new_conn, mut new_rx) = hub.connect(1001);
        assert_eq!(hub.stats(), (1, 0));

        hub.send_to_user(1001, &text_event("after reconnect"));
        assert!(new_rx.try_recv().is_ok());
        // The displaced sender was dropped, its channel is closed.
        assert!(old_rx.try_recv().is_err());

        // Stale cleanup from the displaced socket must not evict the new one.
        hub.disconnect(1001, old_conn);
        assert!(hub.is_online(1001));

        hub.disconnect(1001, new_conn);
        assert!(!hub.is_online(1001));
    }

    #[test]
    fn room_broadcast_reaches_online_members_only() {
        let hub = ChatHub::new();

        let (_c1, mut rx1) = hub.connect(1);
        let (_c2, mut rx2) = hub.connect(2);
        hub.join_room(10, 1);
        hub.join_room(10, 2);
        hub.join_room(10, 3); // never connected

        hub.broadcast_to_room(10, &text_event("hello room"));
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());

        hub.leave_room(10, 2);
        hub.broadcast_to_room(10, &text_event("again"));
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_err());
    }

    #[test]
    fn disconnect_strips_room_membership() {
        let hub = ChatHub::new();

        let (conn_id, _rx) = hub.connect(1);
        hub.join_room(10, 1);
        hub.join_room(11, 1);
        assert_eq!(hub.stats(), (1, 2));

        hub.disconnect(1, conn_id);
        assert_eq!(hub.stats(), (0, 0));
    }

    #[test]
    fn empty_room_is_dropped_on_leave() {
        let hub = ChatHub::new();

        let (_conn, _rx) = hub.connect(1);
        hub.join_room(10, 1);
        assert_eq!(hub.stats(), (1, 1));

        hub.leave_room(10, 1);
        assert_eq!(hub.stats(), (1, 0));
    }
}
