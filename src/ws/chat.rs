use std::collections::HashSet;

use axum::{
    extract::{State, WebSocketUpgrade, ws},
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::db::chat_db;
use crate::models::message::{Message, MessagePayload};
use crate::services::{helpers, room::RoomToken};
use crate::state::{AppState, ChatConnection, ChatNotification, ChatState};
use crate::ws::protocol::{ClientEvent, SendMessage, ServerEvent};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: ws::WebSocket, state: AppState) {
    let (sender, mut receiver) = socket.split();

    let connection_id = Uuid::new_v4().simple().to_string();
    let (tx, _) = broadcast::channel::<ChatNotification>(64);

    let rx = tx.subscribe();
    let send_task = tokio::spawn(forward_notifications(rx, sender));

    state.chat.connections.insert(
        connection_id.clone(),
        ChatConnection {
            rooms: HashSet::new(),
            tx: tx.clone(),
        },
    );

    let _ = tx.send(ChatNotification::Connected {
        connection_id: connection_id.clone(),
    });

    while let Some(Ok(msg)) = receiver.next().await {
        let text = match msg {
            ws::Message::Text(t) => t.to_string(),
            ws::Message::Close(_) => break,
            _ => continue,
        };

        let event: ClientEvent = match serde_json::from_str(&text) {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("Invalid WS event: {} - {}", text, e);
                continue;
            }
        };

        match event {
            ClientEvent::JoinRoom { room } => {
                // Repeated joins accumulate; a connection can sit in many
                // rooms at once (including its own user-id channel).
                if let Some(mut conn) = state.chat.connections.get_mut(&connection_id) {
                    conn.rooms.insert(room);
                }
            }
            ClientEvent::SendMessage(send) => {
                handle_send_message(&state, &tx, send).await;
            }
            ClientEvent::Typing {
                room,
                status,
                user_name,
            } => {
                broadcast_to_room_except(
                    &state.chat,
                    &room,
                    &connection_id,
                    ChatNotification::Typing {
                        room: room.clone(),
                        status,
                        user_name,
                    },
                );
            }
        }
    }

    send_task.abort();
    state.chat.connections.remove(&connection_id);
}

/// Drains a connection's notification channel into its websocket sink. A
/// lagged receiver loses the overflowed backlog but keeps the connection;
/// only a closed channel or a dead socket ends the task.
async fn forward_notifications<S>(mut rx: broadcast::Receiver<ChatNotification>, mut sink: S)
where
    S: futures::Sink<ws::Message> + Unpin,
{
    loop {
        let notification = match rx.recv().await {
            Ok(n) => n,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!("Slow connection dropped {} queued notifications", skipped);
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        let msg = match notification {
            ChatNotification::Connected { connection_id } => {
                ServerEvent::Connected { connection_id }
            }
            ChatNotification::Receive(payload) => ServerEvent::ReceiveMessage(payload),
            ChatNotification::Typing {
                room,
                status,
                user_name,
            } => ServerEvent::UserTyping {
                room,
                status,
                user_name,
            },
            ChatNotification::SendFailed { reason } => ServerEvent::SendFailed { reason },
        };

        let json = serde_json::to_string(&msg).unwrap_or_default();
        if sink.send(ws::Message::Text(json.into())).await.is_err() {
            break;
        }
    }
}

async fn handle_send_message(
    state: &AppState,
    tx: &broadcast::Sender<ChatNotification>,
    send: SendMessage,
) {
    let attachment = helpers::normalize_attachment(send.file_url, send.file_name);

    // Empty sends are dropped without an ack.
    if send.message.trim().is_empty() && attachment.is_none() {
        return;
    }

    let Some(receiver_id) = resolve_receiver(send.receiver_id.as_ref(), &send.room, send.sender_id)
    else {
        tracing::warn!(
            "Cannot resolve receiver for room '{}' (sender {})",
            send.room,
            send.sender_id
        );
        let _ = tx.send(ChatNotification::SendFailed {
            reason: "receiver could not be resolved; pass receiverId explicitly".to_string(),
        });
        return;
    };

    let (file_url, file_name) = match attachment {
        Some((url, name)) => (Some(url), Some(name)),
        None => (None, None),
    };

    let msg = Message {
        id: chat_db::new_guid(),
        room_id: send.room,
        sender_id: send.sender_id,
        receiver_id,
        sender_name: send.sender_name,
        text: send.message,
        file_url,
        file_name,
        is_read: false,
        created_at: helpers::now_iso(),
        created_at_epoch: helpers::to_epoch_millis(),
    };

    // Persist before fan-out so broadcast order matches commit order and a
    // delivered message is never lost.
    if let Err(e) = chat_db::insert_message(&state.db, &msg).await {
        tracing::error!("Failed to persist chat message: {}", e);
        let _ = tx.send(ChatNotification::SendFailed {
            reason: "message could not be saved".to_string(),
        });
        return;
    }

    fan_out_message(&state.chat, &msg.room_id, msg.receiver_id, msg.to_payload());
}

/// Explicit receiver id wins when numeric; otherwise the counterpart is
/// derived from the room token, preferring the segment that is not the
/// sender. Tokens that carry no usable id yield `None` and the send is
/// rejected rather than guessed at.
fn resolve_receiver(
    explicit: Option<&serde_json::Value>,
    room: &str,
    sender_id: i64,
) -> Option<i64> {
    if let Some(id) = explicit.and_then(helpers::parse_user_id) {
        return Some(id);
    }
    RoomToken::parse(room).counterpart(Some(sender_id))
}

/// Dual fan-out: every connection joined to the room, plus every connection
/// subscribed to the receiver's individual channel. The two sinks are
/// independent, so a connection joined to both gets the message twice
/// (at-least-once; dedup is the consumer's job).
fn fan_out_message(chat: &ChatState, room: &str, receiver_id: i64, payload: MessagePayload) {
    let notification = ChatNotification::Receive(payload);
    let receiver_channel = receiver_id.to_string();

    for entry in chat.connections.iter() {
        if entry.rooms.contains(room) {
            let _ = entry.tx.send(notification.clone());
        }
        if receiver_channel != room && entry.rooms.contains(&receiver_channel) {
            let _ = entry.tx.send(notification.clone());
        }
    }
}

fn broadcast_to_room_except(
    chat: &ChatState,
    room: &str,
    except_id: &str,
    notification: ChatNotification,
) {
    for entry in chat.connections.iter() {
        if entry.rooms.contains(room) && entry.key() != except_id {
            let _ = entry.tx.send(notification.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn join(chat: &ChatState, connection_id: &str, rooms: &[&str]) -> broadcast::Receiver<ChatNotification> {
        let (tx, rx) = broadcast::channel(8);
        chat.connections.insert(
            connection_id.to_string(),
            ChatConnection {
                rooms: rooms.iter().map(|r| r.to_string()).collect(),
                tx,
            },
        );
        rx
    }

    fn payload(room: &str, sender_id: i64, receiver_id: i64) -> MessagePayload {
        MessagePayload {
            room: room.to_string(),
            sender_id,
            receiver_id,
            sender_name: "Ali".to_string(),
            message: "Hello".to_string(),
            file_url: None,
            file_name: None,
            time: "02:05 PM".to_string(),
        }
    }

    #[test]
    fn explicit_receiver_id_wins() {
        assert_eq!(resolve_receiver(Some(&json!(40)), "31_32", 31), Some(40));
        assert_eq!(resolve_receiver(Some(&json!("40")), "31_32", 31), Some(40));
    }

    #[test]
    fn receiver_derived_from_room_prefers_non_sender_segment() {
        assert_eq!(resolve_receiver(None, "31_32", 31), Some(32));
        assert_eq!(resolve_receiver(None, "31_32", 32), Some(31));
        assert_eq!(resolve_receiver(None, "private_32", 31), Some(32));
        assert_eq!(resolve_receiver(None, "32", 31), Some(32));
    }

    #[test]
    fn opaque_room_without_explicit_receiver_is_unresolvable() {
        assert_eq!(resolve_receiver(None, "class-7b", 31), None);
        // A non-numeric receiverId does not rescue it either.
        assert_eq!(resolve_receiver(Some(&json!("all")), "class-7b", 31), None);
    }

    #[test]
    fn fan_out_reaches_room_members_and_receiver_channel() {
        let chat = ChatState::new();
        let mut in_room = join(&chat, "c1", &["31_32"]);
        let mut on_channel = join(&chat, "c2", &["32"]);
        let mut bystander = join(&chat, "c3", &["99"]);

        fan_out_message(&chat, "31_32", 32, payload("31_32", 31, 32));

        assert!(matches!(
            in_room.try_recv(),
            Ok(ChatNotification::Receive(_))
        ));
        assert!(matches!(
            on_channel.try_recv(),
            Ok(ChatNotification::Receive(_))
        ));
        assert!(bystander.try_recv().is_err());
    }

    #[test]
    fn fan_out_duplicates_for_connection_on_both_sinks() {
        let chat = ChatState::new();
        let mut both = join(&chat, "c1", &["31_32", "32"]);

        fan_out_message(&chat, "31_32", 32, payload("31_32", 31, 32));

        assert!(both.try_recv().is_ok());
        assert!(both.try_recv().is_ok());
        assert!(both.try_recv().is_err());
    }

    #[test]
    fn fan_out_skips_receiver_channel_when_it_is_the_room() {
        let chat = ChatState::new();
        let mut conn = join(&chat, "c1", &["32"]);

        fan_out_message(&chat, "32", 32, payload("32", 31, 32));

        assert!(conn.try_recv().is_ok());
        assert!(conn.try_recv().is_err());
    }

    #[test]
    fn typing_relay_excludes_originator() {
        let chat = ChatState::new();
        let mut origin = join(&chat, "c1", &["31_32"]);
        let mut peer = join(&chat, "c2", &["31_32"]);

        broadcast_to_room_except(
            &chat,
            "31_32",
            "c1",
            ChatNotification::Typing {
                room: "31_32".to_string(),
                status: true,
                user_name: "Ali".to_string(),
            },
        );

        assert!(origin.try_recv().is_err());
        assert!(matches!(
            peer.try_recv(),
            Ok(ChatNotification::Typing { status: true, .. })
        ));
    }

    async fn test_state() -> AppState {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::db::schema::run_migrations(&pool).await.unwrap();

        AppState {
            db: pool,
            config: crate::config::Config {
                port: 0,
                data_dir: std::path::PathBuf::from("App_Data"),
                db_path: std::path::PathBuf::from("App_Data/school.sqlite"),
            },
            chat: std::sync::Arc::new(ChatState::new()),
        }
    }

    fn send_event(room: &str, sender_id: i64, message: &str) -> SendMessage {
        SendMessage {
            sender_id,
            receiver_id: None,
            sender_name: Some("Ali".to_string()),
            message: message.to_string(),
            room: room.to_string(),
            file_url: None,
            file_name: None,
        }
    }

    async fn message_count(pool: &sqlx::SqlitePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM Messages")
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn empty_send_stores_nothing_and_broadcasts_nothing() {
        let state = test_state().await;
        let mut room_member = join(&state.chat, "c1", &["31_32"]);
        let (ack_tx, mut ack_rx) = broadcast::channel(8);

        handle_send_message(&state, &ack_tx, send_event("31_32", 31, "   ")).await;

        assert_eq!(message_count(&state.db).await, 0);
        assert!(room_member.try_recv().is_err());
        // Dropped without an ack, not failed.
        assert!(ack_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unresolvable_receiver_is_rejected_with_ack_to_sender_only() {
        let state = test_state().await;
        let mut room_member = join(&state.chat, "c1", &["class-7b"]);
        let (ack_tx, mut ack_rx) = broadcast::channel(8);

        handle_send_message(&state, &ack_tx, send_event("class-7b", 31, "Hello")).await;

        assert_eq!(message_count(&state.db).await, 0);
        assert!(room_member.try_recv().is_err());
        assert!(matches!(
            ack_rx.try_recv(),
            Ok(ChatNotification::SendFailed { .. })
        ));
    }

    #[tokio::test]
    async fn append_failure_aborts_broadcast_and_acks_sender() {
        let state = test_state().await;
        sqlx::query("DROP TABLE Messages")
            .execute(&state.db)
            .await
            .unwrap();
        let mut room_member = join(&state.chat, "c1", &["31_32"]);
        let (ack_tx, mut ack_rx) = broadcast::channel(8);

        handle_send_message(&state, &ack_tx, send_event("31_32", 31, "Hello")).await;

        assert!(room_member.try_recv().is_err());
        assert!(matches!(
            ack_rx.try_recv(),
            Ok(ChatNotification::SendFailed { .. })
        ));
    }

    #[tokio::test]
    async fn successful_send_persists_then_fans_out() {
        let state = test_state().await;
        let mut room_member = join(&state.chat, "c1", &["31_32"]);
        let mut receiver_channel = join(&state.chat, "c2", &["32"]);
        let (ack_tx, mut ack_rx) = broadcast::channel(8);

        handle_send_message(&state, &ack_tx, send_event("31_32", 31, "Hello")).await;

        let stored = chat_db::chat_history(&state.db, "31_32", Some(31))
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].sender_id, 31);
        assert_eq!(stored[0].receiver_id, 32);

        assert!(matches!(
            room_member.try_recv(),
            Ok(ChatNotification::Receive(_))
        ));
        assert!(matches!(
            receiver_channel.try_recv(),
            Ok(ChatNotification::Receive(_))
        ));
        assert!(ack_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn lagged_connection_keeps_receiving_later_notifications() {
        let (tx, rx) = broadcast::channel(1);
        for i in 0..3 {
            let _ = tx.send(ChatNotification::Connected {
                connection_id: format!("c{}", i),
            });
        }
        drop(tx);

        let (sink, frames) = futures::channel::mpsc::unbounded::<ws::Message>();
        forward_notifications(rx, sink).await;

        let frames: Vec<ws::Message> = frames.collect().await;
        assert_eq!(frames.len(), 1, "overflowed backlog is skipped, not fatal");
        match &frames[0] {
            ws::Message::Text(text) => assert!(text.contains("c2")),
            other => panic!("unexpected frame: {:?}", other),
        }
    }
}
