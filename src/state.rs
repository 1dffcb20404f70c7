use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use sqlx::SqlitePool;
use tokio::sync::broadcast;

use crate::config::Config;
use crate::models::message::MessagePayload;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Config,
    pub chat: Arc<ChatState>,
}

/// Process-local registry of live websocket connections. Room membership
/// lives and dies with the connection; nothing here is persisted.
pub struct ChatState {
    pub connections: DashMap<String, ChatConnection>,
}

pub struct ChatConnection {
    /// Room tokens this connection has joined. A user's own numeric id
    /// doubles as their individual delivery channel.
    pub rooms: HashSet<String>,
    pub tx: broadcast::Sender<ChatNotification>,
}

#[derive(Clone, Debug)]
pub enum ChatNotification {
    Connected { connection_id: String },
    Receive(MessagePayload),
    Typing {
        room: String,
        status: bool,
        user_name: String,
    },
    SendFailed { reason: String },
}

impl ChatState {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }
}
