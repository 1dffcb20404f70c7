use serde::{Deserialize, Serialize};

use crate::models::message::MessagePayload;

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "join_room")]
    JoinRoom { room: String },
    #[serde(rename = "send_message")]
    SendMessage(SendMessage),
    #[serde(rename = "typing")]
    Typing {
        room: String,
        status: bool,
        #[serde(rename = "userName")]
        user_name: String,
    },
}

#[derive(Debug, Deserialize)]
pub struct SendMessage {
    #[serde(rename = "senderId")]
    pub sender_id: i64,
    /// Number or numeric string depending on client version; anything else
    /// is treated as absent.
    #[serde(rename = "receiverId")]
    pub receiver_id: Option<serde_json::Value>,
    #[serde(rename = "senderName")]
    pub sender_name: Option<String>,
    #[serde(default)]
    pub message: String,
    pub room: String,
    #[serde(rename = "fileUrl")]
    pub file_url: Option<String>,
    #[serde(rename = "fileName")]
    pub file_name: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "connected")]
    Connected {
        #[serde(rename = "connectionId")]
        connection_id: String,
    },
    #[serde(rename = "receive_message")]
    ReceiveMessage(MessagePayload),
    #[serde(rename = "user_typing")]
    UserTyping {
        room: String,
        status: bool,
        #[serde(rename = "userName")]
        user_name: String,
    },
    #[serde(rename = "send_failed")]
    SendFailed { reason: String },
}
