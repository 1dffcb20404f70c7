use serde::{Deserialize, Serialize};

use crate::services::helpers;

/// A persisted chat message. Append-only: rows are never updated after
/// insert, except the read-receipt flag.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    #[sqlx(rename = "Id")]
    pub id: String,
    #[sqlx(rename = "RoomId")]
    pub room_id: String,
    #[sqlx(rename = "SenderId")]
    pub sender_id: i64,
    /// Best-effort resolved counterparty; advisory, not authoritative.
    #[sqlx(rename = "ReceiverId")]
    pub receiver_id: i64,
    #[sqlx(rename = "SenderName")]
    pub sender_name: Option<String>,
    #[sqlx(rename = "MessageText")]
    pub text: String,
    #[sqlx(rename = "FileUrl")]
    pub file_url: Option<String>,
    #[sqlx(rename = "FileName")]
    pub file_name: Option<String>,
    #[sqlx(rename = "IsRead")]
    pub is_read: bool,
    #[sqlx(rename = "CreatedAt")]
    pub created_at: String,
    #[sqlx(rename = "CreatedAtEpoch")]
    pub created_at_epoch: i64,
}

/// Wire shape shared by the history endpoint and the `receive_message`
/// websocket event.
#[derive(Debug, Clone, Serialize)]
pub struct MessagePayload {
    pub room: String,
    #[serde(rename = "senderId")]
    pub sender_id: i64,
    #[serde(rename = "receiverId")]
    pub receiver_id: i64,
    #[serde(rename = "senderName")]
    pub sender_name: String,
    pub message: String,
    #[serde(rename = "fileUrl", skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(rename = "fileName", skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    pub time: String,
}

impl Message {
    pub fn to_payload(&self) -> MessagePayload {
        MessagePayload {
            room: self.room_id.clone(),
            sender_id: self.sender_id,
            receiver_id: self.receiver_id,
            sender_name: self
                .sender_name
                .clone()
                .unwrap_or_else(|| "User".to_string()),
            message: self.text.clone(),
            file_url: self.file_url.clone(),
            file_name: self.file_name.clone(),
            time: helpers::format_display_time(self.created_at_epoch),
        }
    }
}
