use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::message::Message;
use crate::services::room;

pub fn new_guid() -> String {
    Uuid::new_v4().simple().to_string()
}

pub async fn insert_message(pool: &SqlitePool, msg: &Message) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO Messages \
         (Id, RoomId, SenderId, ReceiverId, SenderName, MessageText, \
          FileUrl, FileName, IsRead, CreatedAt, CreatedAtEpoch) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&msg.id)
    .bind(&msg.room_id)
    .bind(msg.sender_id)
    .bind(msg.receiver_id)
    .bind(&msg.sender_name)
    .bind(&msg.text)
    .bind(&msg.file_url)
    .bind(&msg.file_name)
    .bind(msg.is_read)
    .bind(&msg.created_at)
    .bind(msg.created_at_epoch)
    .execute(pool)
    .await?;
    Ok(())
}

/// Full history for a room, tolerant of every room-id convention clients
/// have used so far. Matches the exact token, the bare participant id,
/// either underscore format containing that id, and rows whose sender or
/// receiver is that id. The ordering key is (CreatedAtEpoch, Id) so repeated
/// calls against an unchanged table return identical sequences.
pub async fn chat_history(
    pool: &SqlitePool,
    room_token: &str,
    viewer_id: Option<i64>,
) -> Result<Vec<Message>, sqlx::Error> {
    let c = room::candidates(room_token, viewer_id);
    // -1 never matches a real user id, so unparsable tokens fall back to
    // the RoomId arms only.
    let participant_id = c.participant_id.unwrap_or(-1);

    sqlx::query_as(
        "SELECT * FROM Messages \
         WHERE RoomId = ? \
            OR RoomId = ? \
            OR RoomId LIKE ? \
            OR RoomId LIKE ? \
            OR ReceiverId = ? \
            OR SenderId = ? \
         ORDER BY CreatedAtEpoch ASC, Id ASC",
    )
    .bind(&c.exact)
    .bind(&c.participant)
    .bind(&c.prefix_pattern)
    .bind(&c.suffix_pattern)
    .bind(participant_id)
    .bind(participant_id)
    .fetch_all(pool)
    .await
}

/// Marks every unread message from the given student as read. Returns the
/// number of rows flipped.
pub async fn mark_messages_read(pool: &SqlitePool, student_id: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE Messages SET IsRead = 1 WHERE SenderId = ? AND IsRead = 0")
        .bind(student_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
