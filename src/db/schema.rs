use sqlx::SqlitePool;

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS Messages (
            Id TEXT PRIMARY KEY,
            RoomId TEXT NOT NULL,
            SenderId INTEGER NOT NULL,
            ReceiverId INTEGER NOT NULL,
            SenderName TEXT,
            MessageText TEXT NOT NULL,
            FileUrl TEXT,
            FileName TEXT,
            IsRead INTEGER NOT NULL DEFAULT 0,
            CreatedAt TEXT NOT NULL,
            CreatedAtEpoch INTEGER NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_messages_room ON Messages(RoomId)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_messages_epoch ON Messages(CreatedAtEpoch)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_messages_sender ON Messages(SenderId)")
        .execute(pool)
        .await?;

    Ok(())
}
