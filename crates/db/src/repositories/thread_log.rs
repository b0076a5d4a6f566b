use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use fernwood_core::{ChatMessage, Role, ThreadId, ToolCall};

use super::{RepositoryError, ThreadLog};
use crate::DbPool;

pub struct SqlThreadLog {
    pool: DbPool,
}

impl SqlThreadLog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ThreadLog for SqlThreadLog {
    async fn append(
        &self,
        thread: &ThreadId,
        message: &ChatMessage,
    ) -> Result<(), RepositoryError> {
        let tool_call = message
            .tool_call
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;

        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT OR IGNORE INTO chat_thread (thread_id, created_at) VALUES (?, ?)")
            .bind(&thread.0)
            .bind(Utc::now().to_rfc3339())
            .execute(&mut *tx)
            .await?;

        // seq is assigned inside the transaction so concurrent appends to the
        // same thread cannot produce duplicate positions.
        sqlx::query(
            "INSERT INTO chat_message (id, thread_id, seq, role, content, tool_call, created_at) \
             SELECT ?, ?, COALESCE(MAX(seq) + 1, 0), ?, ?, ?, ? \
             FROM chat_message WHERE thread_id = ?",
        )
        .bind(message.id.to_string())
        .bind(&thread.0)
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(tool_call)
        .bind(message.created_at.to_rfc3339())
        .bind(&thread.0)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn read(&self, thread: &ThreadId) -> Result<Vec<ChatMessage>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, role, content, tool_call, created_at \
             FROM chat_message WHERE thread_id = ? ORDER BY seq",
        )
        .bind(&thread.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let id_raw: String = row.try_get("id")?;
                let id = Uuid::parse_str(&id_raw)
                    .map_err(|error| RepositoryError::Decode(format!("invalid id: {error}")))?;

                let role_raw: String = row.try_get("role")?;
                let role = Role::parse(&role_raw).ok_or_else(|| {
                    RepositoryError::Decode(format!("unknown role `{role_raw}`"))
                })?;

                let tool_call: Option<ToolCall> = row
                    .try_get::<Option<String>, _>("tool_call")?
                    .map(|raw| serde_json::from_str(&raw))
                    .transpose()
                    .map_err(|error| {
                        RepositoryError::Decode(format!("invalid tool call: {error}"))
                    })?;

                let created_raw: String = row.try_get("created_at")?;
                let created_at = DateTime::parse_from_rfc3339(&created_raw)
                    .map_err(|error| {
                        RepositoryError::Decode(format!("invalid created_at: {error}"))
                    })?
                    .with_timezone(&Utc);

                Ok(ChatMessage {
                    id,
                    role,
                    content: row.try_get("content")?,
                    tool_call,
                    created_at,
                })
            })
            .collect()
    }
}
