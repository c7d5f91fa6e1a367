use async_trait::async_trait;

use super::PgStore;
use crate::models::chat::{ChatMessage, ChatRole};
use crate::store::{ChatLogStore, StoreError};

#[async_trait]
impl ChatLogStore for PgStore {
    async fn append_chat_message(
        &self,
        role: ChatRole,
        content: &str,
    ) -> Result<ChatMessage, StoreError> {
        let row = sqlx::query_as::<_, ChatMessage>(
            "INSERT INTO chat_history (role, content) VALUES ($1, $2)
             RETURNING id, role, content, created_at",
        )
        .bind(role.as_str())
        .bind(content)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn recent_chat_messages(&self, limit: i64) -> Result<Vec<ChatMessage>, StoreError> {
        let rows = sqlx::query_as::<_, ChatMessage>(
            r#"
            SELECT id, role, content, created_at
            FROM (
                SELECT id, role, content, created_at
                FROM chat_history
                ORDER BY created_at DESC, id DESC
                LIMIT $1
            ) recent
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn clear_chat_messages(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM chat_history")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
