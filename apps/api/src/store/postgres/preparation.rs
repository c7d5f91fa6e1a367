use async_trait::async_trait;

use super::PgStore;
use crate::models::preparation::{
    NewPreparationItem, PrepType, PreparationItem, PreparationPatch, PreparationStats,
};
use crate::store::{PreparationStore, StoreError};

const PREPARATION_COLUMNS: &str = "id, type, title, target_date, notes, completed, created_at";

#[async_trait]
impl PreparationStore for PgStore {
    async fn list_preparation(
        &self,
        kind: Option<PrepType>,
    ) -> Result<Vec<PreparationItem>, StoreError> {
        let rows = sqlx::query_as::<_, PreparationItem>(&format!(
            "SELECT {PREPARATION_COLUMNS}
             FROM preparation
             WHERE ($1::text IS NULL OR type = $1)
             ORDER BY target_date ASC NULLS LAST, created_at ASC, id ASC"
        ))
        .bind(kind.map(|k| k.as_str()))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn create_preparation(
        &self,
        new: &NewPreparationItem,
    ) -> Result<PreparationItem, StoreError> {
        let row = sqlx::query_as::<_, PreparationItem>(&format!(
            "INSERT INTO preparation (type, title, target_date, notes, completed)
             VALUES ($1, $2, $3, $4, FALSE)
             RETURNING {PREPARATION_COLUMNS}"
        ))
        .bind(new.kind.as_str())
        .bind(&new.title)
        .bind(new.target_date)
        .bind(new.notes.as_deref())
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update_preparation(
        &self,
        id: i32,
        patch: &PreparationPatch,
    ) -> Result<Option<PreparationItem>, StoreError> {
        let row = sqlx::query_as::<_, PreparationItem>(&format!(
            "UPDATE preparation
             SET title       = COALESCE($1, title),
                 target_date = CASE WHEN $2 THEN $3 ELSE target_date END,
                 notes       = CASE WHEN $4 THEN $5 ELSE notes END,
                 completed   = COALESCE($6, completed)
             WHERE id = $7
             RETURNING {PREPARATION_COLUMNS}"
        ))
        .bind(patch.title.as_deref())
        .bind(patch.target_date.is_some())
        .bind(patch.target_date.flatten())
        .bind(patch.notes.is_some())
        .bind(patch.notes.clone().flatten())
        .bind(patch.completed)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn toggle_preparation(&self, id: i32) -> Result<Option<PreparationItem>, StoreError> {
        let row = sqlx::query_as::<_, PreparationItem>(&format!(
            "UPDATE preparation SET completed = NOT completed WHERE id = $1
             RETURNING {PREPARATION_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn delete_preparation(&self, id: i32) -> Result<Option<PreparationItem>, StoreError> {
        let row = sqlx::query_as::<_, PreparationItem>(&format!(
            "DELETE FROM preparation WHERE id = $1 RETURNING {PREPARATION_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn preparation_stats(&self) -> Result<Vec<PreparationStats>, StoreError> {
        let rows = sqlx::query_as::<_, PreparationStats>(
            r#"
            SELECT type,
                   COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE completed) AS completed,
                   MIN(target_date) FILTER (WHERE NOT completed AND target_date >= CURRENT_DATE)
                       AS next_target
            FROM preparation
            GROUP BY type
            ORDER BY type
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
