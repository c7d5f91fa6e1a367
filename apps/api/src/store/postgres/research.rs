use async_trait::async_trait;

use super::PgStore;
use crate::models::research::{
    NewResearchItem, ResearchFilter, ResearchItem, ResearchPatch, ResearchStats, ResearchStatus,
};
use crate::models::Country;
use crate::store::{ResearchStore, StoreError};

const RESEARCH_COLUMNS: &str = "id, university_name, program_name, country, website, ranking, \
    tuition_fees, requirements, notes, status, created_at";

#[async_trait]
impl ResearchStore for PgStore {
    async fn list_research(
        &self,
        filter: &ResearchFilter,
    ) -> Result<Vec<ResearchItem>, StoreError> {
        let rows = sqlx::query_as::<_, ResearchItem>(&format!(
            "SELECT {RESEARCH_COLUMNS}
             FROM research
             WHERE ($1::text IS NULL OR country = $1)
               AND ($2::text IS NULL OR status = $2)
             ORDER BY (status = $3) DESC, ranking ASC NULLS LAST, created_at DESC, id DESC"
        ))
        .bind(filter.country.map(|c| c.as_str()))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(ResearchStatus::Shortlisted.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn create_research(&self, new: &NewResearchItem) -> Result<ResearchItem, StoreError> {
        let row = sqlx::query_as::<_, ResearchItem>(&format!(
            "INSERT INTO research
                 (university_name, program_name, country, website, ranking,
                  tuition_fees, requirements, notes, status)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {RESEARCH_COLUMNS}"
        ))
        .bind(&new.university_name)
        .bind(&new.program_name)
        .bind(new.country.as_str())
        .bind(new.website.as_deref())
        .bind(new.ranking)
        .bind(new.tuition_fees.as_deref())
        .bind(new.requirements.as_deref())
        .bind(new.notes.as_deref())
        .bind(ResearchStatus::Researching.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update_research(
        &self,
        id: i32,
        patch: &ResearchPatch,
    ) -> Result<Option<ResearchItem>, StoreError> {
        let row = sqlx::query_as::<_, ResearchItem>(&format!(
            "UPDATE research
             SET university_name = COALESCE($1, university_name),
                 program_name    = COALESCE($2, program_name),
                 country         = COALESCE($3, country),
                 website         = CASE WHEN $4 THEN $5 ELSE website END,
                 ranking         = CASE WHEN $6 THEN $7 ELSE ranking END,
                 tuition_fees    = CASE WHEN $8 THEN $9 ELSE tuition_fees END,
                 requirements    = CASE WHEN $10 THEN $11 ELSE requirements END,
                 notes           = CASE WHEN $12 THEN $13 ELSE notes END,
                 status          = COALESCE($14, status)
             WHERE id = $15
             RETURNING {RESEARCH_COLUMNS}"
        ))
        .bind(patch.university_name.as_deref())
        .bind(patch.program_name.as_deref())
        .bind(patch.country.map(|c| c.as_str()))
        .bind(patch.website.is_some())
        .bind(patch.website.clone().flatten())
        .bind(patch.ranking.is_some())
        .bind(patch.ranking.flatten())
        .bind(patch.tuition_fees.is_some())
        .bind(patch.tuition_fees.clone().flatten())
        .bind(patch.requirements.is_some())
        .bind(patch.requirements.clone().flatten())
        .bind(patch.notes.is_some())
        .bind(patch.notes.clone().flatten())
        .bind(patch.status.map(|s| s.as_str()))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn set_research_status(
        &self,
        id: i32,
        status: ResearchStatus,
    ) -> Result<Option<ResearchItem>, StoreError> {
        let row = sqlx::query_as::<_, ResearchItem>(&format!(
            "UPDATE research SET status = $1 WHERE id = $2 RETURNING {RESEARCH_COLUMNS}"
        ))
        .bind(status.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn delete_research(&self, id: i32) -> Result<Option<ResearchItem>, StoreError> {
        let row = sqlx::query_as::<_, ResearchItem>(&format!(
            "DELETE FROM research WHERE id = $1 RETURNING {RESEARCH_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn research_stats(&self) -> Result<ResearchStats, StoreError> {
        let stats = sqlx::query_as::<_, ResearchStats>(
            r#"
            SELECT COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE status = $1) AS shortlisted,
                   COUNT(*) FILTER (WHERE status = $2) AS applied,
                   COUNT(*) FILTER (WHERE country = $3) AS germany,
                   COUNT(*) FILTER (WHERE country = $4) AS switzerland
            FROM research
            "#,
        )
        .bind(ResearchStatus::Shortlisted.as_str())
        .bind(ResearchStatus::Applied.as_str())
        .bind(Country::Germany.as_str())
        .bind(Country::Switzerland.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }
}
