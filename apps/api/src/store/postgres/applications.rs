use async_trait::async_trait;

use super::PgStore;
use crate::models::application::{
    Application, ApplicationFilter, ApplicationPatch, ApplicationStats, ApplicationStatus,
    DashboardSummary, DeadlineEntry, DocumentStats, Documents, DocumentsPatch, NewApplication,
    UpcomingDeadline,
};
use crate::store::{contains_pattern, ApplicationStore, StoreError};

/// Application columns joined with the document flags. A missing documents
/// row renders as all-false.
const APPLICATION_COLUMNS: &str = "\
    a.id, a.university_name, a.program_name, a.country, a.deadline, a.status, a.notes, \
    a.created_at, a.updated_at, \
    COALESCE(d.gre, FALSE) AS gre, \
    COALESCE(d.toefl_ielts, FALSE) AS toefl_ielts, \
    COALESCE(d.lors, FALSE) AS lors, \
    COALESCE(d.sop, FALSE) AS sop, \
    COALESCE(d.transcript, FALSE) AS transcript";

const DOCUMENT_COLUMNS: &str =
    "application_id, gre, toefl_ielts, lors, sop, transcript, updated_at";

fn completed_statuses() -> Vec<&'static str> {
    ApplicationStatus::ALL
        .iter()
        .filter(|s| s.counts_as_completed())
        .map(|s| s.as_str())
        .collect()
}

#[async_trait]
impl ApplicationStore for PgStore {
    async fn list_applications(
        &self,
        filter: &ApplicationFilter,
    ) -> Result<Vec<Application>, StoreError> {
        let rows = sqlx::query_as::<_, Application>(&format!(
            "SELECT {APPLICATION_COLUMNS}
             FROM applications a
             LEFT JOIN documents d ON d.application_id = a.id
             WHERE ($1::text IS NULL OR a.country = $1)
               AND ($2::text IS NULL OR a.status = $2)
               AND ($3::text IS NULL OR a.university_name ILIKE $3 OR a.program_name ILIKE $3)
             ORDER BY a.deadline ASC, a.id ASC"
        ))
        .bind(filter.country.map(|c| c.as_str()))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.search.as_deref().map(contains_pattern))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get_application(&self, id: i32) -> Result<Option<Application>, StoreError> {
        let row = sqlx::query_as::<_, Application>(&format!(
            "SELECT {APPLICATION_COLUMNS}
             FROM applications a
             LEFT JOIN documents d ON d.application_id = a.id
             WHERE a.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn create_application(&self, new: &NewApplication) -> Result<Application, StoreError> {
        let id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO applications (university_name, program_name, country, deadline, status, notes)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&new.university_name)
        .bind(&new.program_name)
        .bind(new.country.as_str())
        .bind(new.deadline)
        .bind(new.status.as_str())
        .bind(new.notes.as_deref())
        .fetch_one(&self.pool)
        .await?;

        // The documents row is written by the insert trigger; read it back joined.
        self.get_application(id)
            .await?
            .ok_or(StoreError::MissingAfterWrite("application"))
    }

    async fn update_application(
        &self,
        id: i32,
        patch: &ApplicationPatch,
    ) -> Result<Option<Application>, StoreError> {
        let row = sqlx::query_as::<_, Application>(&format!(
            "WITH updated AS (
                 UPDATE applications
                 SET university_name = COALESCE($1, university_name),
                     program_name    = COALESCE($2, program_name),
                     country         = COALESCE($3, country),
                     deadline        = COALESCE($4, deadline),
                     status          = COALESCE($5, status),
                     notes           = COALESCE($6, notes)
                 WHERE id = $7
                 RETURNING *
             )
             SELECT {APPLICATION_COLUMNS}
             FROM updated a
             LEFT JOIN documents d ON d.application_id = a.id"
        ))
        .bind(patch.university_name.as_deref())
        .bind(patch.program_name.as_deref())
        .bind(patch.country.map(|c| c.as_str()))
        .bind(patch.deadline)
        .bind(patch.status.map(|s| s.as_str()))
        .bind(patch.notes.as_deref())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn delete_application(&self, id: i32) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM applications WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_documents(
        &self,
        application_id: i32,
        patch: &DocumentsPatch,
    ) -> Result<Option<Documents>, StoreError> {
        let row = sqlx::query_as::<_, Documents>(&format!(
            "UPDATE documents
             SET gre         = COALESCE($1, gre),
                 toefl_ielts = COALESCE($2, toefl_ielts),
                 lors        = COALESCE($3, lors),
                 sop         = COALESCE($4, sop),
                 transcript  = COALESCE($5, transcript)
             WHERE application_id = $6
             RETURNING {DOCUMENT_COLUMNS}"
        ))
        .bind(patch.gre)
        .bind(patch.toefl_ielts)
        .bind(patch.lors)
        .bind(patch.sop)
        .bind(patch.transcript)
        .bind(application_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn application_stats(&self) -> Result<ApplicationStats, StoreError> {
        let mut stats = sqlx::query_as::<_, ApplicationStats>(
            r#"
            SELECT COUNT(*) AS total_applications,
                   COUNT(*) FILTER (WHERE status = ANY($1)) AS completed,
                   MIN(deadline) FILTER (WHERE deadline >= CURRENT_DATE) AS next_deadline
            FROM applications
            "#,
        )
        .bind(completed_statuses())
        .fetch_one(&self.pool)
        .await?;

        stats.documents = sqlx::query_as::<_, DocumentStats>(
            r#"
            SELECT COUNT(*) FILTER (WHERE gre)         AS gre_complete,
                   COUNT(*) FILTER (WHERE toefl_ielts) AS toefl_complete,
                   COUNT(*) FILTER (WHERE lors)        AS lors_complete,
                   COUNT(*) FILTER (WHERE sop)         AS sop_complete,
                   COUNT(*) FILTER (WHERE transcript)  AS transcript_complete,
                   COUNT(*)                            AS total
            FROM documents
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(stats)
    }

    async fn dashboard_summary(&self) -> Result<DashboardSummary, StoreError> {
        let mut summary = sqlx::query_as::<_, DashboardSummary>(
            r#"
            SELECT COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE status = ANY($1)) AS completed,
                   COUNT(*) FILTER (WHERE status = $2) AS in_progress,
                   MIN(deadline) FILTER (WHERE deadline > CURRENT_DATE) AS next_deadline
            FROM applications
            "#,
        )
        .bind(vec![
            ApplicationStatus::Submitted.as_str(),
            ApplicationStatus::Result.as_str(),
        ])
        .bind(ApplicationStatus::InProgress.as_str())
        .fetch_one(&self.pool)
        .await?;

        summary.next_deadline_app = sqlx::query_as::<_, DeadlineEntry>(
            r#"
            SELECT university_name, program_name, deadline
            FROM applications
            WHERE deadline > CURRENT_DATE
            ORDER BY deadline ASC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(summary)
    }

    async fn upcoming_deadlines(&self, days: i32) -> Result<Vec<UpcomingDeadline>, StoreError> {
        let rows = sqlx::query_as::<_, UpcomingDeadline>(
            r#"
            SELECT university_name, program_name, country, deadline, status
            FROM applications
            WHERE deadline BETWEEN CURRENT_DATE AND CURRENT_DATE + $1
            ORDER BY deadline ASC
            "#,
        )
        .bind(days)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
