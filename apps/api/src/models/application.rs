use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::errors::AppError;
use crate::models::{non_blank, text_enum, Country};

text_enum! {
    /// Lifecycle of a submitted application.
    ApplicationStatus("application status") {
        NotStarted => "Not Started",
        InProgress => "In Progress",
        Submitted => "Submitted",
        Interview => "Interview",
        Result => "Result",
    }
}

impl Default for ApplicationStatus {
    fn default() -> Self {
        ApplicationStatus::NotStarted
    }
}

impl ApplicationStatus {
    /// Statuses counted as "completed" by the dashboard summary card.
    pub fn counts_as_completed(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::Submitted | ApplicationStatus::Interview | ApplicationStatus::Result
        )
    }
}

/// Completion flags of the document checklist, embedded in every application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct DocumentFlags {
    pub gre: bool,
    pub toefl_ielts: bool,
    pub lors: bool,
    pub sop: bool,
    pub transcript: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Application {
    pub id: i32,
    pub university_name: String,
    pub program_name: String,
    #[sqlx(try_from = "String")]
    pub country: Country,
    pub deadline: NaiveDate,
    #[sqlx(try_from = "String")]
    pub status: ApplicationStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(flatten)]
    pub documents: DocumentFlags,
}

/// The documents row as stored, returned by the checklist update endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Documents {
    pub application_id: i32,
    pub gre: bool,
    pub toefl_ielts: bool,
    pub lors: bool,
    pub sop: bool,
    pub transcript: bool,
    pub updated_at: DateTime<Utc>,
}

impl Documents {
    pub fn flags(&self) -> DocumentFlags {
        DocumentFlags {
            gre: self.gre,
            toefl_ielts: self.toefl_ielts,
            lors: self.lors,
            sop: self.sop,
            transcript: self.transcript,
        }
    }
}

/// A validated application ready to insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewApplication {
    pub university_name: String,
    pub program_name: String,
    pub country: Country,
    pub deadline: NaiveDate,
    pub status: ApplicationStatus,
    pub notes: Option<String>,
}

/// Body of `POST /api/applications`. Every field is optional on the wire so
/// that a missing field is reported as a validation error, not a parse error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateApplicationRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub university_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<Country>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ApplicationStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl CreateApplicationRequest {
    pub fn validate(self) -> Result<NewApplication, AppError> {
        match (
            non_blank(self.university_name),
            non_blank(self.program_name),
            self.country,
            self.deadline,
        ) {
            (Some(university_name), Some(program_name), Some(country), Some(deadline)) => {
                Ok(NewApplication {
                    university_name,
                    program_name,
                    country,
                    deadline,
                    status: self.status.unwrap_or_default(),
                    notes: non_blank(self.notes),
                })
            }
            _ => Err(AppError::Validation("Missing required fields".to_string())),
        }
    }
}

/// Partial update of an application. Absent and null fields both keep the
/// stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub university_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<Country>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ApplicationStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ApplicationPatch {
    pub fn status(status: ApplicationStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn apply(&self, application: &mut Application) {
        if let Some(v) = &self.university_name {
            application.university_name = v.clone();
        }
        if let Some(v) = &self.program_name {
            application.program_name = v.clone();
        }
        if let Some(v) = self.country {
            application.country = v;
        }
        if let Some(v) = self.deadline {
            application.deadline = v;
        }
        if let Some(v) = self.status {
            application.status = v;
        }
        if let Some(v) = &self.notes {
            application.notes = Some(v.clone());
        }
    }
}

/// Partial update of the document checklist; null keeps the stored flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gre: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toefl_ielts: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lors: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sop: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<bool>,
}

impl DocumentsPatch {
    pub fn is_empty(&self) -> bool {
        self.gre.is_none()
            && self.toefl_ielts.is_none()
            && self.lors.is_none()
            && self.sop.is_none()
            && self.transcript.is_none()
    }

    pub fn apply(&self, documents: &mut Documents) {
        documents.gre = self.gre.unwrap_or(documents.gre);
        documents.toefl_ielts = self.toefl_ielts.unwrap_or(documents.toefl_ielts);
        documents.lors = self.lors.unwrap_or(documents.lors);
        documents.sop = self.sop.unwrap_or(documents.sop);
        documents.transcript = self.transcript.unwrap_or(documents.transcript);
    }
}

/// Equality and substring filters for listing applications, AND-ed together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplicationFilter {
    pub country: Option<Country>,
    pub status: Option<ApplicationStatus>,
    pub search: Option<String>,
}

impl ApplicationFilter {
    pub fn matches(&self, application: &Application) -> bool {
        if self.country.is_some_and(|c| c != application.country) {
            return false;
        }
        if self.status.is_some_and(|s| s != application.status) {
            return false;
        }
        match &self.search {
            Some(term) => {
                let term = term.to_lowercase();
                application.university_name.to_lowercase().contains(&term)
                    || application.program_name.to_lowercase().contains(&term)
            }
            None => true,
        }
    }
}

/// Query string of `GET /api/applications`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplicationQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

impl ApplicationQuery {
    pub fn into_filter(self) -> Result<ApplicationFilter, AppError> {
        Ok(ApplicationFilter {
            country: parse_optional(self.country)?,
            status: parse_optional(self.status)?,
            search: non_blank(self.search),
        })
    }
}

/// Parses an optional query parameter; blank values count as absent.
pub(crate) fn parse_optional<T>(value: Option<String>) -> Result<Option<T>, AppError>
where
    T: std::str::FromStr<Err = crate::models::UnknownVariant>,
{
    non_blank(value)
        .map(|v| v.parse::<T>())
        .transpose()
        .map_err(|e| AppError::Validation(e.to_string()))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct DocumentStats {
    pub gre_complete: i64,
    pub toefl_complete: i64,
    pub lors_complete: i64,
    pub sop_complete: i64,
    pub transcript_complete: i64,
    pub total: i64,
}

/// Body of `GET /api/applications/stats/summary`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ApplicationStats {
    pub total_applications: i64,
    pub completed: i64,
    pub next_deadline: Option<NaiveDate>,
    #[sqlx(skip)]
    pub documents: DocumentStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct DeadlineEntry {
    pub university_name: String,
    pub program_name: String,
    pub deadline: NaiveDate,
}

/// Overview returned to the assistant by the `get_dashboard_summary` tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct DashboardSummary {
    pub total: i64,
    pub completed: i64,
    pub in_progress: i64,
    pub next_deadline: Option<NaiveDate>,
    #[sqlx(skip)]
    pub next_deadline_app: Option<DeadlineEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct UpcomingDeadline {
    pub university_name: String,
    pub program_name: String,
    #[sqlx(try_from = "String")]
    pub country: Country,
    pub deadline: NaiveDate,
    #[sqlx(try_from = "String")]
    pub status: ApplicationStatus,
}
