use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::errors::AppError;
use crate::models::application::parse_optional;
use crate::models::{deserialize_some, non_blank, text_enum, Country};

text_enum! {
    /// Where a candidate program sits in the research funnel.
    ResearchStatus("research status") {
        Researching => "Researching",
        Shortlisted => "Shortlisted",
        Rejected => "Rejected",
        Applied => "Applied",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ResearchItem {
    pub id: i32,
    pub university_name: String,
    pub program_name: String,
    #[sqlx(try_from = "String")]
    pub country: Country,
    pub website: Option<String>,
    pub ranking: Option<i32>,
    pub tuition_fees: Option<String>,
    pub requirements: Option<String>,
    pub notes: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: ResearchStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewResearchItem {
    pub university_name: String,
    pub program_name: String,
    pub country: Country,
    pub website: Option<String>,
    pub ranking: Option<i32>,
    pub tuition_fees: Option<String>,
    pub requirements: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateResearchRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub university_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<Country>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ranking: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tuition_fees: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl CreateResearchRequest {
    pub fn validate(self) -> Result<NewResearchItem, AppError> {
        match (
            non_blank(self.university_name),
            non_blank(self.program_name),
            self.country,
        ) {
            (Some(university_name), Some(program_name), Some(country)) => Ok(NewResearchItem {
                university_name,
                program_name,
                country,
                website: non_blank(self.website),
                ranking: self.ranking,
                tuition_fees: non_blank(self.tuition_fees),
                requirements: non_blank(self.requirements),
                notes: non_blank(self.notes),
            }),
            _ => Err(AppError::Validation(
                "University name, program name, and country are required".to_string(),
            )),
        }
    }
}

/// Sparse patch of a research item. Optional columns may be cleared with an
/// explicit null; required columns ignore null.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub university_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<Country>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub website: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub ranking: Option<Option<i32>>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub tuition_fees: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub requirements: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub notes: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ResearchStatus>,
}

impl ResearchPatch {
    pub fn is_empty(&self) -> bool {
        self.university_name.is_none()
            && self.program_name.is_none()
            && self.country.is_none()
            && self.website.is_none()
            && self.ranking.is_none()
            && self.tuition_fees.is_none()
            && self.requirements.is_none()
            && self.notes.is_none()
            && self.status.is_none()
    }

    pub fn apply(&self, item: &mut ResearchItem) {
        if let Some(v) = &self.university_name {
            item.university_name = v.clone();
        }
        if let Some(v) = &self.program_name {
            item.program_name = v.clone();
        }
        if let Some(v) = self.country {
            item.country = v;
        }
        if let Some(v) = &self.website {
            item.website = v.clone();
        }
        if let Some(v) = self.ranking {
            item.ranking = v;
        }
        if let Some(v) = &self.tuition_fees {
            item.tuition_fees = v.clone();
        }
        if let Some(v) = &self.requirements {
            item.requirements = v.clone();
        }
        if let Some(v) = &self.notes {
            item.notes = v.clone();
        }
        if let Some(v) = self.status {
            item.status = v;
        }
    }
}

/// Body of `PATCH /api/research/:id/status`. Kept as a raw string so an
/// unknown value is reported as "Invalid status".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusUpdate {
    #[serde(default)]
    pub status: Option<String>,
}

impl StatusUpdate {
    pub fn validate(self) -> Result<ResearchStatus, AppError> {
        self.status
            .as_deref()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| AppError::Validation("Invalid status".to_string()))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResearchFilter {
    pub country: Option<Country>,
    pub status: Option<ResearchStatus>,
}

impl ResearchFilter {
    pub fn matches(&self, item: &ResearchItem) -> bool {
        self.country.map_or(true, |c| c == item.country)
            && self.status.map_or(true, |s| s == item.status)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearchQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl ResearchQuery {
    pub fn into_filter(self) -> Result<ResearchFilter, AppError> {
        Ok(ResearchFilter {
            country: parse_optional(self.country)?,
            status: parse_optional(self.status)?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ResearchStats {
    pub total: i64,
    pub shortlisted: i64,
    pub applied: i64,
    pub germany: i64,
    pub switzerland: i64,
}

/// Body of `POST /api/research/autofill`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutofillRequest {
    #[serde(default)]
    pub university_name: Option<String>,
    #[serde(default)]
    pub program_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<Country>,
}

/// Program details proposed by the model; the caller decides what to keep.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchSuggestion {
    pub website: Option<String>,
    pub ranking: Option<i32>,
    pub tuition_fees: Option<String>,
    pub requirements: Option<String>,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_update_rejects_values_outside_the_enum() {
        let bad = StatusUpdate {
            status: Some("Archived".into()),
        };
        assert!(matches!(bad.validate(), Err(AppError::Validation(m)) if m == "Invalid status"));
        assert!(StatusUpdate::default().validate().is_err());

        let good = StatusUpdate {
            status: Some("Shortlisted".into()),
        };
        assert_eq!(good.validate().unwrap(), ResearchStatus::Shortlisted);
    }

    #[test]
    fn patch_with_unknown_status_fails_to_deserialize() {
        assert!(serde_json::from_str::<ResearchPatch>(r#"{"status": "Maybe"}"#).is_err());
    }

    #[test]
    fn patch_can_clear_ranking() {
        let patch: ResearchPatch = serde_json::from_str(r#"{"ranking": null}"#).unwrap();
        assert_eq!(patch.ranking, Some(None));
        assert!(!patch.is_empty());
    }

    #[test]
    fn suggestion_tolerates_missing_fields() {
        let suggestion: ResearchSuggestion =
            serde_json::from_str(r#"{"website": "https://www.tum.de"}"#).unwrap();
        assert_eq!(suggestion.website.as_deref(), Some("https://www.tum.de"));
        assert_eq!(suggestion.ranking, None);
    }
}
