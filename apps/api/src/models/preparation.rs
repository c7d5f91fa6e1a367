use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::errors::AppError;
use crate::models::{deserialize_some, non_blank, text_enum};

text_enum! {
    /// Which exam or course a preparation milestone belongs to.
    PrepType("preparation type") {
        German => "german",
        Gre => "gre",
        Ielts => "ielts",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PreparationItem {
    pub id: i32,
    #[serde(rename = "type")]
    #[sqlx(rename = "type", try_from = "String")]
    pub kind: PrepType,
    pub title: String,
    pub target_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPreparationItem {
    pub kind: PrepType,
    pub title: String,
    pub target_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreatePreparationRequest {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<PrepType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl CreatePreparationRequest {
    pub fn validate(self) -> Result<NewPreparationItem, AppError> {
        match (self.kind, non_blank(self.title)) {
            (Some(kind), Some(title)) => Ok(NewPreparationItem {
                kind,
                title,
                target_date: self.target_date,
                notes: non_blank(self.notes),
            }),
            _ => Err(AppError::Validation(
                "Type and title are required".to_string(),
            )),
        }
    }
}

/// Sparse patch of a preparation item. `target_date` and `notes` may be
/// cleared with an explicit null; absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreparationPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub target_date: Option<Option<NaiveDate>>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub notes: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl PreparationPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.target_date.is_none()
            && self.notes.is_none()
            && self.completed.is_none()
    }

    pub fn apply(&self, item: &mut PreparationItem) {
        if let Some(title) = &self.title {
            item.title = title.clone();
        }
        if let Some(target_date) = self.target_date {
            item.target_date = target_date;
        }
        if let Some(notes) = &self.notes {
            item.notes = notes.clone();
        }
        if let Some(completed) = self.completed {
            item.completed = completed;
        }
    }
}

/// Per-type progress row of `GET /api/preparation/stats`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PreparationStats {
    #[serde(rename = "type")]
    #[sqlx(rename = "type", try_from = "String")]
    pub kind: PrepType,
    pub total: i64,
    pub completed: i64,
    pub next_target: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreparationQuery {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}
