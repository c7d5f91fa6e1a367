//! Storage traits shared by the REST handlers and the assistant tools.
//!
//! `PgStore` is the production backend. Unit tests run against `MemoryStore`,
//! which mirrors the SQL filters and orderings in plain Rust.

#[cfg(test)]
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::application::{
    Application, ApplicationFilter, ApplicationPatch, ApplicationStats, DashboardSummary,
    Documents, DocumentsPatch, NewApplication, UpcomingDeadline,
};
use crate::models::chat::{ChatMessage, ChatRole};
use crate::models::preparation::{
    NewPreparationItem, PrepType, PreparationItem, PreparationPatch, PreparationStats,
};
use crate::models::research::{
    NewResearchItem, ResearchFilter, ResearchItem, ResearchPatch, ResearchStats, ResearchStatus,
};

#[cfg(test)]
pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// SQL / connection / timeout failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A row that should exist right after a write was not returned.
    #[error("{0} vanished after write")]
    MissingAfterWrite(&'static str),
}

#[async_trait]
pub trait ApplicationStore: Send + Sync {
    /// Applications matching every filter, earliest deadline first.
    async fn list_applications(
        &self,
        filter: &ApplicationFilter,
    ) -> Result<Vec<Application>, StoreError>;

    async fn get_application(&self, id: i32) -> Result<Option<Application>, StoreError>;

    /// Inserts the application; its documents row is created alongside.
    async fn create_application(&self, new: &NewApplication) -> Result<Application, StoreError>;

    /// Returns `None` when no application has this id.
    async fn update_application(
        &self,
        id: i32,
        patch: &ApplicationPatch,
    ) -> Result<Option<Application>, StoreError>;

    /// Returns `true` if a row was deleted. Documents cascade.
    async fn delete_application(&self, id: i32) -> Result<bool, StoreError>;

    async fn update_documents(
        &self,
        application_id: i32,
        patch: &DocumentsPatch,
    ) -> Result<Option<Documents>, StoreError>;

    async fn application_stats(&self) -> Result<ApplicationStats, StoreError>;

    async fn dashboard_summary(&self) -> Result<DashboardSummary, StoreError>;

    /// Applications due between today and `days` days from now, inclusive.
    async fn upcoming_deadlines(&self, days: i32) -> Result<Vec<UpcomingDeadline>, StoreError>;
}

#[async_trait]
pub trait PreparationStore: Send + Sync {
    /// Items ordered by target date (undated last), then creation time.
    async fn list_preparation(
        &self,
        kind: Option<PrepType>,
    ) -> Result<Vec<PreparationItem>, StoreError>;

    async fn create_preparation(
        &self,
        new: &NewPreparationItem,
    ) -> Result<PreparationItem, StoreError>;

    async fn update_preparation(
        &self,
        id: i32,
        patch: &PreparationPatch,
    ) -> Result<Option<PreparationItem>, StoreError>;

    async fn toggle_preparation(&self, id: i32) -> Result<Option<PreparationItem>, StoreError>;

    /// Returns the deleted row, if any.
    async fn delete_preparation(&self, id: i32) -> Result<Option<PreparationItem>, StoreError>;

    async fn preparation_stats(&self) -> Result<Vec<PreparationStats>, StoreError>;
}

#[async_trait]
pub trait ResearchStore: Send + Sync {
    /// Shortlisted first, then by ranking (unranked last), newest first.
    async fn list_research(&self, filter: &ResearchFilter)
        -> Result<Vec<ResearchItem>, StoreError>;

    async fn create_research(&self, new: &NewResearchItem) -> Result<ResearchItem, StoreError>;

    async fn update_research(
        &self,
        id: i32,
        patch: &ResearchPatch,
    ) -> Result<Option<ResearchItem>, StoreError>;

    async fn set_research_status(
        &self,
        id: i32,
        status: ResearchStatus,
    ) -> Result<Option<ResearchItem>, StoreError>;

    async fn delete_research(&self, id: i32) -> Result<Option<ResearchItem>, StoreError>;

    async fn research_stats(&self) -> Result<ResearchStats, StoreError>;
}

#[async_trait]
pub trait ChatLogStore: Send + Sync {
    async fn append_chat_message(
        &self,
        role: ChatRole,
        content: &str,
    ) -> Result<ChatMessage, StoreError>;

    /// The newest `limit` messages, oldest first.
    async fn recent_chat_messages(&self, limit: i64) -> Result<Vec<ChatMessage>, StoreError>;

    /// Returns the number of deleted messages.
    async fn clear_chat_messages(&self) -> Result<u64, StoreError>;
}

/// Everything the handlers and tools need from storage.
pub trait Store: ApplicationStore + PreparationStore + ResearchStore + ChatLogStore {}

impl<T> Store for T where T: ApplicationStore + PreparationStore + ResearchStore + ChatLogStore {}

/// Escapes LIKE wildcards so user input matches literally inside `%…%`.
pub(crate) fn contains_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("ETH"), "%ETH%");
        assert_eq!(contains_pattern("100%_"), "%100\\%\\_%");
    }
}
