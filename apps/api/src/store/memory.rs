//! In-process store used by unit and router tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};

use crate::models::application::{
    Application, ApplicationFilter, ApplicationPatch, ApplicationStats, ApplicationStatus,
    DashboardSummary, DeadlineEntry, DocumentStats, Documents, DocumentsPatch, NewApplication,
    UpcomingDeadline,
};
use crate::models::chat::{ChatMessage, ChatRole};
use crate::models::preparation::{
    NewPreparationItem, PrepType, PreparationItem, PreparationPatch, PreparationStats,
};
use crate::models::research::{
    NewResearchItem, ResearchFilter, ResearchItem, ResearchPatch, ResearchStats, ResearchStatus,
};
use crate::models::Country;
use crate::store::{
    ApplicationStore, ChatLogStore, PreparationStore, ResearchStore, StoreError,
};

#[derive(Default)]
struct Tables {
    next_id: i32,
    applications: BTreeMap<i32, Application>,
    documents: BTreeMap<i32, Documents>,
    preparation: BTreeMap<i32, PreparationItem>,
    research: BTreeMap<i32, ResearchItem>,
    chat: Vec<ChatMessage>,
}

impl Tables {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn joined(&self, application: &Application) -> Application {
        let mut joined = application.clone();
        joined.documents = self
            .documents
            .get(&application.id)
            .map(Documents::flags)
            .unwrap_or_default();
        joined
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail as if the database were unreachable.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(self.tables.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

#[async_trait]
impl ApplicationStore for MemoryStore {
    async fn list_applications(
        &self,
        filter: &ApplicationFilter,
    ) -> Result<Vec<Application>, StoreError> {
        let tables = self.tables()?;
        let mut rows: Vec<Application> = tables
            .applications
            .values()
            .map(|a| tables.joined(a))
            .filter(|a| filter.matches(a))
            .collect();
        rows.sort_by_key(|a| (a.deadline, a.id));
        Ok(rows)
    }

    async fn get_application(&self, id: i32) -> Result<Option<Application>, StoreError> {
        let tables = self.tables()?;
        Ok(tables.applications.get(&id).map(|a| tables.joined(a)))
    }

    async fn create_application(&self, new: &NewApplication) -> Result<Application, StoreError> {
        let mut tables = self.tables()?;
        let id = tables.next_id();
        let now = Utc::now();
        let application = Application {
            id,
            university_name: new.university_name.clone(),
            program_name: new.program_name.clone(),
            country: new.country,
            deadline: new.deadline,
            status: new.status,
            notes: new.notes.clone(),
            created_at: now,
            updated_at: now,
            documents: Default::default(),
        };
        tables.applications.insert(id, application.clone());
        tables.documents.insert(
            id,
            Documents {
                application_id: id,
                gre: false,
                toefl_ielts: false,
                lors: false,
                sop: false,
                transcript: false,
                updated_at: now,
            },
        );
        Ok(application)
    }

    async fn update_application(
        &self,
        id: i32,
        patch: &ApplicationPatch,
    ) -> Result<Option<Application>, StoreError> {
        let mut tables = self.tables()?;
        let Some(application) = tables.applications.get_mut(&id) else {
            return Ok(None);
        };
        patch.apply(application);
        application.updated_at = Utc::now();
        let updated = application.clone();
        Ok(Some(tables.joined(&updated)))
    }

    async fn delete_application(&self, id: i32) -> Result<bool, StoreError> {
        let mut tables = self.tables()?;
        tables.documents.remove(&id);
        Ok(tables.applications.remove(&id).is_some())
    }

    async fn update_documents(
        &self,
        application_id: i32,
        patch: &DocumentsPatch,
    ) -> Result<Option<Documents>, StoreError> {
        let mut tables = self.tables()?;
        Ok(tables.documents.get_mut(&application_id).map(|documents| {
            patch.apply(documents);
            documents.updated_at = Utc::now();
            documents.clone()
        }))
    }

    async fn application_stats(&self) -> Result<ApplicationStats, StoreError> {
        let tables = self.tables()?;
        let today = today();
        let applications = tables.applications.values();
        let mut documents = DocumentStats::default();
        for d in tables.documents.values() {
            documents.gre_complete += i64::from(d.gre);
            documents.toefl_complete += i64::from(d.toefl_ielts);
            documents.lors_complete += i64::from(d.lors);
            documents.sop_complete += i64::from(d.sop);
            documents.transcript_complete += i64::from(d.transcript);
            documents.total += 1;
        }
        Ok(ApplicationStats {
            total_applications: applications.len() as i64,
            completed: tables
                .applications
                .values()
                .filter(|a| a.status.counts_as_completed())
                .count() as i64,
            next_deadline: tables
                .applications
                .values()
                .map(|a| a.deadline)
                .filter(|d| *d >= today)
                .min(),
            documents,
        })
    }

    async fn dashboard_summary(&self) -> Result<DashboardSummary, StoreError> {
        let tables = self.tables()?;
        let today = today();
        let next = tables
            .applications
            .values()
            .filter(|a| a.deadline > today)
            .min_by_key(|a| (a.deadline, a.id));
        Ok(DashboardSummary {
            total: tables.applications.len() as i64,
            completed: tables
                .applications
                .values()
                .filter(|a| {
                    matches!(
                        a.status,
                        ApplicationStatus::Submitted | ApplicationStatus::Result
                    )
                })
                .count() as i64,
            in_progress: tables
                .applications
                .values()
                .filter(|a| a.status == ApplicationStatus::InProgress)
                .count() as i64,
            next_deadline: next.map(|a| a.deadline),
            next_deadline_app: next.map(|a| DeadlineEntry {
                university_name: a.university_name.clone(),
                program_name: a.program_name.clone(),
                deadline: a.deadline,
            }),
        })
    }

    async fn upcoming_deadlines(&self, days: i32) -> Result<Vec<UpcomingDeadline>, StoreError> {
        let tables = self.tables()?;
        let today = today();
        let until = today + Duration::days(i64::from(days));
        let mut rows: Vec<&Application> = tables
            .applications
            .values()
            .filter(|a| a.deadline >= today && a.deadline <= until)
            .collect();
        rows.sort_by_key(|a| (a.deadline, a.id));
        Ok(rows
            .into_iter()
            .map(|a| UpcomingDeadline {
                university_name: a.university_name.clone(),
                program_name: a.program_name.clone(),
                country: a.country,
                deadline: a.deadline,
                status: a.status,
            })
            .collect())
    }
}

#[async_trait]
impl PreparationStore for MemoryStore {
    async fn list_preparation(
        &self,
        kind: Option<PrepType>,
    ) -> Result<Vec<PreparationItem>, StoreError> {
        let tables = self.tables()?;
        let mut rows: Vec<PreparationItem> = tables
            .preparation
            .values()
            .filter(|p| kind.map_or(true, |k| k == p.kind))
            .cloned()
            .collect();
        rows.sort_by_key(|p| {
            (
                p.target_date.is_none(),
                p.target_date,
                p.created_at,
                p.id,
            )
        });
        Ok(rows)
    }

    async fn create_preparation(
        &self,
        new: &NewPreparationItem,
    ) -> Result<PreparationItem, StoreError> {
        let mut tables = self.tables()?;
        let id = tables.next_id();
        let item = PreparationItem {
            id,
            kind: new.kind,
            title: new.title.clone(),
            target_date: new.target_date,
            notes: new.notes.clone(),
            completed: false,
            created_at: Utc::now(),
        };
        tables.preparation.insert(id, item.clone());
        Ok(item)
    }

    async fn update_preparation(
        &self,
        id: i32,
        patch: &PreparationPatch,
    ) -> Result<Option<PreparationItem>, StoreError> {
        let mut tables = self.tables()?;
        Ok(tables.preparation.get_mut(&id).map(|item| {
            patch.apply(item);
            item.clone()
        }))
    }

    async fn toggle_preparation(&self, id: i32) -> Result<Option<PreparationItem>, StoreError> {
        let mut tables = self.tables()?;
        Ok(tables.preparation.get_mut(&id).map(|item| {
            item.completed = !item.completed;
            item.clone()
        }))
    }

    async fn delete_preparation(&self, id: i32) -> Result<Option<PreparationItem>, StoreError> {
        Ok(self.tables()?.preparation.remove(&id))
    }

    async fn preparation_stats(&self) -> Result<Vec<PreparationStats>, StoreError> {
        let tables = self.tables()?;
        let today = today();
        let mut by_kind: BTreeMap<&'static str, PreparationStats> = BTreeMap::new();
        for item in tables.preparation.values() {
            let entry = by_kind
                .entry(item.kind.as_str())
                .or_insert_with(|| PreparationStats {
                    kind: item.kind,
                    total: 0,
                    completed: 0,
                    next_target: None,
                });
            entry.total += 1;
            if item.completed {
                entry.completed += 1;
            } else if let Some(target) = item.target_date.filter(|d| *d >= today) {
                entry.next_target = Some(entry.next_target.map_or(target, |t| t.min(target)));
            }
        }
        Ok(by_kind.into_values().collect())
    }
}

#[async_trait]
impl ResearchStore for MemoryStore {
    async fn list_research(
        &self,
        filter: &ResearchFilter,
    ) -> Result<Vec<ResearchItem>, StoreError> {
        let tables = self.tables()?;
        let mut rows: Vec<ResearchItem> = tables
            .research
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            let shortlisted = |r: &ResearchItem| r.status == ResearchStatus::Shortlisted;
            shortlisted(b)
                .cmp(&shortlisted(a))
                .then_with(|| match (a.ranking, b.ranking) {
                    (Some(x), Some(y)) => x.cmp(&y),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => std::cmp::Ordering::Equal,
                })
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(rows)
    }

    async fn create_research(&self, new: &NewResearchItem) -> Result<ResearchItem, StoreError> {
        let mut tables = self.tables()?;
        let id = tables.next_id();
        let item = ResearchItem {
            id,
            university_name: new.university_name.clone(),
            program_name: new.program_name.clone(),
            country: new.country,
            website: new.website.clone(),
            ranking: new.ranking,
            tuition_fees: new.tuition_fees.clone(),
            requirements: new.requirements.clone(),
            notes: new.notes.clone(),
            status: ResearchStatus::Researching,
            created_at: Utc::now(),
        };
        tables.research.insert(id, item.clone());
        Ok(item)
    }

    async fn update_research(
        &self,
        id: i32,
        patch: &ResearchPatch,
    ) -> Result<Option<ResearchItem>, StoreError> {
        let mut tables = self.tables()?;
        Ok(tables.research.get_mut(&id).map(|item| {
            patch.apply(item);
            item.clone()
        }))
    }

    async fn set_research_status(
        &self,
        id: i32,
        status: ResearchStatus,
    ) -> Result<Option<ResearchItem>, StoreError> {
        let mut tables = self.tables()?;
        Ok(tables.research.get_mut(&id).map(|item| {
            item.status = status;
            item.clone()
        }))
    }

    async fn delete_research(&self, id: i32) -> Result<Option<ResearchItem>, StoreError> {
        Ok(self.tables()?.research.remove(&id))
    }

    async fn research_stats(&self) -> Result<ResearchStats, StoreError> {
        let tables = self.tables()?;
        let count = |pred: &dyn Fn(&ResearchItem) -> bool| {
            tables.research.values().filter(|r| pred(r)).count() as i64
        };
        Ok(ResearchStats {
            total: tables.research.len() as i64,
            shortlisted: count(&|r| r.status == ResearchStatus::Shortlisted),
            applied: count(&|r| r.status == ResearchStatus::Applied),
            germany: count(&|r| r.country == Country::Germany),
            switzerland: count(&|r| r.country == Country::Switzerland),
        })
    }
}

#[async_trait]
impl ChatLogStore for MemoryStore {
    async fn append_chat_message(
        &self,
        role: ChatRole,
        content: &str,
    ) -> Result<ChatMessage, StoreError> {
        let mut tables = self.tables()?;
        let id = tables.next_id();
        let message = ChatMessage {
            id,
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        tables.chat.push(message.clone());
        Ok(message)
    }

    async fn recent_chat_messages(&self, limit: i64) -> Result<Vec<ChatMessage>, StoreError> {
        let tables = self.tables()?;
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        let skip = tables.chat.len().saturating_sub(limit);
        Ok(tables.chat[skip..].to_vec())
    }

    async fn clear_chat_messages(&self) -> Result<u64, StoreError> {
        let mut tables = self.tables()?;
        let deleted = tables.chat.len() as u64;
        tables.chat.clear();
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn application(name: &str, deadline: NaiveDate) -> NewApplication {
        NewApplication {
            university_name: name.into(),
            program_name: "M.Sc. Computer Science".into(),
            country: Country::Germany,
            deadline,
            status: ApplicationStatus::NotStarted,
            notes: None,
        }
    }

    #[tokio::test]
    async fn created_application_has_blank_checklist() {
        let store = MemoryStore::new();
        let created = store
            .create_application(&application("TU Berlin", today() + Duration::days(30)))
            .await
            .unwrap();
        assert_eq!(created.documents, Default::default());

        let docs = store
            .update_documents(
                created.id,
                &DocumentsPatch {
                    sop: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert!(docs.sop);
        let fetched = store.get_application(created.id).await.unwrap().unwrap();
        assert!(fetched.documents.sop);
        assert!(!fetched.documents.gre);
    }

    #[tokio::test]
    async fn delete_cascades_to_documents() {
        let store = MemoryStore::new();
        let created = store
            .create_application(&application("RWTH", today()))
            .await
            .unwrap();
        assert!(store.delete_application(created.id).await.unwrap());
        assert!(!store.delete_application(created.id).await.unwrap());
        assert!(store
            .update_documents(created.id, &DocumentsPatch::default())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn research_lists_shortlisted_first_then_by_ranking() {
        let store = MemoryStore::new();
        let new = |name: &str, ranking: Option<i32>| NewResearchItem {
            university_name: name.into(),
            program_name: "MSc".into(),
            country: Country::Switzerland,
            website: None,
            ranking,
            tuition_fees: None,
            requirements: None,
            notes: None,
        };
        store.create_research(&new("Unranked", None)).await.unwrap();
        store.create_research(&new("Tenth", Some(10))).await.unwrap();
        let epfl = store.create_research(&new("Fortieth", Some(40))).await.unwrap();
        store
            .set_research_status(epfl.id, ResearchStatus::Shortlisted)
            .await
            .unwrap();

        let names: Vec<_> = store
            .list_research(&ResearchFilter::default())
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.university_name)
            .collect();
        assert_eq!(names, vec!["Fortieth", "Tenth", "Unranked"]);
    }

    #[tokio::test]
    async fn recent_chat_messages_keeps_the_newest_in_order() {
        let store = MemoryStore::new();
        for n in 0..5 {
            store
                .append_chat_message(ChatRole::User, &format!("m{n}"))
                .await
                .unwrap();
        }
        let recent: Vec<_> = store
            .recent_chat_messages(2)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(recent, vec!["m3", "m4"]);
        assert_eq!(store.clear_chat_messages().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn failing_store_reports_database_errors() {
        let store = MemoryStore::new();
        store.set_failing(true);
        assert!(matches!(
            store.research_stats().await,
            Err(StoreError::Database(_))
        ));
    }
}
