//! Local list state for each resource. Mutations go to the server first and
//! only touch the local list once the call succeeded.

use chrono::{NaiveDate, Utc};

use crate::client::{ApiClient, ClientError};
use crate::models::application::{
    Application, ApplicationPatch, ApplicationQuery, ApplicationStatus, CreateApplicationRequest,
    DocumentsPatch,
};
use crate::models::preparation::{
    CreatePreparationRequest, PrepType, PreparationItem, PreparationPatch,
};
use crate::models::research::{
    CreateResearchRequest, ResearchItem, ResearchPatch, ResearchQuery, ResearchStatus,
};
use crate::models::Country;

fn replace_by_id<T>(items: &mut [T], updated: T, id_of: impl Fn(&T) -> i32) {
    let id = id_of(&updated);
    if let Some(slot) = items.iter_mut().find(|item| id_of(item) == id) {
        *slot = updated;
    }
}

/// Counters derived from the loaded applications.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationSummary {
    pub total: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub next_deadline: Option<NaiveDate>,
}

/// How close a deadline is, in whole days from today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    /// Due today.
    Critical,
    /// Due within a week.
    Urgent,
    Upcoming,
}

impl Urgency {
    pub fn for_days_left(days_left: i64) -> Self {
        match days_left {
            ..=0 => Urgency::Critical,
            1..=7 => Urgency::Urgent,
            _ => Urgency::Upcoming,
        }
    }
}

pub struct ApplicationsState {
    client: ApiClient,
    pub filters: ApplicationQuery,
    pub applications: Vec<Application>,
    pub loading: bool,
    pub error: Option<String>,
}

impl ApplicationsState {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            filters: ApplicationQuery::default(),
            applications: Vec::new(),
            loading: false,
            error: None,
        }
    }

    /// Refetches the list with the current filters.
    pub async fn refresh(&mut self) -> Result<(), ClientError> {
        self.loading = true;
        self.error = None;
        let result = self.client.list_applications(&self.filters).await;
        self.loading = false;
        match result {
            Ok(applications) => {
                self.applications = applications;
                Ok(())
            }
            Err(e) => {
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    pub async fn set_filters(&mut self, filters: ApplicationQuery) -> Result<(), ClientError> {
        self.filters = filters;
        self.refresh().await
    }

    pub async fn add(
        &mut self,
        request: &CreateApplicationRequest,
    ) -> Result<Application, ClientError> {
        let created = self.client.create_application(request).await?;
        self.applications.push(created.clone());
        self.applications.sort_by_key(|a| a.deadline);
        Ok(created)
    }

    pub async fn update(
        &mut self,
        id: i32,
        patch: &ApplicationPatch,
    ) -> Result<Application, ClientError> {
        let updated = self.client.update_application(id, patch).await?;
        replace_by_id(&mut self.applications, updated.clone(), |a| a.id);
        Ok(updated)
    }

    pub async fn delete(&mut self, id: i32) -> Result<(), ClientError> {
        self.client.delete_application(id).await?;
        self.applications.retain(|a| a.id != id);
        Ok(())
    }

    /// Sends the changed flags and merges the stored result into the row.
    pub async fn update_documents(
        &mut self,
        id: i32,
        patch: &DocumentsPatch,
    ) -> Result<(), ClientError> {
        let documents = self.client.update_documents(id, patch).await?;
        if let Some(application) = self.applications.iter_mut().find(|a| a.id == id) {
            application.documents = documents.flags();
        }
        Ok(())
    }

    pub fn summary(&self) -> ApplicationSummary {
        let today = Utc::now().date_naive();
        ApplicationSummary {
            total: self.applications.len(),
            completed: self
                .applications
                .iter()
                .filter(|a| a.status.counts_as_completed())
                .count(),
            in_progress: self
                .applications
                .iter()
                .filter(|a| a.status == ApplicationStatus::InProgress)
                .count(),
            next_deadline: self
                .applications
                .iter()
                .map(|a| a.deadline)
                .filter(|d| *d >= today)
                .min(),
        }
    }

    /// Share of applications past the drafting stage, as a rounded percentage.
    pub fn completion_rate(&self) -> u32 {
        let summary = self.summary();
        if summary.total == 0 {
            return 0;
        }
        (summary.completed as f64 / summary.total as f64 * 100.0).round() as u32
    }

    /// The application with the nearest deadline that has not passed, and
    /// the days left until it.
    pub fn next_deadline_countdown(&self) -> Option<(&Application, i64)> {
        let today = Utc::now().date_naive();
        self.applications
            .iter()
            .filter(|a| a.deadline >= today)
            .min_by_key(|a| a.deadline)
            .map(|a| (a, (a.deadline - today).num_days()))
    }

    /// Applications due between today and `days` from now, soonest first.
    pub fn upcoming_within(&self, days: i64) -> Vec<(&Application, i64, Urgency)> {
        let today = Utc::now().date_naive();
        let mut upcoming: Vec<_> = self
            .applications
            .iter()
            .map(|a| (a, (a.deadline - today).num_days()))
            .filter(|(_, left)| (0..=days).contains(left))
            .map(|(a, left)| (a, left, Urgency::for_days_left(left)))
            .collect();
        upcoming.sort_by_key(|(a, ..)| a.deadline);
        upcoming
    }

    /// Pretty JSON of the loaded list and a download name stamped with today's date.
    pub fn export_json(&self) -> Result<(String, String), serde_json::Error> {
        let filename = format!("applications-{}.json", Utc::now().format("%Y-%m-%d"));
        Ok((filename, serde_json::to_string_pretty(&self.applications)?))
    }
}

pub struct PreparationState {
    client: ApiClient,
    pub items: Vec<PreparationItem>,
    pub loading: bool,
    pub error: Option<String>,
}

impl PreparationState {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            items: Vec::new(),
            loading: false,
            error: None,
        }
    }

    pub async fn refresh(&mut self) -> Result<(), ClientError> {
        self.loading = true;
        let result = self.client.list_preparation(None).await;
        self.loading = false;
        match result {
            Ok(items) => {
                self.items = items;
                self.error = None;
                Ok(())
            }
            Err(e) => {
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    pub async fn add(
        &mut self,
        request: &CreatePreparationRequest,
    ) -> Result<PreparationItem, ClientError> {
        let created = self.client.create_preparation(request).await?;
        self.items.push(created.clone());
        // Undated items sort after every dated one.
        self.items
            .sort_by_key(|item| (item.target_date.is_none(), item.target_date));
        Ok(created)
    }

    pub async fn update(
        &mut self,
        id: i32,
        patch: &PreparationPatch,
    ) -> Result<PreparationItem, ClientError> {
        let updated = self.client.update_preparation(id, patch).await?;
        replace_by_id(&mut self.items, updated.clone(), |i| i.id);
        Ok(updated)
    }

    pub async fn toggle(&mut self, id: i32) -> Result<PreparationItem, ClientError> {
        let updated = self.client.toggle_preparation(id).await?;
        replace_by_id(&mut self.items, updated.clone(), |i| i.id);
        Ok(updated)
    }

    pub async fn delete(&mut self, id: i32) -> Result<(), ClientError> {
        self.client.delete_preparation(id).await?;
        self.items.retain(|i| i.id != id);
        Ok(())
    }

    pub fn of_kind(&self, kind: PrepType) -> Vec<&PreparationItem> {
        self.items.iter().filter(|i| i.kind == kind).collect()
    }

    /// First open milestone with a target date for the given kind.
    pub fn next_target(&self, kind: PrepType) -> Option<NaiveDate> {
        self.items
            .iter()
            .filter(|i| i.kind == kind && !i.completed)
            .find_map(|i| i.target_date)
    }
}

pub struct ResearchState {
    client: ApiClient,
    pub filters: ResearchQuery,
    pub items: Vec<ResearchItem>,
    pub loading: bool,
    pub error: Option<String>,
}

impl ResearchState {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            filters: ResearchQuery::default(),
            items: Vec::new(),
            loading: false,
            error: None,
        }
    }

    pub async fn refresh(&mut self) -> Result<(), ClientError> {
        self.loading = true;
        let result = self.client.list_research(&self.filters).await;
        self.loading = false;
        match result {
            Ok(items) => {
                self.items = items;
                self.error = None;
                Ok(())
            }
            Err(e) => {
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// New programs go to the top of the list.
    pub async fn add(
        &mut self,
        request: &CreateResearchRequest,
    ) -> Result<ResearchItem, ClientError> {
        let created = self.client.create_research(request).await?;
        self.items.insert(0, created.clone());
        Ok(created)
    }

    pub async fn update(
        &mut self,
        id: i32,
        patch: &ResearchPatch,
    ) -> Result<ResearchItem, ClientError> {
        let updated = self.client.update_research(id, patch).await?;
        replace_by_id(&mut self.items, updated.clone(), |i| i.id);
        Ok(updated)
    }

    pub async fn set_status(
        &mut self,
        id: i32,
        status: ResearchStatus,
    ) -> Result<ResearchItem, ClientError> {
        let updated = self.client.set_research_status(id, status).await?;
        replace_by_id(&mut self.items, updated.clone(), |i| i.id);
        Ok(updated)
    }

    pub async fn delete(&mut self, id: i32) -> Result<(), ClientError> {
        self.client.delete_research(id).await?;
        self.items.retain(|i| i.id != id);
        Ok(())
    }

    pub fn with_status(&self, status: ResearchStatus) -> Vec<&ResearchItem> {
        self.items.iter().filter(|i| i.status == status).collect()
    }

    pub fn count_in(&self, country: Country) -> usize {
        self.items.iter().filter(|i| i.country == country).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_server::spawn;
    use crate::llm_client::testing::ScriptedModel;
    use chrono::Duration;

    fn in_days(days: i64) -> NaiveDate {
        Utc::now().date_naive() + Duration::days(days)
    }

    fn application(university: &str, days: i64, status: ApplicationStatus) -> CreateApplicationRequest {
        CreateApplicationRequest {
            university_name: Some(university.to_string()),
            program_name: Some("M.Sc. Physics".to_string()),
            country: Some(Country::Switzerland),
            deadline: Some(in_days(days)),
            status: Some(status),
            notes: None,
        }
    }

    #[tokio::test]
    async fn added_applications_stay_sorted_by_deadline() {
        let (client, _) = spawn(ScriptedModel::default()).await;
        let mut state = ApplicationsState::new(client);
        state.refresh().await.unwrap();
        assert!(state.applications.is_empty());
        assert!(!state.loading);

        state
            .add(&application("Late", 50, ApplicationStatus::Submitted))
            .await
            .unwrap();
        state
            .add(&application("Early", 5, ApplicationStatus::InProgress))
            .await
            .unwrap();

        let names: Vec<_> = state
            .applications
            .iter()
            .map(|a| a.university_name.as_str())
            .collect();
        assert_eq!(names, vec!["Early", "Late"]);

        let summary = state.summary();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.in_progress, 1);
        assert_eq!(summary.next_deadline, Some(in_days(5)));
    }

    #[test]
    fn urgency_tiers_follow_days_left() {
        assert_eq!(Urgency::for_days_left(0), Urgency::Critical);
        assert_eq!(Urgency::for_days_left(1), Urgency::Urgent);
        assert_eq!(Urgency::for_days_left(7), Urgency::Urgent);
        assert_eq!(Urgency::for_days_left(8), Urgency::Upcoming);
    }

    #[tokio::test]
    async fn completion_rate_is_a_rounded_percentage() {
        let (client, _) = spawn(ScriptedModel::default()).await;
        let mut state = ApplicationsState::new(client);
        assert_eq!(state.completion_rate(), 0);

        for (name, status) in [
            ("ETH", ApplicationStatus::Submitted),
            ("EPFL", ApplicationStatus::InProgress),
            ("UZH", ApplicationStatus::NotStarted),
        ] {
            state.add(&application(name, 30, status)).await.unwrap();
        }
        assert_eq!(state.completion_rate(), 33);

        let id = state.applications[1].id;
        state
            .update(
                id,
                &ApplicationPatch {
                    status: Some(ApplicationStatus::Result),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(state.completion_rate(), 67);
    }

    #[tokio::test]
    async fn countdown_names_the_nearest_future_deadline() {
        let (client, _) = spawn(ScriptedModel::default()).await;
        let mut state = ApplicationsState::new(client);
        assert!(state.next_deadline_countdown().is_none());

        state
            .add(&application("Passed", -3, ApplicationStatus::Submitted))
            .await
            .unwrap();
        assert!(state.next_deadline_countdown().is_none());

        state
            .add(&application("Zurich", 12, ApplicationStatus::InProgress))
            .await
            .unwrap();
        state
            .add(&application("Geneva", 40, ApplicationStatus::NotStarted))
            .await
            .unwrap();
        let (next, days_left) = state.next_deadline_countdown().unwrap();
        assert_eq!(next.university_name, "Zurich");
        assert_eq!(days_left, 12);
    }

    #[tokio::test]
    async fn upcoming_window_is_sorted_and_tiered() {
        let (client, _) = spawn(ScriptedModel::default()).await;
        let mut state = ApplicationsState::new(client);
        for (name, days) in [("Later", 45), ("Week", 6), ("Gone", -1), ("Month", 30), ("Today", 0)] {
            state
                .add(&application(name, days, ApplicationStatus::InProgress))
                .await
                .unwrap();
        }

        let upcoming: Vec<_> = state
            .upcoming_within(30)
            .into_iter()
            .map(|(a, left, urgency)| (a.university_name.as_str(), left, urgency))
            .collect();
        assert_eq!(
            upcoming,
            vec![
                ("Today", 0, Urgency::Critical),
                ("Week", 6, Urgency::Urgent),
                ("Month", 30, Urgency::Upcoming),
            ]
        );
        assert!(state.upcoming_within(-1).is_empty());
    }

    #[tokio::test]
    async fn failed_mutation_leaves_local_list_alone() {
        let (client, _) = spawn(ScriptedModel::default()).await;
        let mut state = ApplicationsState::new(client);
        state
            .add(&application("Basel", 12, ApplicationStatus::NotStarted))
            .await
            .unwrap();

        let err = state
            .add(&CreateApplicationRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(400));
        assert_eq!(state.applications.len(), 1);

        assert!(state.delete(9999).await.is_err());
        assert_eq!(state.applications.len(), 1);
    }

    #[tokio::test]
    async fn refresh_failure_records_the_error() {
        let (client, store) = spawn(ScriptedModel::default()).await;
        let mut state = ResearchState::new(client);
        store.set_failing(true);
        assert!(state.refresh().await.is_err());
        assert!(state.error.is_some());
        assert!(!state.loading);

        store.set_failing(false);
        state.refresh().await.unwrap();
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn document_flags_merge_into_the_loaded_row() {
        let (client, _) = spawn(ScriptedModel::default()).await;
        let mut state = ApplicationsState::new(client);
        let created = state
            .add(&application("Bern", 20, ApplicationStatus::InProgress))
            .await
            .unwrap();
        state
            .update_documents(
                created.id,
                &DocumentsPatch {
                    gre: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(state.applications[0].documents.gre);
        assert!(!state.applications[0].documents.sop);
    }

    #[tokio::test]
    async fn export_names_the_file_after_today() {
        let (client, _) = spawn(ScriptedModel::default()).await;
        let mut state = ApplicationsState::new(client);
        state
            .add(&application("Lausanne", 9, ApplicationStatus::Interview))
            .await
            .unwrap();

        let (filename, body) = state.export_json().unwrap();
        assert_eq!(
            filename,
            format!("applications-{}.json", Utc::now().format("%Y-%m-%d"))
        );
        let parsed: Vec<Application> = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed, state.applications);
        assert!(body.contains('\n'));
    }

    #[tokio::test]
    async fn preparation_toggle_and_undated_ordering() {
        let (client, _) = spawn(ScriptedModel::default()).await;
        let mut state = PreparationState::new(client);
        let undated = state
            .add(&CreatePreparationRequest {
                kind: Some(PrepType::German),
                title: Some("Vocabulary".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        state
            .add(&CreatePreparationRequest {
                kind: Some(PrepType::German),
                title: Some("B1 exam".into()),
                target_date: Some(in_days(90)),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(state.items[0].title, "B1 exam");
        assert_eq!(state.items[1].id, undated.id);
        assert_eq!(state.next_target(PrepType::German), Some(in_days(90)));

        state.toggle(undated.id).await.unwrap();
        assert!(state.items[1].completed);
        assert_eq!(state.of_kind(PrepType::German).len(), 2);
        assert!(state.of_kind(PrepType::Gre).is_empty());

        state.delete(undated.id).await.unwrap();
        assert_eq!(state.items.len(), 1);
    }

    #[tokio::test]
    async fn research_additions_go_first_and_status_updates_replace() {
        let (client, _) = spawn(ScriptedModel::default()).await;
        let mut state = ResearchState::new(client);
        for name in ["TU Dresden", "Uni Stuttgart"] {
            state
                .add(&CreateResearchRequest {
                    university_name: Some(name.into()),
                    program_name: Some("M.Sc. Automotive".into()),
                    country: Some(Country::Germany),
                    ..Default::default()
                })
                .await
                .unwrap();
        }
        assert_eq!(state.items[0].university_name, "Uni Stuttgart");

        let id = state.items[1].id;
        state.set_status(id, ResearchStatus::Shortlisted).await.unwrap();
        assert_eq!(state.with_status(ResearchStatus::Shortlisted).len(), 1);
        assert_eq!(state.count_in(Country::Germany), 2);

        assert!(state.set_status(9999, ResearchStatus::Applied).await.is_err());
        assert_eq!(state.items.len(), 2);
    }
}
