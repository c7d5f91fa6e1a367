//! Typed HTTP client for the dashboard API, plus the per-resource state
//! containers built on it.

pub mod state;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::models::application::{
    Application, ApplicationPatch, ApplicationQuery, ApplicationStats, CreateApplicationRequest,
    Documents, DocumentsPatch,
};
use crate::models::chat::{ChatMessage, ChatReply, ChatRequest};
use crate::models::preparation::{
    CreatePreparationRequest, PrepType, PreparationItem, PreparationPatch, PreparationStats,
};
use crate::models::research::{
    AutofillRequest, CreateResearchRequest, ResearchItem, ResearchPatch, ResearchQuery,
    ResearchStats, ResearchStatus, ResearchSuggestion,
};

pub use state::{ApplicationsState, PreparationState, ResearchState};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-2xx status.
    #[error("API returned {status}: {message}")]
    Api { status: u16, message: String },
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Http(e) => e.status().map(|s| s.as_u16()),
        }
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Deserialize)]
struct Deleted<T> {
    deleted: T,
}

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    /// `base_url` is the server origin, e.g. `http://localhost:3001`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorEnvelope>(&text)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| fallback_message(status, &text));
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }

    // -- applications ------------------------------------------------------

    pub async fn list_applications(
        &self,
        query: &ApplicationQuery,
    ) -> Result<Vec<Application>, ClientError> {
        self.send(self.http.get(self.url("/applications")).query(query))
            .await
    }

    pub async fn get_application(&self, id: i32) -> Result<Application, ClientError> {
        self.send(self.http.get(self.url(&format!("/applications/{id}"))))
            .await
    }

    pub async fn create_application(
        &self,
        request: &CreateApplicationRequest,
    ) -> Result<Application, ClientError> {
        self.send(self.http.post(self.url("/applications")).json(request))
            .await
    }

    pub async fn update_application(
        &self,
        id: i32,
        patch: &ApplicationPatch,
    ) -> Result<Application, ClientError> {
        self.send(
            self.http
                .put(self.url(&format!("/applications/{id}")))
                .json(patch),
        )
        .await
    }

    pub async fn delete_application(&self, id: i32) -> Result<(), ClientError> {
        self.send::<Value>(self.http.delete(self.url(&format!("/applications/{id}"))))
            .await
            .map(|_| ())
    }

    pub async fn update_documents(
        &self,
        id: i32,
        patch: &DocumentsPatch,
    ) -> Result<Documents, ClientError> {
        self.send(
            self.http
                .put(self.url(&format!("/applications/{id}/documents")))
                .json(patch),
        )
        .await
    }

    pub async fn application_stats(&self) -> Result<ApplicationStats, ClientError> {
        self.send(self.http.get(self.url("/applications/stats/summary")))
            .await
    }

    // -- preparation -------------------------------------------------------

    pub async fn list_preparation(
        &self,
        kind: Option<PrepType>,
    ) -> Result<Vec<PreparationItem>, ClientError> {
        let mut request = self.http.get(self.url("/preparation"));
        if let Some(kind) = kind {
            request = request.query(&[("type", kind.as_str())]);
        }
        self.send(request).await
    }

    pub async fn create_preparation(
        &self,
        request: &CreatePreparationRequest,
    ) -> Result<PreparationItem, ClientError> {
        self.send(self.http.post(self.url("/preparation")).json(request))
            .await
    }

    pub async fn update_preparation(
        &self,
        id: i32,
        patch: &PreparationPatch,
    ) -> Result<PreparationItem, ClientError> {
        self.send(
            self.http
                .put(self.url(&format!("/preparation/{id}")))
                .json(patch),
        )
        .await
    }

    pub async fn toggle_preparation(&self, id: i32) -> Result<PreparationItem, ClientError> {
        self.send(
            self.http
                .patch(self.url(&format!("/preparation/{id}/toggle"))),
        )
        .await
    }

    pub async fn delete_preparation(&self, id: i32) -> Result<PreparationItem, ClientError> {
        self.send::<Deleted<PreparationItem>>(
            self.http.delete(self.url(&format!("/preparation/{id}"))),
        )
        .await
        .map(|d| d.deleted)
    }

    pub async fn preparation_stats(&self) -> Result<Vec<PreparationStats>, ClientError> {
        self.send(self.http.get(self.url("/preparation/stats")))
            .await
    }

    // -- research ----------------------------------------------------------

    pub async fn list_research(
        &self,
        query: &ResearchQuery,
    ) -> Result<Vec<ResearchItem>, ClientError> {
        self.send(self.http.get(self.url("/research")).query(query))
            .await
    }

    pub async fn create_research(
        &self,
        request: &CreateResearchRequest,
    ) -> Result<ResearchItem, ClientError> {
        self.send(self.http.post(self.url("/research")).json(request))
            .await
    }

    pub async fn update_research(
        &self,
        id: i32,
        patch: &ResearchPatch,
    ) -> Result<ResearchItem, ClientError> {
        self.send(self.http.put(self.url(&format!("/research/{id}"))).json(patch))
            .await
    }

    pub async fn set_research_status(
        &self,
        id: i32,
        status: ResearchStatus,
    ) -> Result<ResearchItem, ClientError> {
        self.send(
            self.http
                .patch(self.url(&format!("/research/{id}/status")))
                .json(&json!({ "status": status })),
        )
        .await
    }

    pub async fn delete_research(&self, id: i32) -> Result<ResearchItem, ClientError> {
        self.send::<Deleted<ResearchItem>>(self.http.delete(self.url(&format!("/research/{id}"))))
            .await
            .map(|d| d.deleted)
    }

    pub async fn research_stats(&self) -> Result<ResearchStats, ClientError> {
        self.send(self.http.get(self.url("/research/stats"))).await
    }

    pub async fn autofill_research(
        &self,
        request: &AutofillRequest,
    ) -> Result<ResearchSuggestion, ClientError> {
        self.send(self.http.post(self.url("/research/autofill")).json(request))
            .await
    }

    // -- chat --------------------------------------------------------------

    pub async fn send_chat(
        &self,
        message: &str,
        session_id: Option<&str>,
    ) -> Result<ChatReply, ClientError> {
        let body = ChatRequest {
            message: Some(message.to_string()),
            session_id: session_id.map(str::to_string),
        };
        self.send(self.http.post(self.url("/chat")).json(&body))
            .await
    }

    pub async fn chat_history(&self, limit: Option<i64>) -> Result<Vec<ChatMessage>, ClientError> {
        let mut request = self.http.get(self.url("/chat/history"));
        if let Some(limit) = limit {
            request = request.query(&[("limit", limit)]);
        }
        self.send(request).await
    }

    pub async fn clear_chat_history(&self, session_id: Option<&str>) -> Result<(), ClientError> {
        let mut request = self.http.delete(self.url("/chat/history"));
        if let Some(session_id) = session_id {
            request = request.query(&[("sessionId", session_id)]);
        }
        self.send::<Value>(request).await.map(|_| ())
    }

    pub async fn health(&self) -> Result<Value, ClientError> {
        self.send(self.http.get(format!("{}/health", self.base_url)))
            .await
    }
}

fn fallback_message(status: StatusCode, body: &str) -> String {
    if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.trim().to_string()
    }
}

/// Serves the router on an ephemeral local port for client tests.
#[cfg(test)]
pub(crate) mod test_server {
    use std::net::SocketAddr;
    use std::sync::Arc;

    use crate::llm_client::testing::ScriptedModel;
    use crate::routes::{build_router, test_support::test_state};
    use crate::store::MemoryStore;

    use super::ApiClient;

    pub async fn spawn(model: ScriptedModel) -> (ApiClient, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let app = build_router(test_state(store.clone(), Arc::new(model)));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });
        (ApiClient::new(format!("http://{addr}")), store)
    }
}
