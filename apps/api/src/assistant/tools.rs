//! The fixed set of functions the assistant may call, and their dispatch onto
//! the store.

use chrono::NaiveDate;
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::llm_client::{coerce_arguments, FunctionCall, FunctionDeclaration, Tool};
use crate::models::application::{
    ApplicationFilter, ApplicationPatch, ApplicationStatus, CreateApplicationRequest,
    DocumentsPatch,
};
use crate::models::preparation::{CreatePreparationRequest, PrepType};
use crate::models::{non_blank, Country};
use crate::store::{Store, StoreError};

const DEFAULT_LOOKAHEAD_DAYS: i32 = 30;
const MAX_LOOKAHEAD_DAYS: i64 = 3650;
const NO_PREPARATION_MESSAGE: &str =
    "No preparation items tracked yet. Add some using add_preparation_item.";

pub fn declarations() -> Vec<FunctionDeclaration> {
    let country = json!({"type": "string", "enum": Country::values(), "description": "Country of the university"});
    let status = json!({"type": "string", "enum": ApplicationStatus::values()});

    vec![
        FunctionDeclaration {
            name: "get_all_applications",
            description: "Get all university applications with their documents and status",
            parameters: None,
        },
        FunctionDeclaration {
            name: "search_applications",
            description: "Search applications by university name, program, or country",
            parameters: Some(json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Search query"},
                    "country": country.clone(),
                    "status": status.clone(),
                }
            })),
        },
        FunctionDeclaration {
            name: "add_application",
            description: "Add a new university application",
            parameters: Some(json!({
                "type": "object",
                "properties": {
                    "university_name": {"type": "string", "description": "Name of the university"},
                    "program_name": {"type": "string", "description": "Name of the program (e.g., M.Sc. Computer Science)"},
                    "country": country.clone(),
                    "deadline": {"type": "string", "description": "Application deadline in YYYY-MM-DD format"},
                    "notes": {"type": "string", "description": "Optional notes"},
                },
                "required": ["university_name", "program_name", "country", "deadline"]
            })),
        },
        FunctionDeclaration {
            name: "update_application_status",
            description: "Update the status of an application",
            parameters: Some(json!({
                "type": "object",
                "properties": {
                    "application_id": {"type": "number", "description": "ID of the application"},
                    "status": status,
                },
                "required": ["application_id", "status"]
            })),
        },
        FunctionDeclaration {
            name: "update_documents",
            description: "Update document completion status for an application",
            parameters: Some(json!({
                "type": "object",
                "properties": {
                    "application_id": {"type": "number"},
                    "gre": {"type": "boolean"},
                    "toefl_ielts": {"type": "boolean"},
                    "lors": {"type": "boolean"},
                    "sop": {"type": "boolean"},
                    "transcript": {"type": "boolean"},
                },
                "required": ["application_id"]
            })),
        },
        FunctionDeclaration {
            name: "get_dashboard_summary",
            description: "Get a summary of all applications including total count, completion rate, and upcoming deadlines",
            parameters: None,
        },
        FunctionDeclaration {
            name: "get_upcoming_deadlines",
            description: "Get applications with upcoming deadlines in the next N days (30 if omitted)",
            parameters: Some(json!({
                "type": "object",
                "properties": {
                    "days": {"type": "number", "description": "Number of days to look ahead"},
                }
            })),
        },
        FunctionDeclaration {
            name: "get_preparation_status",
            description: "Get status of preparation items (German course, GRE, IELTS)",
            parameters: None,
        },
        FunctionDeclaration {
            name: "add_preparation_item",
            description: "Add a new preparation tracking item",
            parameters: Some(json!({
                "type": "object",
                "properties": {
                    "type": {"type": "string", "enum": PrepType::values(), "description": "Type of preparation"},
                    "title": {"type": "string", "description": "Title of the milestone or goal"},
                    "target_date": {"type": "string", "description": "Target date in YYYY-MM-DD format"},
                    "notes": {"type": "string"},
                },
                "required": ["type", "title"]
            })),
        },
    ]
}

/// The declarations wrapped as the single tool entry a request carries.
pub fn tool_set() -> Tool {
    Tool {
        function_declarations: declarations(),
    }
}

/// What a call produced. Both variants are reported back to the model.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    Success(Value),
    Failure(String),
}

impl ToolOutcome {
    /// The `functionResponse.response` payload.
    pub fn into_response(self) -> Value {
        match self {
            ToolOutcome::Success(result) => json!({ "result": result }),
            ToolOutcome::Failure(error) => json!({ "error": error }),
        }
    }
}

#[derive(Debug, Error)]
enum ToolError {
    #[error("invalid arguments: {0}")]
    Arguments(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    Rejected(String),
}

impl From<AppError> for ToolError {
    fn from(e: AppError) -> Self {
        match e {
            AppError::Validation(msg) => ToolError::Rejected(msg),
            other => ToolError::Rejected(other.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    country: Option<Country>,
    #[serde(default)]
    status: Option<ApplicationStatus>,
}

#[derive(Debug, Deserialize)]
struct AddApplicationArgs {
    #[serde(default)]
    university_name: Option<String>,
    #[serde(default)]
    program_name: Option<String>,
    #[serde(default)]
    country: Option<Country>,
    #[serde(default, deserialize_with = "optional_date")]
    deadline: Option<NaiveDate>,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpdateStatusArgs {
    #[serde(deserialize_with = "lenient_id")]
    application_id: i32,
    status: ApplicationStatus,
}

#[derive(Debug, Deserialize)]
struct UpdateDocumentsArgs {
    #[serde(deserialize_with = "lenient_id")]
    application_id: i32,
    #[serde(flatten)]
    patch: DocumentsPatch,
}

#[derive(Debug, Deserialize)]
struct UpcomingArgs {
    #[serde(default, deserialize_with = "lenient_optional_int")]
    days: Option<i64>,
}

impl UpcomingArgs {
    fn days(&self) -> i32 {
        match self.days {
            Some(days) if days > 0 => days.min(MAX_LOOKAHEAD_DAYS) as i32,
            _ => DEFAULT_LOOKAHEAD_DAYS,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AddPrepArgs {
    #[serde(rename = "type", default)]
    kind: Option<PrepType>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default, deserialize_with = "optional_date")]
    target_date: Option<NaiveDate>,
    #[serde(default)]
    notes: Option<String>,
}

/// Executes model-requested calls against the store.
pub struct ToolBridge<'a> {
    store: &'a dyn Store,
}

impl<'a> ToolBridge<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Runs one call. Tool-level failures become `ToolOutcome::Failure`;
    /// only arguments that cannot be read as a JSON object abort the request.
    pub async fn execute(&self, call: &FunctionCall) -> Result<ToolOutcome, AppError> {
        let args = coerce_arguments(&call.args)?;
        info!(tool = %call.name, args = %args, "Executing tool");

        match self.dispatch(&call.name, args).await {
            Ok(result) => Ok(ToolOutcome::Success(result)),
            Err(e) => {
                warn!(tool = %call.name, "Tool failed: {e}");
                Ok(ToolOutcome::Failure(e.to_string()))
            }
        }
    }

    async fn dispatch(&self, name: &str, args: Value) -> Result<Value, ToolError> {
        let store = self.store;
        match name {
            "get_all_applications" => {
                let rows = store.list_applications(&ApplicationFilter::default()).await?;
                Ok(serde_json::to_value(rows)?)
            }
            "search_applications" => {
                let args: SearchArgs = parse(args)?;
                let filter = ApplicationFilter {
                    country: args.country,
                    status: args.status,
                    search: non_blank(args.query),
                };
                Ok(serde_json::to_value(store.list_applications(&filter).await?)?)
            }
            "add_application" => {
                let args: AddApplicationArgs = parse(args)?;
                let new = CreateApplicationRequest {
                    university_name: args.university_name,
                    program_name: args.program_name,
                    country: args.country,
                    deadline: args.deadline,
                    status: None,
                    notes: args.notes,
                }
                .validate()?;
                let application = store.create_application(&new).await?;
                Ok(json!({ "success": true, "application": application }))
            }
            "update_application_status" => {
                let args: UpdateStatusArgs = parse(args)?;
                let patch = ApplicationPatch::status(args.status);
                Ok(match store.update_application(args.application_id, &patch).await? {
                    Some(application) => json!({ "success": true, "application": application }),
                    None => json!({ "success": false, "error": "Application not found" }),
                })
            }
            "update_documents" => {
                let args: UpdateDocumentsArgs = parse(args)?;
                if args.patch.is_empty() {
                    return Ok(json!({ "success": false, "error": "No updates provided" }));
                }
                Ok(
                    match store
                        .update_documents(args.application_id, &args.patch)
                        .await?
                    {
                        Some(documents) => json!({ "success": true, "documents": documents }),
                        None => json!({ "success": false, "error": "Application not found" }),
                    },
                )
            }
            "get_dashboard_summary" => Ok(serde_json::to_value(store.dashboard_summary().await?)?),
            "get_upcoming_deadlines" => {
                let args: UpcomingArgs = parse(args)?;
                Ok(serde_json::to_value(
                    store.upcoming_deadlines(args.days()).await?,
                )?)
            }
            "get_preparation_status" => {
                let items = store.list_preparation(None).await?;
                if items.is_empty() {
                    Ok(json!({ "message": NO_PREPARATION_MESSAGE }))
                } else {
                    Ok(serde_json::to_value(items)?)
                }
            }
            "add_preparation_item" => {
                let args: AddPrepArgs = parse(args)?;
                let new = CreatePreparationRequest {
                    kind: args.kind,
                    title: args.title,
                    target_date: args.target_date,
                    notes: args.notes,
                }
                .validate()?;
                let item = store.create_preparation(&new).await?;
                Ok(json!({ "success": true, "item": item }))
            }
            other => Ok(json!({ "error": format!("Unknown function: {other}") })),
        }
    }
}

fn parse<T: DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    Ok(serde_json::from_value(args)?)
}

/// Reads an integer from a JSON number (integral floats included) or a
/// numeric string.
fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn lenient_id<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    as_integer(&value)
        .and_then(|n| i32::try_from(n).ok())
        .ok_or_else(|| D::Error::custom(format!("expected an integer id, got {value}")))
}

/// Unreadable values count as absent so the tool falls back to its default.
fn lenient_optional_int<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(as_integer))
}

/// `YYYY-MM-DD`; blank strings count as absent.
fn optional_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    non_blank(raw)
        .map(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d"))
        .transpose()
        .map_err(|e| D::Error::custom(format!("invalid date: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::application::NewApplication;
    use crate::store::{ApplicationStore, MemoryStore, PreparationStore};
    use chrono::{Duration, Utc};

    fn call(name: &str, args: Value) -> FunctionCall {
        FunctionCall {
            name: name.to_string(),
            args,
        }
    }

    async fn seed(store: &MemoryStore, name: &str, country: Country, days_out: i64) -> i32 {
        store
            .create_application(&NewApplication {
                university_name: name.into(),
                program_name: "M.Sc. Data Science".into(),
                country,
                deadline: Utc::now().date_naive() + Duration::days(days_out),
                status: ApplicationStatus::NotStarted,
                notes: None,
            })
            .await
            .unwrap()
            .id
    }

    fn result_of(outcome: ToolOutcome) -> Value {
        match outcome {
            ToolOutcome::Success(v) => v,
            ToolOutcome::Failure(e) => panic!("tool failed: {e}"),
        }
    }

    #[test]
    fn declarations_cover_every_tool_with_enum_lists() {
        let decls = declarations();
        assert_eq!(decls.len(), 9);
        let search = decls
            .iter()
            .find(|d| d.name == "search_applications")
            .unwrap();
        let params = search.parameters.as_ref().unwrap();
        assert_eq!(
            params["properties"]["status"]["enum"],
            json!(["Not Started", "In Progress", "Submitted", "Interview", "Result"])
        );
        for zero_arg in ["get_all_applications", "get_dashboard_summary", "get_preparation_status"] {
            let decl = decls.iter().find(|d| d.name == zero_arg).unwrap();
            assert!(decl.parameters.is_none());
        }
    }

    #[tokio::test]
    async fn search_filters_by_query_and_country() {
        let store = MemoryStore::new();
        seed(&store, "ETH Zurich", Country::Switzerland, 40).await;
        seed(&store, "TU Munich", Country::Germany, 20).await;
        let bridge = ToolBridge::new(&store);

        let result = result_of(
            bridge
                .execute(&call(
                    "search_applications",
                    json!({"query": "munich", "country": "Germany"}),
                ))
                .await
                .unwrap(),
        );
        let rows = result.as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["university_name"], "TU Munich");
        assert_eq!(rows[0]["documents"]["sop"], false);
    }

    #[tokio::test]
    async fn status_update_accepts_float_and_string_ids() {
        let store = MemoryStore::new();
        let id = seed(&store, "EPFL", Country::Switzerland, 10).await;
        let bridge = ToolBridge::new(&store);

        for raw_id in [json!(id as f64), json!(id.to_string())] {
            let result = result_of(
                bridge
                    .execute(&call(
                        "update_application_status",
                        json!({"application_id": raw_id, "status": "Submitted"}),
                    ))
                    .await
                    .unwrap(),
            );
            assert_eq!(result["success"], true);
            assert_eq!(result["application"]["status"], "Submitted");
        }
    }

    #[tokio::test]
    async fn status_update_for_missing_application_reports_not_found() {
        let store = MemoryStore::new();
        let result = result_of(
            ToolBridge::new(&store)
                .execute(&call(
                    "update_application_status",
                    json!({"application_id": 99, "status": "Interview"}),
                ))
                .await
                .unwrap(),
        );
        assert_eq!(result, json!({"success": false, "error": "Application not found"}));
    }

    #[tokio::test]
    async fn invalid_status_is_a_tool_failure() {
        let store = MemoryStore::new();
        let outcome = ToolBridge::new(&store)
            .execute(&call(
                "update_application_status",
                json!({"application_id": 1, "status": "Accepted"}),
            ))
            .await
            .unwrap();
        assert!(matches!(outcome, ToolOutcome::Failure(msg) if msg.contains("invalid arguments")));
    }

    #[tokio::test]
    async fn documents_update_requires_at_least_one_flag() {
        let store = MemoryStore::new();
        let id = seed(&store, "RWTH Aachen", Country::Germany, 15).await;
        let bridge = ToolBridge::new(&store);

        let empty = result_of(
            bridge
                .execute(&call("update_documents", json!({"application_id": id})))
                .await
                .unwrap(),
        );
        assert_eq!(empty["error"], "No updates provided");

        let updated = result_of(
            bridge
                .execute(&call(
                    "update_documents",
                    json!({"application_id": id, "lors": true}),
                ))
                .await
                .unwrap(),
        );
        assert_eq!(updated["documents"]["lors"], true);
        assert_eq!(updated["documents"]["gre"], false);
    }

    #[tokio::test]
    async fn upcoming_deadlines_defaults_to_thirty_days() {
        let store = MemoryStore::new();
        seed(&store, "Soon", Country::Germany, 5).await;
        seed(&store, "Later", Country::Germany, 45).await;
        seed(&store, "Past", Country::Germany, -3).await;
        let bridge = ToolBridge::new(&store);

        let default_window = result_of(
            bridge
                .execute(&call("get_upcoming_deadlines", json!({})))
                .await
                .unwrap(),
        );
        assert_eq!(default_window.as_array().unwrap().len(), 1);

        let wide = result_of(
            bridge
                .execute(&call("get_upcoming_deadlines", json!({"days": "60"})))
                .await
                .unwrap(),
        );
        let names: Vec<_> = wide
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["university_name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["Soon", "Later"]);

        let nonsense = result_of(
            bridge
                .execute(&call("get_upcoming_deadlines", json!({"days": -4})))
                .await
                .unwrap(),
        );
        assert_eq!(nonsense.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn preparation_status_hints_when_empty() {
        let store = MemoryStore::new();
        let bridge = ToolBridge::new(&store);
        let empty = result_of(
            bridge
                .execute(&call("get_preparation_status", Value::Null))
                .await
                .unwrap(),
        );
        assert_eq!(empty["message"], NO_PREPARATION_MESSAGE);

        let added = result_of(
            bridge
                .execute(&call(
                    "add_preparation_item",
                    json!({"type": "gre", "title": "Full mock test", "target_date": ""}),
                ))
                .await
                .unwrap(),
        );
        assert_eq!(added["item"]["type"], "gre");
        assert!(added["item"]["target_date"].is_null());
        assert_eq!(store.list_preparation(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn add_application_validates_required_fields() {
        let store = MemoryStore::new();
        let outcome = ToolBridge::new(&store)
            .execute(&call(
                "add_application",
                json!({"university_name": "TU Berlin", "country": "Germany"}),
            ))
            .await
            .unwrap();
        assert_eq!(outcome, ToolOutcome::Failure("Missing required fields".into()));
        assert!(store
            .list_applications(&ApplicationFilter::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn string_encoded_arguments_are_unwrapped() {
        let store = MemoryStore::new();
        let id = seed(&store, "Uni Stuttgart", Country::Germany, 12).await;
        let result = result_of(
            ToolBridge::new(&store)
                .execute(&call(
                    "update_application_status",
                    json!(format!("{{\"application_id\": {id}, \"status\": \"In Progress\"}}")),
                ))
                .await
                .unwrap(),
        );
        assert_eq!(result["application"]["status"], "In Progress");
    }

    #[tokio::test]
    async fn unreadable_string_arguments_abort_the_request() {
        let store = MemoryStore::new();
        let result = ToolBridge::new(&store)
            .execute(&call("get_upcoming_deadlines", json!("days: soon")))
            .await;
        assert!(matches!(result, Err(AppError::Llm(_))));
    }

    #[tokio::test]
    async fn unknown_tool_is_reported_to_the_model() {
        let store = MemoryStore::new();
        let outcome = ToolBridge::new(&store)
            .execute(&call("delete_everything", json!({})))
            .await
            .unwrap();
        assert_eq!(
            outcome.into_response(),
            json!({"result": {"error": "Unknown function: delete_everything"}})
        );
    }

    #[tokio::test]
    async fn store_failures_become_error_responses() {
        let store = MemoryStore::new();
        store.set_failing(true);
        let outcome = ToolBridge::new(&store)
            .execute(&call("get_dashboard_summary", json!({})))
            .await
            .unwrap();
        let response = outcome.into_response();
        assert!(response["error"]
            .as_str()
            .unwrap()
            .starts_with("database error"));
    }
}
