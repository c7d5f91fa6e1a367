use tracing::{debug, warn};

use crate::assistant::prompts::{ASSISTANT_SYSTEM, EMPTY_REPLY_FALLBACK, TOOL_LIMIT_FALLBACK};
use crate::assistant::tools::{tool_set, ToolBridge};
use crate::errors::AppError;
use crate::llm_client::{ChatModel, Content, GenerateRequest, GenerateResponse, Part};
use crate::models::chat::{ChatRole, ChatTurn};
use crate::store::Store;

/// Outcome of one user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub message: String,
    /// Function calls executed while producing the reply.
    pub tool_calls: usize,
    /// The model was still requesting tools when the round limit was hit.
    pub truncated: bool,
}

/// Drives the model through tool calls until it answers in text, or until
/// `max_tool_rounds` rounds of tool execution have been spent.
pub struct Conversation<'a> {
    model: &'a dyn ChatModel,
    tools: ToolBridge<'a>,
    max_tool_rounds: usize,
}

impl<'a> Conversation<'a> {
    pub fn new(model: &'a dyn ChatModel, store: &'a dyn Store, max_tool_rounds: usize) -> Self {
        Self {
            model,
            tools: ToolBridge::new(store),
            max_tool_rounds,
        }
    }

    pub async fn respond(&self, history: &[ChatTurn], user_message: &str) -> Result<Reply, AppError> {
        let mut contents: Vec<Content> = history.iter().map(turn_content).collect();
        contents.push(Content::user_text(user_message));

        let mut request = GenerateRequest {
            system_instruction: Some(Content::system(ASSISTANT_SYSTEM)),
            contents,
            tools: vec![tool_set()],
        };

        let mut response = self.model.generate(&request).await?;
        let mut rounds = 0;
        let mut tool_calls = 0;

        loop {
            let calls = response.function_calls();
            if calls.is_empty() {
                return Ok(Reply {
                    message: reply_text(&response).unwrap_or_else(|| EMPTY_REPLY_FALLBACK.to_string()),
                    tool_calls,
                    truncated: false,
                });
            }

            if rounds >= self.max_tool_rounds {
                warn!(
                    rounds,
                    pending_calls = calls.len(),
                    "Tool round limit reached; returning truncated reply"
                );
                return Ok(Reply {
                    message: reply_text(&response).unwrap_or_else(|| TOOL_LIMIT_FALLBACK.to_string()),
                    tool_calls,
                    truncated: true,
                });
            }
            rounds += 1;

            let mut responses = Vec::with_capacity(calls.len());
            for call in &calls {
                let outcome = self.tools.execute(call).await?;
                responses.push(Part::function_response(call.name.clone(), outcome.into_response()));
                tool_calls += 1;
            }
            debug!(round = rounds, calls = calls.len(), "Returning tool results to the model");

            let mut model_turn = response
                .first_content()
                .cloned()
                .unwrap_or_else(|| Content::model(calls.into_iter().map(Part::function_call).collect()));
            model_turn.role = Some("model".to_string());
            request.contents.push(model_turn);
            request.contents.push(Content::user(responses));

            response = self.model.generate(&request).await?;
        }
    }
}

fn turn_content(turn: &ChatTurn) -> Content {
    match turn.role {
        ChatRole::User => Content::user_text(turn.content.clone()),
        ChatRole::Assistant => Content::model_text(turn.content.clone()),
    }
}

fn reply_text(response: &GenerateResponse) -> Option<String> {
    response.text().filter(|t| !t.trim().is_empty())
}
