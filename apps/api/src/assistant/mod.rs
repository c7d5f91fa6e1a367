//! The chat assistant: tool declarations and dispatch, the bounded
//! model/tool loop, session history, and research auto-fill.

pub mod autofill;
pub mod conversation;
pub mod prompts;
pub mod sessions;
pub mod tools;

pub use conversation::{Conversation, Reply};
