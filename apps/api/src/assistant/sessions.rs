//! Per-session conversation history for the chat assistant.
//!
//! Two backends: a bounded in-process LRU with idle expiry, and Redis with
//! a TTL per session key. Both cap the number of turns kept per session.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use redis::Client as RedisClient;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::Config;
use crate::errors::AppError;
use crate::models::chat::{ChatRole, ChatTurn};

const SESSION_KEY_PREFIX: &str = "chat:session:";
/// Keys requested per `SCAN` round trip when clearing.
const SCAN_BATCH: usize = 200;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("session serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        AppError::Internal(e.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    /// Sessions kept in memory before the least recently used is evicted.
    pub capacity: usize,
    /// Idle time after which a session is forgotten.
    pub ttl: Duration,
    /// Turns kept per session; older turns are dropped first.
    pub max_turns: usize,
}

impl SessionLimits {
    pub fn from_config(config: &Config) -> Self {
        Self {
            capacity: config.chat_session_capacity.max(1),
            ttl: config.chat_session_ttl,
            max_turns: config.chat_max_turns.max(2),
        }
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// History of the session, oldest first. Unknown or expired sessions are empty.
    async fn load(&self, session_id: &str) -> Result<Vec<ChatTurn>, SessionError>;

    async fn save(&self, session_id: &str, turns: Vec<ChatTurn>) -> Result<(), SessionError>;

    async fn remove(&self, session_id: &str) -> Result<(), SessionError>;

    /// Forgets every session.
    async fn clear(&self) -> Result<(), SessionError>;
}

/// Keeps the newest `max_turns` turns, starting on a user turn.
fn trim_history(mut turns: Vec<ChatTurn>, max_turns: usize) -> Vec<ChatTurn> {
    if turns.len() > max_turns {
        turns.drain(..turns.len() - max_turns);
    }
    let first_user = turns
        .iter()
        .position(|t| t.role == ChatRole::User)
        .unwrap_or(turns.len());
    turns.drain(..first_user);
    turns
}

struct SessionEntry {
    turns: Vec<ChatTurn>,
    touched: Instant,
}

pub struct MemorySessionStore {
    limits: SessionLimits,
    sessions: Mutex<HashMap<String, SessionEntry>>,
}

impl MemorySessionStore {
    pub fn new(limits: SessionLimits) -> Self {
        Self {
            limits,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn sessions(&self) -> std::sync::MutexGuard<'_, HashMap<String, SessionEntry>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.sessions().len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, session_id: &str) -> Result<Vec<ChatTurn>, SessionError> {
        let mut sessions = self.sessions();
        let now = Instant::now();
        let expired = match sessions.get_mut(session_id) {
            Some(entry) if now.duration_since(entry.touched) <= self.limits.ttl => {
                entry.touched = now;
                return Ok(entry.turns.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            debug!(session_id, "Chat session expired");
            sessions.remove(session_id);
        }
        Ok(Vec::new())
    }

    async fn save(&self, session_id: &str, turns: Vec<ChatTurn>) -> Result<(), SessionError> {
        let mut sessions = self.sessions();
        let now = Instant::now();
        let ttl = self.limits.ttl;
        sessions.retain(|_, entry| now.duration_since(entry.touched) <= ttl);

        if !sessions.contains_key(session_id) && sessions.len() >= self.limits.capacity {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, entry)| entry.touched)
                .map(|(id, _)| id.clone());
            if let Some(oldest) = oldest {
                debug!(session_id = %oldest, "Evicting least recently used chat session");
                sessions.remove(&oldest);
            }
        }

        sessions.insert(
            session_id.to_string(),
            SessionEntry {
                turns: trim_history(turns, self.limits.max_turns),
                touched: now,
            },
        );
        Ok(())
    }

    async fn remove(&self, session_id: &str) -> Result<(), SessionError> {
        self.sessions().remove(session_id);
        Ok(())
    }

    async fn clear(&self) -> Result<(), SessionError> {
        self.sessions().clear();
        Ok(())
    }
}

/// Stores each session as a JSON array under `chat:session:{id}` with an
/// expiry. Nothing else is written, so expired sessions leave no residue;
/// `clear` finds live sessions by scanning the key prefix.
pub struct RedisSessionStore {
    client: RedisClient,
    limits: SessionLimits,
}

impl RedisSessionStore {
    pub fn new(redis_url: &str, limits: SessionLimits) -> Result<Self, SessionError> {
        Ok(Self {
            client: RedisClient::open(redis_url)?,
            limits,
        })
    }

    fn session_key(session_id: &str) -> String {
        format!("{SESSION_KEY_PREFIX}{session_id}")
    }

    fn session_pattern() -> String {
        format!("{SESSION_KEY_PREFIX}*")
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn load(&self, session_id: &str) -> Result<Vec<ChatTurn>, SessionError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let raw: Option<String> = redis::cmd("GET")
            .arg(Self::session_key(session_id))
            .query_async(&mut conn)
            .await?;

        Ok(match raw {
            Some(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                warn!(session_id, "Discarding unreadable chat session: {e}");
                Vec::new()
            }),
            None => Vec::new(),
        })
    }

    async fn save(&self, session_id: &str, turns: Vec<ChatTurn>) -> Result<(), SessionError> {
        let json = serde_json::to_string(&trim_history(turns, self.limits.max_turns))?;
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("SET")
            .arg(Self::session_key(session_id))
            .arg(json)
            .arg("EX")
            .arg(self.limits.ttl.as_secs().max(1))
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn remove(&self, session_id: &str) -> Result<(), SessionError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("DEL")
            .arg(Self::session_key(session_id))
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), SessionError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let pattern = Self::session_pattern();
        let mut cursor: u64 = 0;
        let mut removed: usize = 0;
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;
            if !keys.is_empty() {
                removed += redis::cmd("DEL")
                    .arg(&keys)
                    .query_async::<_, usize>(&mut conn)
                    .await?;
            }
            if next == 0 {
                break;
            }
            cursor = next;
        }

        debug!(count = removed, "Cleared chat sessions");
        Ok(())
    }
}
