//! In-memory conversation history, bounded per session.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    fn label(self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    pub role: Role,
    pub content: String,
    pub at: DateTime<Utc>,
}

type SessionLog = Arc<Mutex<VecDeque<Exchange>>>;

/// Session histories keyed by id. Each session keeps at most `capacity`
/// entries, dropping the oldest first.
///
/// The outer lock only guards the map; appends lock the individual session,
/// so requests on different sessions never wait on each other.
pub struct SessionStore {
    capacity: usize,
    sessions: RwLock<HashMap<String, SessionLog>>,
}

impl SessionStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub async fn create_session(&self) -> String {
        let id = Uuid::new_v4().to_string();
        self.sessions
            .write()
            .await
            .insert(id.clone(), Arc::new(Mutex::new(VecDeque::new())));
        tracing::debug!("Created session {}", id);
        id
    }

    async fn existing(&self, id: &str) -> Option<SessionLog> {
        self.sessions.read().await.get(id).cloned()
    }

    async fn get_or_insert(&self, id: &str) -> SessionLog {
        if let Some(log) = self.existing(id).await {
            return log;
        }
        self.sessions
            .write()
            .await
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(VecDeque::new())))
            .clone()
    }

    /// History in insertion order. Unknown ids have an empty history.
    pub async fn get_history(&self, id: &str) -> Vec<Exchange> {
        match self.existing(id).await {
            Some(log) => log.lock().await.iter().cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Appends one entry, creating the session if it is unknown.
    pub async fn append(&self, id: &str, role: Role, content: impl Into<String>) {
        let log = self.get_or_insert(id).await;
        let mut entries = log.lock().await;
        self.push_bounded(&mut entries, role, content.into());
    }

    /// Appends a question and its answer under a single lock.
    pub async fn add_exchange(
        &self,
        id: &str,
        user: impl Into<String>,
        assistant: impl Into<String>,
    ) {
        let log = self.get_or_insert(id).await;
        let mut entries = log.lock().await;
        self.push_bounded(&mut entries, Role::User, user.into());
        self.push_bounded(&mut entries, Role::Assistant, assistant.into());
    }

    fn push_bounded(&self, entries: &mut VecDeque<Exchange>, role: Role, content: String) {
        entries.push_back(Exchange {
            role,
            content,
            at: Utc::now(),
        });
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    /// `User: ...` / `Assistant: ...` lines, or `None` when there is nothing
    /// to show.
    pub async fn format_history(&self, id: &str) -> Option<String> {
        let history = self.get_history(id).await;
        if history.is_empty() {
            return None;
        }
        Some(
            history
                .iter()
                .map(|entry| format!("{}: {}", entry.role.label(), entry.content))
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }

    /// Forgets a session. Returns whether it existed.
    pub async fn clear(&self, id: &str) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
