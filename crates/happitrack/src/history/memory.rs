use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use super::domain::{LogEntry, NewUser, User, UserId};
use super::store::{LogStore, StoreError, UserDirectory};
use crate::mood::Score;

#[derive(Debug, Default)]
struct MemoryState {
    users: BTreeMap<UserId, User>,
    entries: Vec<LogEntry>,
    next_user_id: i64,
    next_entry_id: i64,
}

/// Process-local store used by tests and the `--in-memory` server mode.
#[derive(Debug, Default, Clone)]
pub struct MemoryHistoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("history mutex poisoned".to_string()))
    }
}

#[async_trait]
impl LogStore for MemoryHistoryStore {
    async fn append(&self, user_id: UserId, score: Score) -> Result<LogEntry, StoreError> {
        let mut guard = self.lock()?;
        if !guard.users.contains_key(&user_id) {
            return Err(StoreError::UnknownUser(user_id));
        }
        guard.next_entry_id += 1;
        let entry = LogEntry {
            id: guard.next_entry_id,
            user_id,
            score,
            recorded_at: Utc::now(),
        };
        guard.entries.push(entry.clone());
        Ok(entry)
    }

    async fn list(&self, user_id: UserId) -> Result<Vec<LogEntry>, StoreError> {
        let guard = self.lock()?;
        let mut entries: Vec<LogEntry> = guard
            .entries
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .cloned()
            .collect();
        // stable: equal timestamps keep insertion order
        entries.sort_by_key(|entry| entry.recorded_at);
        Ok(entries)
    }
}

#[async_trait]
impl UserDirectory for MemoryHistoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut guard = self.lock()?;
        if let Some(existing) = guard
            .users
            .values()
            .find(|existing| existing.username == user.username || existing.email == user.email)
        {
            return Err(StoreError::Conflict(format!(
                "user '{}' already registered",
                existing.username
            )));
        }

        guard.next_user_id += 1;
        let record = User {
            id: UserId(guard.next_user_id),
            username: user.username,
            email: user.email,
            role: user.role,
            created_at: Utc::now(),
        };
        guard.users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .lock()?
            .users
            .values()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.lock()?.users.values().cloned().collect())
    }

    async fn delete_user(&self, id: UserId) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        if guard.users.remove(&id).is_none() {
            return Err(StoreError::UnknownUser(id));
        }
        guard.entries.retain(|entry| entry.user_id != id);
        Ok(())
    }
}
