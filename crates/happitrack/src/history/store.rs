use async_trait::async_trait;

use super::domain::{LogEntry, NewUser, User, UserId};
use super::summary::average_score;
use crate::mood::Score;

/// Append-only score history keyed by user.
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Persists a new entry stamped with the current time.
    async fn append(&self, user_id: UserId, score: Score) -> Result<LogEntry, StoreError>;

    /// Entries for `user_id`, oldest first.
    async fn list(&self, user_id: UserId) -> Result<Vec<LogEntry>, StoreError>;

    async fn average(&self, user_id: UserId) -> Result<f64, StoreError> {
        let entries = self.list(user_id).await?;
        Ok(average_score(&entries))
    }
}

/// User records owning the score history.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError>;
    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError>;
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;
    /// Removes the user together with every log entry they own.
    async fn delete_user(&self, id: UserId) -> Result<(), StoreError>;
}

/// Everything the mood service needs from persistence.
pub trait HistoryStore: LogStore + UserDirectory {}

impl<T> HistoryStore for T where T: LogStore + UserDirectory {}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists: {0}")]
    Conflict(String),
    #[error("user {0} not found")]
    UnknownUser(UserId),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
