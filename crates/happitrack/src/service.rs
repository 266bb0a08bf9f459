use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::history::{
    export_csv, ExportError, HistoryStore, HistorySummary, LogEntry, NewUser, Role, StoreError,
    User, UserId,
};
use crate::mood::{self, AnswerSet, Score};
use crate::notify::{SummaryEmail, SummaryNotifier};

/// Result of one check-in, rendered back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckInOutcome {
    pub score: Score,
    pub tip: &'static str,
    pub logged: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntryView {
    pub date: String,
    pub score: Score,
    pub recorded_at: chrono::DateTime<chrono::Utc>,
}

impl From<&LogEntry> for HistoryEntryView {
    fn from(entry: &LogEntry) -> Self {
        Self {
            date: entry.date().format("%Y-%m-%d").to_string(),
            score: entry.score,
            recorded_at: entry.recorded_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryView {
    pub entries: Vec<HistoryEntryView>,
    pub summary: HistorySummary,
}

/// Composes scoring, the history store, and the summary notifier.
pub struct MoodService<S, N> {
    store: Arc<S>,
    notifier: Arc<N>,
}

impl<S, N> MoodService<S, N>
where
    S: HistoryStore + 'static,
    N: SummaryNotifier + 'static,
{
    pub fn new(store: Arc<S>, notifier: Arc<N>) -> Self {
        Self { store, notifier }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Resolves a caller id supplied by the identity layer.
    pub async fn identify(&self, id: UserId) -> Result<User, ServiceError> {
        self.store
            .find_user(id)
            .await?
            .ok_or(ServiceError::UnknownCaller(id))
    }

    /// Scores the answers and, when asked and the caller is known, logs the score.
    pub async fn check_in(
        &self,
        caller: Option<&User>,
        answers: &AnswerSet,
        log: bool,
    ) -> Result<CheckInOutcome, ServiceError> {
        let score = mood::score(answers);
        let tip = mood::tip(score);

        let logged = match (log, caller) {
            (true, Some(user)) => {
                self.store.append(user.id, score).await?;
                true
            }
            _ => false,
        };

        info!(%score, logged, "check-in scored");
        Ok(CheckInOutcome { score, tip, logged })
    }

    pub async fn check_in_form(
        &self,
        caller: Option<&User>,
        form: &HashMap<String, String>,
    ) -> Result<CheckInOutcome, ServiceError> {
        let log = form.get("log").is_some_and(|value| is_checked(value));
        self.check_in(caller, &AnswerSet::from_form(form), log).await
    }

    pub async fn history(&self, user: &User) -> Result<HistoryView, ServiceError> {
        let entries = self.store.list(user.id).await?;
        Ok(HistoryView {
            entries: entries.iter().map(HistoryEntryView::from).collect(),
            summary: HistorySummary::from_entries(&entries),
        })
    }

    pub async fn export(&self, user: &User) -> Result<Vec<u8>, ServiceError> {
        let entries = self.store.list(user.id).await?;
        Ok(export_csv(&entries)?)
    }

    /// Queues a summary email with the user's average score. Delivery runs on
    /// a detached task and its failures are only logged. Returns `None` when
    /// mail is not configured.
    pub async fn send_summary(&self, user: &User) -> Result<Option<JoinHandle<()>>, ServiceError> {
        let Some(sender) = self.notifier.sender() else {
            info!(user_id = %user.id, "mail not configured; summary skipped");
            return Ok(None);
        };

        let average = self.store.average(user.id).await?;
        let email = SummaryEmail::weekly(sender, &user.email, average);
        let notifier = Arc::clone(&self.notifier);
        let user_id = user.id;

        let handle = tokio::task::spawn_blocking(move || {
            if let Err(err) = notifier.send(email) {
                warn!(%user_id, error = %err, "summary email failed");
            }
        });
        Ok(Some(handle))
    }

    pub async fn users(&self, admin: &User) -> Result<Vec<User>, ServiceError> {
        require_admin(admin)?;
        Ok(self.store.list_users().await?)
    }

    pub async fn create_user(&self, admin: &User, user: NewUser) -> Result<User, ServiceError> {
        require_admin(admin)?;
        let created = self.store.create_user(user).await?;
        info!(user_id = %created.id, role = created.role.label(), "user provisioned");
        Ok(created)
    }

    /// Deletes a user and, with them, their whole score history.
    pub async fn remove_user(&self, admin: &User, target: UserId) -> Result<(), ServiceError> {
        require_admin(admin)?;
        self.store.delete_user(target).await?;
        info!(user_id = %target, "user and history removed");
        Ok(())
    }

    /// Creates the `admin` account when it does not exist yet.
    pub async fn seed_admin(&self, email: &str) -> Result<User, ServiceError> {
        if let Some(existing) = self.store.find_by_username("admin").await? {
            return Ok(existing);
        }
        let admin = self
            .store
            .create_user(NewUser {
                username: "admin".to_string(),
                email: email.to_string(),
                role: Role::Admin,
            })
            .await?;
        info!(user_id = %admin.id, "admin account seeded");
        Ok(admin)
    }
}

fn require_admin(user: &User) -> Result<(), ServiceError> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(user.id))
    }
}

/// HTML checkbox semantics plus the usual boolean spellings.
pub fn is_checked(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "on" | "true" | "1" | "yes"
    )
}

/// Error raised by the mood service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("caller {0} is not a registered user")]
    UnknownCaller(UserId),
    #[error("user {0} is not allowed to manage accounts")]
    Forbidden(UserId),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Export(#[from] ExportError),
}
