//! Summary notifications sent after a user asks for their history digest.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use serde::Serialize;
use tracing::info;

use crate::config::MailConfig;

pub const SUMMARY_SUBJECT: &str = "Your Weekly Happiness Summary";

const SMTP_TIMEOUT: Duration = Duration::from_secs(10);

/// One outbound summary message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryEmail {
    pub sender: String,
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

impl SummaryEmail {
    pub fn weekly(sender: &str, recipient: &str, average: f64) -> Self {
        Self {
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            subject: SUMMARY_SUBJECT.to_string(),
            body: format!("Your avg score: {average:.1}. Keep shining!"),
        }
    }
}

/// Outbound mail hook. Implementations may block; the service calls them
/// from a detached task.
pub trait SummaryNotifier: Send + Sync {
    /// Sender address, or `None` when summaries are switched off.
    fn sender(&self) -> Option<&str>;

    fn send(&self, email: SummaryEmail) -> Result<(), NotifyError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("mail transport unavailable: {0}")]
    Transport(String),
}

/// Delivers summaries over SMTP using the `MAIL_*` settings.
#[derive(Debug, Clone)]
pub struct SmtpMailer {
    config: MailConfig,
}

impl SmtpMailer {
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }

    fn transport(&self) -> Result<SmtpTransport, NotifyError> {
        let server = self.config.server.trim();
        if server.is_empty() {
            return Err(NotifyError::Transport("MAIL_SERVER is empty".to_string()));
        }

        let mut builder = if self.config.use_tls {
            SmtpTransport::starttls_relay(server).map_err(transport_error)?
        } else {
            SmtpTransport::builder_dangerous(server)
        };
        builder = builder.port(self.config.port).timeout(Some(SMTP_TIMEOUT));

        if let Some(username) = &self.config.username {
            let password = self.config.password.clone().unwrap_or_default();
            builder = builder.credentials(Credentials::new(username.clone(), password));
        }

        Ok(builder.build())
    }
}

fn transport_error(err: impl std::fmt::Display) -> NotifyError {
    NotifyError::Transport(err.to_string())
}

fn mailbox(address: &str) -> Result<Mailbox, NotifyError> {
    address
        .parse::<Mailbox>()
        .map_err(|err| NotifyError::Transport(format!("invalid address '{address}': {err}")))
}

impl SummaryNotifier for SmtpMailer {
    fn sender(&self) -> Option<&str> {
        self.config.username.as_deref()
    }

    fn send(&self, email: SummaryEmail) -> Result<(), NotifyError> {
        let message = Message::builder()
            .from(mailbox(&email.sender)?)
            .to(mailbox(&email.recipient)?)
            .subject(email.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(email.body.clone())
            .map_err(transport_error)?;

        self.transport()?.send(&message).map_err(transport_error)?;

        info!(
            server = %self.config.server,
            port = self.config.port,
            to = %email.recipient,
            subject = %email.subject,
            "summary email sent"
        );
        Ok(())
    }
}

/// Keeps sent summaries in memory; used in tests and local runs.
#[derive(Debug, Default, Clone)]
pub struct MemoryOutbox {
    sender: Option<String>,
    sent: Arc<Mutex<Vec<SummaryEmail>>>,
}

impl MemoryOutbox {
    pub fn with_sender(sender: impl Into<String>) -> Self {
        Self {
            sender: Some(sender.into()),
            sent: Arc::default(),
        }
    }

    /// Outbox that reports mail as unconfigured.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SummaryEmail> {
        self.sent
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl SummaryNotifier for MemoryOutbox {
    fn sender(&self) -> Option<&str> {
        self.sender.as_deref()
    }

    fn send(&self, email: SummaryEmail) -> Result<(), NotifyError> {
        let mut guard = self
            .sent
            .lock()
            .map_err(|_| NotifyError::Transport("outbox mutex poisoned".to_string()))?;
        guard.push(email);
        Ok(())
    }
}
