//! Transactional email.
//!
//! Senders implement [`Mailer`]. [`MailDispatcher`] runs a send on its own
//! task for callers that must not wait on delivery.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::utils::error::AppError;

pub mod smtp;
pub mod templates;

pub use smtp::SmtpMailer;
pub use templates::MailTemplate;

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_template(
        &self,
        to: &str,
        subject: &str,
        template: MailTemplate,
    ) -> Result<(), AppError>;
}

/// Logs mail instead of sending it. Used when no SMTP host is configured.
#[derive(Debug, Clone, Default)]
pub struct ConsoleMailer;

#[async_trait]
impl Mailer for ConsoleMailer {
    async fn send_template(
        &self,
        to: &str,
        subject: &str,
        template: MailTemplate,
    ) -> Result<(), AppError> {
        tracing::info!(
            to,
            subject,
            template = template.name(),
            variables = %serde_json::to_string(&template).unwrap_or_default(),
            "Mail not sent (console mailer)"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub template: MailTemplate,
}

/// Keeps every message in memory. Can be told to fail every send.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentMail>>,
    fail: bool,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            sent: Mutex::default(),
            fail: true,
        }
    }

    pub async fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_template(
        &self,
        to: &str,
        subject: &str,
        template: MailTemplate,
    ) -> Result<(), AppError> {
        if self.fail {
            return Err(AppError::ExternalServiceError("smtp unavailable".to_string()));
        }
        self.sent.lock().await.push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            template,
        });
        Ok(())
    }
}

/// Fire-and-forget delivery. There is no ordering guarantee between the
/// spawned send and whatever the caller does next; failures are logged.
#[derive(Clone)]
pub struct MailDispatcher {
    mailer: Arc<dyn Mailer>,
}

impl MailDispatcher {
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }

    /// Spawns the send. The handle is only for callers that want to observe
    /// completion; dropping it does not cancel the task.
    pub fn dispatch(&self, to: String, subject: String, template: MailTemplate) -> JoinHandle<()> {
        let mailer = Arc::clone(&self.mailer);
        tokio::spawn(async move {
            let name = template.name();
            match mailer.send_template(&to, &subject, template).await {
                Ok(()) => tracing::info!(to = %to, template = name, "Mail sent"),
                Err(e) => tracing::warn!(to = %to, template = name, error = %e, "Mail delivery failed"),
            }
        })
    }
}
