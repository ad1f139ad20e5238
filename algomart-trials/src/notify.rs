//! Outbound notification seam.
//!
//! Message rendering and transport live elsewhere; the engine only decides
//! *when* to notify and hands over a template id plus context. Send failures
//! are never fatal to lifecycle state — the caller decides whether a failed
//! send is retried (reminders) or dropped (the welcome message).

use algomart_types::UserId;
use async_trait::async_trait;
use thiserror::Error;

/// Result type for notification sends.
pub type NotifyResult<T> = Result<T, NotifyError>;

/// Errors from the notification collaborator.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The send was attempted and failed.
    #[error("notification send failed: {0}")]
    Send(String),

    /// The gateway could not be reached.
    #[error("notification gateway unavailable")]
    Unavailable,
}

/// Transactional message templates the engine dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationTemplate {
    /// Welcome message confirming a started trial. Attempted at most once.
    TrialStarted,
    /// Days-remaining reminder. Retried until recorded as sent.
    TrialReminder,
}

impl NotificationTemplate {
    /// Stable template identifier understood by the messaging service.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TrialStarted => "trial_started",
            Self::TrialReminder => "trial_reminder",
        }
    }
}

/// Sends transactional messages to users.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    /// Sends one message. `context` carries template variables.
    async fn send(
        &self,
        user_id: &UserId,
        template: NotificationTemplate,
        context: &serde_json::Value,
    ) -> NotifyResult<()>;
}

/// Gateway that silently drops every message, for hosts running with
/// notifications disabled.
pub struct NullGateway;

#[async_trait]
impl NotificationGateway for NullGateway {
    async fn send(
        &self,
        _user_id: &UserId,
        _template: NotificationTemplate,
        _context: &serde_json::Value,
    ) -> NotifyResult<()> {
        Ok(())
    }
}
