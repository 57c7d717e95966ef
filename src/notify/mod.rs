//! Outbound participant notifications.
//!
//! The engine only decides that a message should go out and what it says.
//! Delivery is best-effort: a [`Notifier`] error is logged by the caller and
//! never turns into an operation failure.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;

pub mod circuit_breaker;
pub mod mailer;
pub mod queue;
pub mod templates;

pub use mailer::{LogMailer, SendGridMailer};
pub use queue::{NotificationQueue, QueueWorker};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub recipient: String,
    pub subject: String,
    pub body: String,
    /// Deliver at this instant instead of immediately.
    pub send_at: Option<DateTime<Utc>>,
}

impl Notification {
    pub fn immediate(recipient: impl Into<String>, subject: String, body: String) -> Self {
        Self { recipient: recipient.into(), subject, body, send_at: None }
    }

    pub fn scheduled(recipient: impl Into<String>, subject: String, body: String, at: DateTime<Utc>) -> Self {
        Self { recipient: recipient.into(), subject, body, send_at: Some(at) }
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("mail gateway temporarily unavailable (circuit open)")]
    CircuitOpen,

    #[error("mail gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("mail gateway rejected message with status {status}")]
    Rejected { status: u16 },

    #[error("notification queue is closed")]
    QueueClosed,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: Notification) -> Result<(), NotifyError>;

    /// How far ahead of `send_at` the sink accepts a scheduled message.
    /// `None` means any delivery time is accepted.
    fn schedule_horizon(&self) -> Option<Duration> {
        None
    }
}
