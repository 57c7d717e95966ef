use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::circuit_breaker::{CircuitBreaker, CircuitState};
use super::{Notification, Notifier, NotifyError};
use crate::config::{CircuitBreakerConfig, MailConfig};

// SendGrid принимает send_at не дальше 72 часов вперёд
const SEND_AT_HORIZON_HOURS: i64 = 72;
const SEND_AT_SLACK_HOURS: i64 = 1;

// --- SendGrid v3 mail/send payload ---

#[derive(Debug, Serialize)]
struct Address<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct Personalization<'a> {
    to: Vec<Address<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(rename = "type")]
    content_type: &'a str,
    value: &'a str,
}

#[derive(Debug, Serialize)]
struct MailSendRequest<'a> {
    personalizations: Vec<Personalization<'a>>,
    from: Address<'a>,
    subject: &'a str,
    content: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    send_at: Option<i64>,
}

/// Delivers notifications through the SendGrid HTTP API. Scheduled
/// reminders are handed to SendGrid via `send_at`; anything further out than
/// [`Notifier::schedule_horizon`] must be held by the caller until it fits.
pub struct SendGridMailer {
    api_key: String,
    from_email: String,
    base_url: String,
    http_client: reqwest::Client,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl SendGridMailer {
    pub fn from_config(mail: &MailConfig, breaker: &CircuitBreakerConfig) -> Result<Self, NotifyError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            api_key: mail.api_key.clone(),
            from_email: mail.from_email.clone(),
            base_url: mail.gateway_url.trim_end_matches('/').to_string(),
            http_client,
            circuit_breaker: Arc::new(CircuitBreaker::new(
                breaker.failure_threshold,
                Duration::from_secs(breaker.timeout_seconds),
            )),
        })
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.state()
    }

    async fn post(&self, notification: &Notification) -> Result<(), NotifyError> {
        let request = MailSendRequest {
            personalizations: vec![Personalization { to: vec![Address { email: &notification.recipient }] }],
            from: Address { email: &self.from_email },
            subject: &notification.subject,
            content: vec![Content { content_type: "text/html", value: &notification.body }],
            send_at: notification.send_at.map(|at| at.timestamp()),
        };

        let response = self
            .http_client
            .post(format!("{}/mail/send", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(NotifyError::Rejected { status: status.as_u16() })
        }
    }
}

#[async_trait]
impl Notifier for SendGridMailer {
    async fn send(&self, notification: Notification) -> Result<(), NotifyError> {
        if !self.circuit_breaker.can_execute() {
            return Err(NotifyError::CircuitOpen);
        }

        match self.post(&notification).await {
            Ok(()) => {
                self.circuit_breaker.record_success();
                info!(
                    "[SendGrid] Email accepted → {} ({}){}",
                    notification.recipient,
                    notification.subject,
                    notification
                        .send_at
                        .map(|at| format!(", scheduled for {}", at))
                        .unwrap_or_default()
                );
                Ok(())
            }
            Err(e) => {
                // 4xx - это ошибка запроса, а не недоступность шлюза
                let gateway_fault = match &e {
                    NotifyError::Rejected { status } => *status >= 500 || *status == 429,
                    _ => true,
                };
                if gateway_fault {
                    self.circuit_breaker.record_failure();
                }
                Err(e)
            }
        }
    }

    fn schedule_horizon(&self) -> Option<chrono::Duration> {
        Some(chrono::Duration::hours(SEND_AT_HORIZON_HOURS - SEND_AT_SLACK_HOURS))
    }
}

/// Sink for environments without mail credentials: only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Notifier for LogMailer {
    async fn send(&self, notification: Notification) -> Result<(), NotifyError> {
        info!(
            recipient = %notification.recipient,
            subject = %notification.subject,
            send_at = ?notification.send_at,
            "mail delivery disabled, notification logged only"
        );
        Ok(())
    }
}
