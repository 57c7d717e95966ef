pub mod clock;
pub mod config;
pub mod controllers;
pub mod engine;
pub mod error;
pub mod middleware;
pub mod models;
pub mod notify;
pub mod store;

use std::sync::Arc;
use tokio::sync::Mutex;

use clock::{Clock, SystemClock};
use engine::Engine;
use notify::{LogMailer, NotificationQueue, Notifier, QueueWorker, SendGridMailer};
use store::PgStore;

// Shared state для всего приложения
pub struct AppState {
    pub engine: Engine<PgStore>,
    pub config: config::Config,
    notify_worker: Mutex<Option<QueueWorker>>,
}

impl AppState {
    /// Connect to Postgres, run migrations and start the notification worker.
    pub async fn new(config: config::Config) -> Result<Arc<Self>, Box<dyn std::error::Error + Send + Sync>> {
        let store = PgStore::connect(
            &config.database.url,
            config.database.pool_size,
            config.database.lock_timeout_ms,
        )
        .await?;
        store.migrate().await?;

        let sink: Arc<dyn Notifier> = match &config.mail {
            Some(mail) => Arc::new(SendGridMailer::from_config(mail, &config.circuit_breaker)?),
            None => {
                tracing::warn!("SENDGRID_API_KEY/FROM_EMAIL not set, notifications will only be logged");
                Arc::new(LogMailer)
            }
        };

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let (queue, worker) = NotificationQueue::start(sink, clock.clone(), &config.notify);

        let engine = Engine::new(store, clock, Arc::new(queue), config.engine.clone());

        Ok(Arc::new(Self { engine, config, notify_worker: Mutex::new(Some(worker)) }))
    }

    /// Flush queued notifications. Called once the server has stopped.
    pub async fn shutdown(&self) {
        if let Some(worker) = self.notify_worker.lock().await.take() {
            worker.shutdown().await;
        }
    }
}
