use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use super::{Notification, Notifier, NotifyError};
use crate::clock::Clock;
use crate::config::NotifyConfig;

/// Front of a delivery sink. `send` only enqueues (waiting while the buffer
/// is full); a background worker delivers with bounded concurrency.
///
/// Scheduled messages the sink cannot accept yet (see
/// [`Notifier::schedule_horizon`]) are held by the worker and submitted once
/// their delivery time is inside the sink's window.
#[derive(Clone)]
pub struct NotificationQueue {
    tx: mpsc::Sender<Notification>,
}

/// Handle to the delivery worker, used to drain it on shutdown.
pub struct QueueWorker {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl QueueWorker {
    /// Stop accepting messages, deliver everything already queued and wait
    /// for in-flight sends. Held reminders are dropped with a warning.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.handle.await {
            error!("notification worker terminated abnormally: {}", e);
        }
    }
}

impl NotificationQueue {
    pub fn start(sink: Arc<dyn Notifier>, clock: Arc<dyn Clock>, config: &NotifyConfig) -> (Self, QueueWorker) {
        let concurrency = config.concurrency.max(1);
        let (tx, rx) = mpsc::channel::<Notification>(config.queue_capacity.max(1));
        let (shutdown, shutdown_rx) = oneshot::channel();

        let worker = Worker {
            sink,
            clock,
            concurrency,
            permits: Arc::new(Semaphore::new(concurrency)),
            in_flight: JoinSet::new(),
            held: JoinSet::new(),
        };
        let handle = tokio::spawn(worker.run(rx, shutdown_rx));

        (Self { tx }, QueueWorker { shutdown, handle })
    }
}

#[async_trait]
impl Notifier for NotificationQueue {
    async fn send(&self, notification: Notification) -> Result<(), NotifyError> {
        self.tx.send(notification).await.map_err(|_| NotifyError::QueueClosed)
    }
}

struct Worker {
    sink: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    concurrency: usize,
    permits: Arc<Semaphore>,
    in_flight: JoinSet<()>,
    held: JoinSet<()>,
}

impl Worker {
    async fn run(mut self, mut rx: mpsc::Receiver<Notification>, mut shutdown: oneshot::Receiver<()>) {
        info!("Notification worker started (concurrency {})", self.concurrency);

        loop {
            tokio::select! {
                received = rx.recv(), if self.in_flight.len() < self.concurrency => match received {
                    Some(notification) => self.route(notification),
                    None => break,
                },
                _ = &mut shutdown => {
                    rx.close();
                    while let Some(notification) = rx.recv().await {
                        self.route(notification);
                    }
                    break;
                }
                Some(_) = self.in_flight.join_next(), if !self.in_flight.is_empty() => {}
                Some(_) = self.held.join_next(), if !self.held.is_empty() => {}
            }
        }

        while self.in_flight.join_next().await.is_some() {}
        if !self.held.is_empty() {
            warn!(
                "{} scheduled notification(s) were still held at shutdown and are dropped",
                self.held.len()
            );
            self.held.shutdown().await;
        }
        info!("Notification worker stopped");
    }

    fn route(&mut self, notification: Notification) {
        let sink = self.sink.clone();
        let permits = self.permits.clone();

        match self.hold_for(&notification) {
            Some(delay) => {
                debug!(
                    "holding notification for {} for {:?} until it fits the sink window",
                    notification.recipient, delay
                );
                self.held.spawn(async move {
                    tokio::time::sleep(delay).await;
                    deliver(sink, permits, notification).await;
                });
            }
            None => {
                self.in_flight.spawn(deliver(sink, permits, notification));
            }
        }
    }

    // Сколько ждать, пока send_at не окажется внутри окна приёмника
    fn hold_for(&self, notification: &Notification) -> Option<Duration> {
        let horizon = self.sink.schedule_horizon()?;
        let send_at = notification.send_at?;
        let release_at = send_at - horizon;
        (release_at - self.clock.now()).to_std().ok().filter(|delay| !delay.is_zero())
    }
}

async fn deliver(sink: Arc<dyn Notifier>, permits: Arc<Semaphore>, notification: Notification) {
    let Ok(_permit) = permits.acquire_owned().await else {
        return;
    };
    let recipient = notification.recipient.clone();
    match sink.send(notification).await {
        Ok(()) => debug!("notification delivered to {}", recipient),
        Err(e) => error!("notification to {} failed: {}", recipient, e),
    }
}
