//! Queue consumer harness shared by every worker.
//!
//! A [`Worker`] long-polls its queue one message at a time, decodes the notification wrapper and
//! the binary event inside it, hands the event to its [`EventHandler`] and acknowledges the
//! message according to the result:
//!
//! | Result                      | Queue action                                        |
//! |-----------------------------|-----------------------------------------------------|
//! | `Ok(Outcome::Done)`         | delete                                              |
//! | `Ok(Outcome::RetryLater(d))`| change visibility to `d`                            |
//! | permanent `Err`             | delete (logged)                                     |
//! | other `Err`                 | nothing, the visibility window re-exposes it        |
//!
//! Undecodable messages are permanent failures and are deleted.

use crate::constants::RECEIVE_ERROR_PAUSE;
use crate::error::{EnvelopeError, WorkerResult};
use crate::queue::{decode_notification, Queue, QueueMessage, ReceiveParams};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::Instrument;

/// Successful result of processing one event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Fully handled. The message is deleted.
    Done,
    /// Not due yet. The message is redelivered after the delay.
    RetryLater(Duration),
}

/// Processing logic for one kind of queued event.
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    type Event: prost::Message + Default + Send + 'static;

    /// Short name used in logs.
    fn name(&self) -> &'static str;

    async fn process(&self, event: Self::Event) -> WorkerResult<Outcome>;
}

/// What the harness did with a message. Returned for observability and tests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    Deleted,
    Rescheduled(Duration),
    LeftForRetry,
}

pub struct Worker<H> {
    queue: Arc<dyn Queue>,
    handler: Arc<H>,
    params: ReceiveParams,
}

impl<H: EventHandler> Worker<H> {
    pub fn new(queue: Arc<dyn Queue>, handler: H) -> Self {
        Self {
            queue,
            handler: Arc::new(handler),
            params: ReceiveParams::default(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.handler.name()
    }

    /// Spawns the consume loop and returns a handle that can stop it.
    pub fn start(self) -> WorkerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let name = self.name();
        let span = tracing::info_span!("worker", worker = name);
        let handle = tokio::spawn(async move { self.run(shutdown_rx).await }.instrument(span));

        WorkerHandle {
            name,
            shutdown_tx,
            handle,
        }
    }

    /// Consumes until `shutdown` flips to `true` or its sender is dropped.
    ///
    /// A shutdown interrupts a pending receive. A message already being processed is allowed to
    /// finish.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(queue_url = self.queue.url(), "worker started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let received = tokio::select! {
                _ = shutdown.changed() => break,
                received = self.queue.receive(&self.params) => received,
            };

            match received {
                Ok(messages) => {
                    for message in messages {
                        self.handle_message(message).await;
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "receive failed");
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        _ = tokio::time::sleep(RECEIVE_ERROR_PAUSE) => {}
                    }
                }
            }
        }

        tracing::info!("worker stopped");
    }

    /// Decodes, processes and acknowledges one message.
    pub async fn handle_message(&self, message: QueueMessage) -> Disposition {
        let result = match decode_event::<H::Event>(&message.body) {
            Ok(event) => self.handler.process(event).await,
            Err(e) => {
                tracing::error!(error = %e, "dropping malformed queue message");
                Ok(Outcome::Done)
            }
        };

        match result {
            Ok(Outcome::Done) => self.delete(&message.receipt_handle).await,
            Ok(Outcome::RetryLater(delay)) => {
                tracing::info!(delay_secs = delay.as_secs(), "rescheduling message");
                if let Err(e) = self
                    .queue
                    .change_visibility(&message.receipt_handle, delay)
                    .await
                {
                    tracing::error!(error = %e, "failed to reschedule message");
                    return Disposition::LeftForRetry;
                }
                Disposition::Rescheduled(delay)
            }
            Err(e) if e.is_permanent() => {
                tracing::error!(error = %e, "dropping message after permanent failure");
                self.delete(&message.receipt_handle).await
            }
            Err(e) => {
                tracing::error!(error = %e, "processing failed, message will be retried");
                Disposition::LeftForRetry
            }
        }
    }

    async fn delete(&self, receipt_handle: &str) -> Disposition {
        match self.queue.delete(receipt_handle).await {
            Ok(()) => Disposition::Deleted,
            Err(e) => {
                tracing::error!(error = %e, "failed to delete message");
                Disposition::LeftForRetry
            }
        }
    }
}

fn decode_event<E: prost::Message + Default>(body: &str) -> Result<E, EnvelopeError> {
    let payload = decode_notification(body)?;
    Ok(E::decode(payload.as_slice())?)
}

/// Handle for a running worker.
#[derive(Debug)]
pub struct WorkerHandle {
    name: &'static str,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl WorkerHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Signals the loop to exit and waits up to `wait` for it, then aborts whatever is still
    /// in flight.
    pub async fn stop(self, wait: Duration) {
        let WorkerHandle {
            name,
            shutdown_tx,
            mut handle,
        } = self;
        let _ = shutdown_tx.send(true);

        match tokio::time::timeout(wait, &mut handle).await {
            Ok(Ok(())) => tracing::info!(worker = name, "worker shut down"),
            Ok(Err(e)) => tracing::error!(worker = name, error = %e, "worker task failed"),
            Err(_) => {
                tracing::warn!(
                    worker = name,
                    wait_secs = wait.as_secs(),
                    "worker did not stop in time, aborting"
                );
                handle.abort();
            }
        }
    }
}
