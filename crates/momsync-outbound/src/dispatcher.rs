use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use momsync_core::config::DispatchConfig;
use momsync_core::task::Task;
use uuid::Uuid;

use crate::client::PlanningClient;
use crate::error::OutboundError;
use crate::queue::TaskQueue;

/// What happened to one task handed to [`Dispatcher::deliver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered,
    /// Moved to the tail of the queue; `backoff` must elapse before the
    /// next delivery.
    Requeued { attempts: u32, backoff: Duration },
    /// Dropped after exhausting `max_attempts`.
    DeadLettered,
}

/// Single consumer that delivers queued tasks to the planning system.
///
/// The session is opened lazily, kept across deliveries and reopened after
/// the planning system refuses it. A task is only charged an attempt once
/// a session is open; while login keeps failing the dispatcher backs off
/// on its own counter instead.
pub struct Dispatcher {
    queue: Arc<TaskQueue>,
    client: PlanningClient,
    config: DispatchConfig,
    attempts: HashMap<Uuid, u32>,
    login_failures: u32,
    logged_in: bool,
}

impl Dispatcher {
    pub fn new(queue: Arc<TaskQueue>, client: PlanningClient, config: DispatchConfig) -> Self {
        Self {
            queue,
            client,
            config,
            attempts: HashMap::new(),
            login_failures: 0,
            logged_in: false,
        }
    }

    /// Deliver tasks until `shutdown` resolves, then close the session.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        tracing::info!("dispatcher started");
        loop {
            let task = tokio::select! {
                _ = &mut shutdown => break,
                task = self.queue.dequeue() => task,
            };
            if let DispatchOutcome::Requeued { backoff, .. } = self.deliver(task).await {
                tokio::select! {
                    _ = &mut shutdown => break,
                    _ = tokio::time::sleep(backoff) => {}
                }
            }
        }
        self.shutdown().await;
    }

    pub async fn deliver(&mut self, task: Task) -> DispatchOutcome {
        if let Err(e) = self.open_session().await {
            self.login_failures += 1;
            let backoff = self.config.backoff_for(self.login_failures);
            tracing::warn!(
                task = %task.id,
                mom2_id = ?task.mom2_id,
                login_failures = self.login_failures,
                backoff_secs = backoff.as_secs(),
                error = %e,
                "cannot open planning-system session; task kept"
            );
            let attempts = self.attempts.get(&task.id).copied().unwrap_or(0);
            self.queue.requeue_at_end(task);
            return DispatchOutcome::Requeued { attempts, backoff };
        }

        let err = match self.import(&task).await {
            Ok(()) => {
                let attempts = self.attempts.remove(&task.id).unwrap_or(0) + 1;
                tracing::info!(
                    task = %task.id,
                    mom2_id = ?task.mom2_id,
                    attempts,
                    "delivered observation to planning system"
                );
                return DispatchOutcome::Delivered;
            }
            Err(e) => e,
        };

        let attempts = {
            let n = self.attempts.entry(task.id).or_insert(0);
            *n += 1;
            *n
        };

        if attempts >= self.config.max_attempts {
            self.attempts.remove(&task.id);
            tracing::error!(
                task = %task.id,
                mom2_id = ?task.mom2_id,
                attempts,
                error = %err,
                "giving up on observation update; dropping task"
            );
            return DispatchOutcome::DeadLettered;
        }

        let backoff = self.config.backoff_for(attempts);
        if err.is_transport() {
            tracing::warn!(
                task = %task.id,
                mom2_id = ?task.mom2_id,
                attempts,
                backoff_secs = backoff.as_secs(),
                error = %err,
                "delivery failed; requeued"
            );
        } else {
            tracing::error!(
                task = %task.id,
                mom2_id = ?task.mom2_id,
                attempts,
                backoff_secs = backoff.as_secs(),
                error = %err,
                "planning system refused observation update; requeued"
            );
        }
        self.queue.requeue_at_end(task);
        DispatchOutcome::Requeued { attempts, backoff }
    }

    async fn open_session(&mut self) -> Result<(), OutboundError> {
        if !self.logged_in {
            self.client.login().await?;
            self.logged_in = true;
            self.login_failures = 0;
        }
        Ok(())
    }

    async fn import(&mut self, task: &Task) -> Result<(), OutboundError> {
        match self.client.import(&task.payload).await {
            Err(e @ OutboundError::Auth(_)) => {
                self.logged_in = false;
                Err(e)
            }
            other => other,
        }
    }

    /// Close the planning-system session if one is open.
    pub async fn shutdown(&mut self) {
        if self.logged_in {
            self.logged_in = false;
            if let Err(e) = self.client.logout().await {
                tracing::warn!(error = %e, "logout failed");
            }
        }
        tracing::info!(pending = self.queue.len(), "dispatcher stopped");
    }
}

#[cfg(test)]
impl Dispatcher {
    async fn dispatch_next(&mut self) -> DispatchOutcome {
        let task = self.queue.dequeue().await;
        self.deliver(task).await
    }

    fn attempts(&self, id: Uuid) -> u32 {
        self.attempts.get(&id).copied().unwrap_or(0)
    }
}
