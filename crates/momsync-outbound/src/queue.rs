use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use momsync_core::task::Task;
use tokio::sync::Notify;

/// FIFO of outbound [`Task`]s shared by the poller and the dispatcher.
///
/// Every operation holds the list lock for its whole duration. `dequeue`
/// parks on a [`Notify`] while the list is empty.
#[derive(Debug, Default)]
pub struct TaskQueue {
    tasks: Mutex<VecDeque<Task>>,
    available: Notify,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Task>> {
        // A panic while holding the lock cannot leave the deque half-updated.
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn enqueue(&self, task: Task) {
        self.lock().push_back(task);
        self.available.notify_one();
    }

    /// Append a batch in order, under a single lock.
    pub fn enqueue_all(&self, tasks: impl IntoIterator<Item = Task>) {
        let added = {
            let mut guard = self.lock();
            let before = guard.len();
            guard.extend(tasks);
            guard.len() - before
        };
        for _ in 0..added {
            self.available.notify_one();
        }
    }

    /// Wait for a task and remove it from the head.
    ///
    /// Cancel-safe: a task is only removed in the same poll that returns it.
    pub async fn dequeue(&self) -> Task {
        loop {
            let notified = self.available.notified();
            let head = self.lock().pop_front();
            if let Some(task) = head {
                return task;
            }
            notified.await;
        }
    }

    /// Move `task` to the tail. A task no longer in the queue (the usual
    /// case after `dequeue`) is appended.
    pub fn requeue_at_end(&self, task: Task) {
        {
            let mut guard = self.lock();
            if let Some(pos) = guard.iter().position(|t| t.id == task.id) {
                guard.remove(pos);
            }
            guard.push_back(task);
        }
        self.available.notify_one();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
impl TaskQueue {
    pub(crate) fn try_dequeue(&self) -> Option<Task> {
        self.lock().pop_front()
    }

    /// Task ids in delivery order.
    pub(crate) fn ids(&self) -> Vec<uuid::Uuid> {
        self.lock().iter().map(|t| t.id).collect()
    }
}
