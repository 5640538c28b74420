use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use momsync_core::cursor::{CursorStore, TimeWindow};
use momsync_core::error::MomsyncError;
use momsync_core::repository::Repository;
use momsync_core::task::Task;
use tokio::sync::Notify;

use crate::error::OutboundError;
use crate::queue::TaskQueue;

/// Summary of one completed poll cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub window: (DateTime<Utc>, DateTime<Utc>),
    pub enqueued: usize,
}

/// Scans the execution repository for observations modified since the
/// cursor and turns each into a queued [`Task`].
pub struct Poller {
    repo: Arc<dyn Repository>,
    queue: Arc<TaskQueue>,
    cursor: CursorStore,
    interval: Duration,
    wake: Arc<Notify>,
}

impl Poller {
    pub fn new(
        repo: Arc<dyn Repository>,
        queue: Arc<TaskQueue>,
        cursor: CursorStore,
        interval: Duration,
    ) -> Self {
        Self {
            repo,
            queue,
            cursor,
            interval,
            wake: Arc::new(Notify::new()),
        }
    }

    /// Handle that cuts the current sleep short; the next cycle starts at
    /// once.
    pub fn waker(&self) -> Arc<Notify> {
        self.wake.clone()
    }

    /// One cycle over `[cursor.last_end, now)`. The cursor only moves once
    /// every task of the cycle is queued; on error, including a record that
    /// cannot be encoded, nothing is queued and the same window is retried.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<CycleReport, OutboundError> {
        let TimeWindow { last_end: start } = self.cursor.load_or_init(now)?;

        let records = if start < now {
            let repo = self.repo.clone();
            tokio::task::spawn_blocking(move || repo.query_changed_since(start, now))
                .await
                .map_err(|e| OutboundError::Join(e.to_string()))??
        } else {
            Vec::new()
        };

        let mut tasks = Vec::with_capacity(records.len());
        for record in &records {
            let task = Task::from_record(record, now).map_err(|e| {
                tracing::error!(mom2_id = ?record.mom2_id, error = %e, "cannot encode observation");
                MomsyncError::from(e)
            })?;
            tasks.push(task);
        }

        let enqueued = tasks.len();
        self.queue.enqueue_all(tasks);
        self.cursor.save(&TimeWindow { last_end: now })?;

        Ok(CycleReport {
            window: (start, now),
            enqueued,
        })
    }

    /// Poll every `interval` until `shutdown` resolves. Cycles never overlap.
    pub async fn run(self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        tracing::info!(interval_secs = self.interval.as_secs(), "poller started");
        loop {
            match self.run_cycle(Utc::now()).await {
                Ok(report) if report.enqueued > 0 => tracing::info!(
                    from = %report.window.0,
                    to = %report.window.1,
                    enqueued = report.enqueued,
                    "poll cycle queued changes"
                ),
                Ok(report) => tracing::debug!(to = %report.window.1, "poll cycle found no changes"),
                Err(e) => tracing::error!(error = %e, "poll cycle failed; window will be retried"),
            }

            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(self.interval) => {}
                _ = self.wake.notified() => tracing::debug!("poller woken early"),
            }
        }
        tracing::info!("poller stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use momsync_core::error::RepositoryError;
    use momsync_core::model::{Beam, ObservationRecord};
    use momsync_core::repository::SqliteRepository;
    use momsync_core::types::ExecutionStatus;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records every window asked for and answers with `records`;
    /// optionally fails.
    #[derive(Default)]
    struct Recording {
        windows: Mutex<Vec<(DateTime<Utc>, DateTime<Utc>)>>,
        records: Vec<ObservationRecord>,
        fail: bool,
    }

    impl Repository for Recording {
        fn query_changed_since(
            &self,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> Result<Vec<ObservationRecord>, RepositoryError> {
            self.windows.lock().unwrap().push((start, end));
            if self.fail {
                return Err(RepositoryError::Unavailable("database offline".into()));
            }
            Ok(self.records.clone())
        }

        fn store(&self, _: &ObservationRecord) -> Result<(), RepositoryError> {
            Ok(())
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn poller(dir: &TempDir, repo: Arc<dyn Repository>) -> (Poller, Arc<TaskQueue>, CursorStore) {
        let queue = Arc::new(TaskQueue::new());
        let cursor = CursorStore::new(dir.path().join("cursor.yaml"));
        let p = Poller::new(repo, queue.clone(), cursor.clone(), Duration::from_secs(60));
        (p, queue, cursor)
    }

    #[tokio::test]
    async fn empty_cycle_advances_cursor_to_now() {
        let dir = TempDir::new().unwrap();
        let repo = Arc::new(Recording::default());
        let (p, queue, cursor) = poller(&dir, repo.clone());
        cursor.save(&TimeWindow { last_end: at(0) }).unwrap();

        let report = p.run_cycle(at(60)).await.unwrap();
        assert_eq!(report.enqueued, 0);
        assert_eq!(cursor.load().unwrap().unwrap().last_end, at(60));

        p.run_cycle(at(120)).await.unwrap();
        let windows = repo.windows.lock().unwrap().clone();
        assert_eq!(windows, vec![(at(0), at(60)), (at(60), at(120))]);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn failed_query_keeps_the_window() {
        let dir = TempDir::new().unwrap();
        let repo = Arc::new(Recording {
            fail: true,
            ..Default::default()
        });
        let (p, _queue, cursor) = poller(&dir, repo.clone());
        cursor.save(&TimeWindow { last_end: at(0) }).unwrap();

        assert!(matches!(
            p.run_cycle(at(60)).await,
            Err(OutboundError::Repository(_))
        ));
        assert_eq!(cursor.load().unwrap().unwrap().last_end, at(0));
    }

    #[tokio::test]
    async fn first_cycle_starts_the_cursor_without_querying() {
        let dir = TempDir::new().unwrap();
        let repo = Arc::new(Recording::default());
        let (p, _queue, cursor) = poller(&dir, repo.clone());

        p.run_cycle(at(0)).await.unwrap();
        assert!(repo.windows.lock().unwrap().is_empty());
        assert_eq!(cursor.load().unwrap().unwrap().last_end, at(0));
    }

    #[tokio::test]
    async fn changed_observations_become_tasks_in_order() {
        let dir = TempDir::new().unwrap();
        let repo = Arc::new(SqliteRepository::open_in_memory().unwrap());
        for (id, secs) in [(11, 10), (12, 20), (13, 90)] {
            repo.store(&ObservationRecord {
                mom2_id: Some(id),
                status: Some(ExecutionStatus::Running),
                last_modified: Some(at(secs)),
                ..Default::default()
            })
            .unwrap();
        }
        let (p, queue, cursor) = poller(&dir, repo);
        cursor.save(&TimeWindow { last_end: at(0) }).unwrap();

        let report = p.run_cycle(at(60)).await.unwrap();
        assert_eq!(report.enqueued, 2);

        let first = queue.try_dequeue().unwrap();
        assert_eq!(first.mom2_id, Some(11));
        assert_eq!(first.cycle_at, at(60));
        assert!(first.payload.contains("activeStatus"));
        assert_eq!(queue.try_dequeue().unwrap().mom2_id, Some(12));
        assert!(queue.try_dequeue().is_none());
    }

    #[tokio::test]
    async fn unencodable_record_keeps_the_window() {
        let dir = TempDir::new().unwrap();
        let identified = ObservationRecord {
            mom2_id: Some(1),
            ..Default::default()
        };
        let repo = Arc::new(Recording {
            records: vec![identified, ObservationRecord::default()],
            ..Default::default()
        });
        let (p, queue, cursor) = poller(&dir, repo);
        cursor.save(&TimeWindow { last_end: at(0) }).unwrap();

        assert!(matches!(
            p.run_cycle(at(60)).await,
            Err(OutboundError::Core(MomsyncError::Codec(_)))
        ));
        assert!(queue.is_empty());
        assert_eq!(cursor.load().unwrap().unwrap().last_end, at(0));
    }

    #[tokio::test]
    async fn angle_times_give_beams_their_own_timing() {
        let dir = TempDir::new().unwrap();
        let repo = Arc::new(SqliteRepository::open_in_memory().unwrap());
        repo.store(&ObservationRecord {
            mom2_id: Some(21),
            status: Some(ExecutionStatus::Running),
            start_time: Some(at(0)),
            beams: vec![Beam {
                mom2_id: Some(22),
                duration_secs: Some(600),
                ..Default::default()
            }],
            last_modified: Some(at(5)),
            ..Default::default()
        })
        .unwrap();
        assert!(repo.set_angle_times(21, "[+30]").unwrap());

        let (p, queue, cursor) = poller(&dir, repo);
        cursor.save(&TimeWindow { last_end: at(0) }).unwrap();
        let report = p
            .run_cycle(Utc::now() + chrono::Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(report.enqueued, 1);

        let payload = queue.try_dequeue().unwrap().payload;
        assert!(payload.contains("measurementAttributes"), "{payload}");
        assert!(payload.contains("<startTime>2023-11-14T22:13:50</startTime>"), "{payload}");
        assert!(payload.contains("<endTime>2023-11-14T22:23:50</endTime>"), "{payload}");
    }

    #[tokio::test]
    async fn waker_starts_the_next_cycle_early() {
        let dir = TempDir::new().unwrap();
        let repo = Arc::new(Recording::default());
        let (p, _queue, cursor) = poller(&dir, repo.clone());
        cursor.save(&TimeWindow { last_end: at(0) }).unwrap();
        let waker = p.waker();

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(p.run(async move {
            let _ = rx.await;
        }));
        while repo.windows.lock().unwrap().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        // The interval is a minute; only the waker can start a second cycle.
        waker.notify_one();
        tokio::time::timeout(Duration::from_secs(2), async {
            while repo.windows.lock().unwrap().len() < 2 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        let _ = tx.send(());
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let dir = TempDir::new().unwrap();
        let (p, _queue, cursor) = poller(&dir, Arc::new(Recording::default()));
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(p.run(async move {
            let _ = rx.await;
        }));
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = tx.send(());
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(cursor.load().unwrap().is_some());
    }
}
