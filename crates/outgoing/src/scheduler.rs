use std::collections::VecDeque;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use replication_config::OutgoingConfig;
use replication_events::Envelope;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::writer::{PersistedEventWriter, WriterSettings};

/// Accepts envelopes for replication without blocking the caller.
pub trait OutgoingQueue: Send + Sync {
    /// Queues an envelope.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QueueClosed`] once the queue has been stopped.
    fn queue_event(&self, envelope: Envelope) -> Result<()>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SchedulerState {
    NotStarted,
    Running,
    Stopped,
}

/// Per-destination state. Only the task holding the slot lock touches the writer.
#[derive(Debug)]
struct DestinationSlot {
    destination: String,
    writer: Option<PersistedEventWriter>,
    pending: VecDeque<Envelope>,
    consecutive_failures: u32,
}

impl DestinationSlot {
    fn new(destination: &str) -> Self {
        Self {
            destination: destination.to_string(),
            writer: None,
            pending: VecDeque::new(),
            consecutive_failures: 0,
        }
    }

    /// Stages every pending envelope in order, publishing whenever the writer
    /// becomes ready. Stops at the first I/O failure and keeps the rest pending.
    async fn drain(&mut self, settings: &WriterSettings) -> Result<usize> {
        let mut published = 0;

        while let Some(envelope) = self.pending.front() {
            let line = match envelope.to_json_line() {
                Ok(line) => line,
                Err(e) => {
                    error!(
                        destination = %self.destination,
                        error = %e,
                        "dropping envelope that cannot be serialised"
                    );
                    self.pending.pop_front();
                    continue;
                }
            };

            let writer = self.writer.get_or_insert_with(|| {
                PersistedEventWriter::new(
                    settings,
                    &self.destination,
                    &envelope.originating_node,
                    envelope.event_timestamp,
                    envelope.event_nano_time,
                )
            });
            writer.stage(line.as_bytes()).await?;
            self.pending.pop_front();

            if writer.is_ready_to_publish() {
                self.publish().await?;
                published += 1;
            }
        }

        Ok(published)
    }

    async fn publish(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.publish().await?;
            self.writer = None;
        }
        Ok(())
    }

    /// Runs a scheduling pass, logging failures with escalating severity.
    async fn pass(&mut self, settings: &WriterSettings, escalate_after: u32, force: bool) {
        let mut result = self.drain(settings).await.map(|_| ());
        if result.is_ok() {
            let expired =
                self.writer.as_ref().is_some_and(PersistedEventWriter::is_ready_to_publish);
            if force || expired {
                result = self.publish().await;
            }
        }

        match result {
            Ok(()) => self.consecutive_failures = 0,
            Err(e) => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= escalate_after {
                    error!(
                        destination = %self.destination,
                        failures = self.consecutive_failures,
                        pending = self.pending.len(),
                        error = %e,
                        "staging keeps failing, will retry on the next pass"
                    );
                } else {
                    warn!(
                        destination = %self.destination,
                        failures = self.consecutive_failures,
                        error = %e,
                        "staging failed, will retry on the next pass"
                    );
                }
            }
        }
    }

    fn is_idle(&self) -> bool {
        self.writer.is_none() && self.pending.is_empty()
    }
}

struct Inner {
    settings: WriterSettings,
    pool_size: usize,
    flush_interval: Duration,
    escalate_after: u32,
    slots: DashMap<String, Arc<AsyncMutex<DestinationSlot>>>,
    senders: Mutex<Option<Vec<flume::Sender<Envelope>>>>,
    receivers: Mutex<Option<Vec<flume::Receiver<Envelope>>>>,
    state: Mutex<SchedulerState>,
    shutdown_token: CancellationToken,
    task_tracker: TaskTracker,
}

impl Inner {
    fn slot(&self, destination: &str) -> Arc<AsyncMutex<DestinationSlot>> {
        self.slots
            .entry(destination.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(DestinationSlot::new(destination))))
            .clone()
    }

    fn shard_for(&self, destination: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        destination.hash(&mut hasher);
        usize::try_from(hasher.finish() % self.pool_size as u64).unwrap_or_default()
    }

    async fn process(&self, envelope: Envelope) {
        let slot = self.slot(envelope.staging_destination());
        let mut slot = slot.lock().await;
        slot.pending.push_back(envelope);
        slot.pass(&self.settings, self.escalate_after, false).await;
    }

    /// Publishes expired writers and retries pending events on idle destinations.
    async fn flush_expired(&self) {
        let slots: Vec<_> = self.slots.iter().map(|entry| entry.value().clone()).collect();
        for slot in slots {
            let Ok(mut slot) = slot.try_lock() else {
                continue;
            };
            if !slot.is_idle() {
                slot.pass(&self.settings, self.escalate_after, false).await;
            }
        }
    }

    async fn flush_all(&self) {
        let slots: Vec<_> = self.slots.iter().map(|entry| entry.value().clone()).collect();
        for slot in slots {
            let mut slot = slot.lock().await;
            if !slot.is_idle() {
                slot.pass(&self.settings, self.escalate_after, true).await;
            }
        }
    }
}

/// Drains queued envelopes into per-destination staging files.
///
/// Envelopes are sharded by destination over a fixed pool of workers, so each
/// destination's events are staged by one worker in queue order. A timer
/// publishes files that have been open for longer than the maximum wait.
#[derive(Clone)]
pub struct OutgoingScheduler {
    inner: Arc<Inner>,
}

impl OutgoingScheduler {
    /// Creates a scheduler that stages into `directory`.
    ///
    /// Events may be queued before [`start`](Self::start); they are processed once it runs.
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>, config: &OutgoingConfig) -> Self {
        let pool_size = config.worker_pool_size.max(1);
        let (senders, receivers) = (0..pool_size).map(|_| flume::unbounded()).unzip();

        Self {
            inner: Arc::new(Inner {
                settings: WriterSettings {
                    directory: directory.into(),
                    max_events: config.max_events_before_proposing,
                    max_wait: config.max_wait(),
                },
                pool_size,
                flush_interval: config.flush_interval(),
                escalate_after: config.escalate_after.max(1),
                slots: DashMap::new(),
                senders: Mutex::new(Some(senders)),
                receivers: Mutex::new(Some(receivers)),
                state: Mutex::new(SchedulerState::NotStarted),
                shutdown_token: CancellationToken::new(),
                task_tracker: TaskTracker::new(),
            }),
        }
    }

    /// Spawns the worker pool and the flush timer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyStarted`] if the scheduler was started before.
    pub fn start(&self) -> Result<()> {
        {
            let mut state = self.inner.state.lock();
            if *state != SchedulerState::NotStarted {
                return Err(Error::AlreadyStarted);
            }
            *state = SchedulerState::Running;
        }

        let receivers = self.inner.receivers.lock().take().unwrap_or_default();
        for (worker, receiver) in receivers.into_iter().enumerate() {
            let inner = self.inner.clone();
            self.inner.task_tracker.spawn(async move {
                while let Ok(envelope) = receiver.recv_async().await {
                    inner.process(envelope).await;
                }
                debug!(worker, "outgoing worker drained");
            });
        }

        let inner = self.inner.clone();
        let shutdown_token = self.inner.shutdown_token.clone();
        self.inner.task_tracker.spawn(async move {
            let mut interval = tokio::time::interval(inner.flush_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = shutdown_token.cancelled() => break,
                    _ = interval.tick() => inner.flush_expired().await,
                }
            }
        });

        info!(workers = self.inner.pool_size, "outgoing scheduler started");
        Ok(())
    }

    /// Stops accepting events, drains the queue, publishes every open staging
    /// file and waits for the workers to exit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotRunning`] unless the scheduler is running.
    pub async fn stop(&self) -> Result<()> {
        {
            let mut state = self.inner.state.lock();
            if *state != SchedulerState::Running {
                return Err(Error::NotRunning);
            }
            *state = SchedulerState::Stopped;
        }

        // Dropping the senders lets each worker finish its backlog and exit.
        drop(self.inner.senders.lock().take());
        self.inner.shutdown_token.cancel();
        self.inner.task_tracker.close();
        self.inner.task_tracker.wait().await;

        self.inner.flush_all().await;
        info!("outgoing scheduler stopped");
        Ok(())
    }

    /// Publishes every open staging file now, regardless of thresholds.
    pub async fn flush_all(&self) {
        self.inner.flush_all().await;
    }

    /// Publishes staging files whose wait has expired, skipping busy destinations.
    pub async fn flush_expired(&self) {
        self.inner.flush_expired().await;
    }

    /// Number of destinations with a writer open or events awaiting a retry.
    #[must_use]
    pub fn open_destinations(&self) -> usize {
        self.inner
            .slots
            .iter()
            .filter(|entry| entry.value().try_lock().map_or(true, |slot| !slot.is_idle()))
            .count()
    }
}

impl OutgoingQueue for OutgoingScheduler {
    fn queue_event(&self, envelope: Envelope) -> Result<()> {
        let senders = self.inner.senders.lock();
        let Some(senders) = senders.as_ref() else {
            return Err(Error::QueueClosed);
        };
        let shard = self.inner.shard_for(envelope.staging_destination());
        senders[shard].send(envelope).map_err(|_| Error::QueueClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use replication_events::{ChangeIndexEvent, EnvelopeFactory, ReplicatedEvent};

    fn envelope(factory: &EnvelopeFactory, project: &str, change_id: u32) -> Envelope {
        Envelope::wrap(&ReplicatedEvent::from(ChangeIndexEvent {
            meta: factory.meta(),
            project: project.to_string(),
            change_id,
            deleted: false,
        }))
        .unwrap()
    }

    fn published(dir: &std::path::Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|entry| entry.unwrap().file_name().into_string().ok())
            .filter(|name| name.ends_with(".json"))
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = OutgoingScheduler::new(dir.path(), &OutgoingConfig::new(10, 60_000));

        scheduler.start().unwrap();
        assert_matches!(scheduler.start(), Err(Error::AlreadyStarted));
        scheduler.stop().await.unwrap();
        assert_matches!(scheduler.stop().await, Err(Error::NotRunning));
    }

    #[tokio::test]
    async fn test_queue_closed_after_stop() {
        let dir = tempfile::tempdir().unwrap();
        let factory = EnvelopeFactory::new("node-1");
        let scheduler = OutgoingScheduler::new(dir.path(), &OutgoingConfig::new(10, 60_000));
        scheduler.start().unwrap();
        scheduler.stop().await.unwrap();

        assert_matches!(
            scheduler.queue_event(envelope(&factory, "ProjectA", 1)),
            Err(Error::QueueClosed)
        );
    }

    #[tokio::test]
    async fn test_stop_publishes_open_writers() {
        let dir = tempfile::tempdir().unwrap();
        let factory = EnvelopeFactory::new("node-1");
        let scheduler = OutgoingScheduler::new(dir.path(), &OutgoingConfig::new(100, 60_000));

        for change_id in 0..3 {
            scheduler.queue_event(envelope(&factory, "ProjectA", change_id)).unwrap();
            scheduler.queue_event(envelope(&factory, "ProjectB", change_id)).unwrap();
        }
        scheduler.start().unwrap();
        scheduler.stop().await.unwrap();

        let files = published(dir.path());
        assert_eq!(files.len(), 2);
        for file in files {
            let contents = std::fs::read_to_string(dir.path().join(file)).unwrap();
            assert_eq!(contents.lines().count(), 3);
        }
        assert_eq!(scheduler.open_destinations(), 0);
    }

    fn change_ids(path: &std::path::Path) -> Vec<u32> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| match Envelope::from_json_line(line).unwrap().decode().unwrap() {
                ReplicatedEvent::ChangeIndex(event) => event.change_id,
                other => panic!("unexpected event {other:?}"),
            })
            .collect()
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn test_failing_destination_retries_and_escalates_alone() {
        let dir = tempfile::tempdir().unwrap();
        let blocked = dir.path().join("blocked");
        std::fs::write(&blocked, b"").unwrap();
        let factory = EnvelopeFactory::new("node-1");
        let mut config = OutgoingConfig::new(1, 60_000);
        config.escalate_after = 3;
        let scheduler = OutgoingScheduler::new(dir.path(), &config);

        // ProjectA stages under a path occupied by a plain file.
        let blocked_settings = WriterSettings {
            directory: blocked.clone(),
            max_events: 100,
            max_wait: Some(Duration::from_secs(60)),
        };
        scheduler.inner.slot("ProjectA").lock().await.writer =
            Some(PersistedEventWriter::new(&blocked_settings, "ProjectA", "node-1", 1, 1));

        for change_id in 0..2 {
            scheduler.inner.process(envelope(&factory, "ProjectA", change_id)).await;
        }
        assert!(logs_contain("staging failed, will retry on the next pass"));
        assert!(!logs_contain("staging keeps failing"));

        for change_id in 0..2 {
            scheduler.inner.process(envelope(&factory, "ProjectB", change_id)).await;
        }
        let files = published(dir.path());
        assert_eq!(files.len(), 1);
        assert_eq!(change_ids(&dir.path().join(&files[0])), vec![0, 1]);

        scheduler.inner.process(envelope(&factory, "ProjectA", 2)).await;
        assert!(logs_contain("staging keeps failing"));
        assert_eq!(scheduler.open_destinations(), 1);

        std::fs::remove_file(&blocked).unwrap();
        scheduler.flush_expired().await;
        {
            let slot = scheduler.inner.slot("ProjectA");
            let slot = slot.lock().await;
            assert!(slot.pending.is_empty());
            assert_eq!(slot.consecutive_failures, 0);
        }

        scheduler.flush_all().await;
        let files = published(&blocked);
        assert_eq!(files.len(), 1);
        assert_eq!(change_ids(&blocked.join(&files[0])), vec![0, 1, 2]);
        assert_eq!(scheduler.open_destinations(), 0);
    }

    #[tokio::test]
    async fn test_timer_publishes_idle_destination() {
        let dir = tempfile::tempdir().unwrap();
        let factory = EnvelopeFactory::new("node-1");
        let mut config = OutgoingConfig::new(100, 50);
        config.flush_interval_ms = 20;
        let scheduler = OutgoingScheduler::new(dir.path(), &config);
        scheduler.start().unwrap();

        scheduler.queue_event(envelope(&factory, "ProjectA", 1)).unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(published(dir.path()).len(), 1);
        scheduler.stop().await.unwrap();
    }
}
