use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use replication_config::IncomingConfig;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::reader::{IncomingFile, list_published};
use crate::{Error, FileReport, IncomingEventReader, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SchedulerState {
    NotStarted,
    Running,
    Stopped,
}

/// Periodically consumes published files from the incoming directory.
///
/// Files of one destination are applied one after another in name order;
/// different destinations are applied concurrently, up to the pool size.
pub struct IncomingScheduler {
    reader: Arc<IncomingEventReader>,
    directory: PathBuf,
    pool: Arc<Semaphore>,
    pass_lock: tokio::sync::Mutex<()>,
    poll_interval: Duration,
    state: Mutex<SchedulerState>,
    shutdown_token: CancellationToken,
    task_tracker: TaskTracker,
}

impl IncomingScheduler {
    /// Creates a scheduler reading from `directory`.
    pub fn new(
        reader: Arc<IncomingEventReader>,
        directory: impl Into<PathBuf>,
        config: &IncomingConfig,
    ) -> Self {
        Self {
            reader,
            directory: directory.into(),
            pool: Arc::new(Semaphore::new(config.worker_pool_size.max(1))),
            pass_lock: tokio::sync::Mutex::new(()),
            poll_interval: config.poll_interval(),
            state: Mutex::new(SchedulerState::NotStarted),
            shutdown_token: CancellationToken::new(),
            task_tracker: TaskTracker::new(),
        }
    }

    /// Consumes every file currently published, and waits for them to be applied.
    ///
    /// Passes never overlap: a pass started while another is running waits for it,
    /// then lists the directory afresh.
    ///
    /// # Errors
    ///
    /// Fails if the incoming directory cannot be listed.
    pub async fn run_pass(&self) -> Result<FileReport> {
        let _pass = self.pass_lock.lock().await;
        let mut by_destination: BTreeMap<String, Vec<IncomingFile>> = BTreeMap::new();
        for file in list_published(&self.directory).await? {
            by_destination
                .entry(file.name.destination_hash.clone())
                .or_default()
                .push(file);
        }

        let mut tasks = JoinSet::new();
        for (destination, files) in by_destination {
            let reader = self.reader.clone();
            let pool = self.pool.clone();
            tasks.spawn(async move {
                let mut total = FileReport::default();
                let Ok(_permit) = pool.acquire_owned().await else {
                    return total;
                };
                for file in files {
                    match reader.process_file(&file.path).await {
                        Ok(report) => {
                            total.dispatched += report.dispatched;
                            total.failed += report.failed;
                        }
                        Err(e) => {
                            warn!(
                                destination = %destination,
                                error = %e,
                                "incoming file not consumed"
                            );
                        }
                    }
                }
                total
            });
        }

        let mut total = FileReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(report) => {
                    total.dispatched += report.dispatched;
                    total.failed += report.failed;
                }
                Err(e) => warn!(error = %e, "incoming worker failed"),
            }
        }
        Ok(total)
    }

    /// Starts polling the incoming directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyStarted`] if the scheduler was started before.
    pub fn start(self: &Arc<Self>) -> Result<()> {
        {
            let mut state = self.state.lock();
            if *state != SchedulerState::NotStarted {
                return Err(Error::AlreadyStarted);
            }
            *state = SchedulerState::Running;
        }

        let scheduler = self.clone();
        let shutdown_token = self.shutdown_token.clone();
        self.task_tracker.spawn(async move {
            let mut interval = tokio::time::interval(scheduler.poll_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = shutdown_token.cancelled() => break,
                    _ = interval.tick() => {
                        match scheduler.run_pass().await {
                            Ok(report) if report.dispatched + report.failed > 0 => {
                                debug!(
                                    dispatched = report.dispatched,
                                    failed = report.failed,
                                    "incoming pass complete"
                                );
                            }
                            Ok(_) => {}
                            Err(e) => warn!(error = %e, "incoming pass failed"),
                        }
                    }
                }
            }
        });

        info!(directory = %self.directory.display(), "incoming scheduler started");
        Ok(())
    }

    /// Stops polling after the pass in progress, if any, completes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotRunning`] unless the scheduler is running.
    pub async fn stop(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            if *state != SchedulerState::Running {
                return Err(Error::NotRunning);
            }
            *state = SchedulerState::Stopped;
        }

        self.shutdown_token.cancel();
        self.task_tracker.close();
        self.task_tracker.wait().await;
        info!("incoming scheduler stopped");
        Ok(())
    }
}
