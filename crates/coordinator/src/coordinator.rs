use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use replication_broker::{EventBroker, StreamEventFacade, StreamEventsFeed, StreamReplayBridge};
use replication_config::ReplicationConfig;
use replication_events::EnvelopeFactory;
use replication_incoming::processors::{
    AccountIndexProcessor, CacheProcessor, ChangeIndexProcessor, DeletionLedger,
    DeletionMessageProcessor, GroupIndexProcessor, ProjectIndexProcessor, ProjectProcessor,
    StreamProcessor,
};
use replication_incoming::{
    CacheWatchTable, FileReport, IncomingEventReader, IncomingScheduler, ProcessorRegistry,
    ReplicatedCache, ReplicatedEventProcessor,
};
use replication_outgoing::feeds::{
    AccountIndexEventsFeed, CacheEventsFeed, FeedContext, IndexEventsFeed, ProjectEventsFeed,
    ProjectIndexEventsFeed,
};
use replication_outgoing::OutgoingScheduler;
use tracing::{debug, info};

use crate::{Capabilities, Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LifecycleState {
    NotStarted,
    Running,
    Stopped,
}

/// Entry points the application calls when something it owns changes.
#[derive(Clone)]
pub struct Feeds {
    /// Cache evictions and typed cache operations.
    pub cache: CacheEventsFeed,
    /// Change reindex and deletion.
    pub index: IndexEventsFeed,
    /// Account and group reindex.
    pub account_index: AccountIndexEventsFeed,
    /// Project reindex and deletion.
    pub project_index: ProjectIndexEventsFeed,
    /// Project deletion.
    pub project: ProjectEventsFeed,
}

impl Feeds {
    fn new(context: &FeedContext) -> Self {
        Self {
            cache: CacheEventsFeed::new(context.clone()),
            index: IndexEventsFeed::new(context.clone()),
            account_index: AccountIndexEventsFeed::new(context.clone()),
            project_index: ProjectIndexEventsFeed::new(context.clone()),
            project: ProjectEventsFeed::new(context.clone()),
        }
    }
}

struct Pipeline {
    outgoing: OutgoingScheduler,
    incoming: Arc<IncomingScheduler>,
}

/// Owns one node's replicated event pipeline.
///
/// Nothing here is global: several coordinators can live in one process.
pub struct ReplicatedEventsCoordinator {
    config: Arc<ReplicationConfig>,
    state: Mutex<LifecycleState>,
    feeds: Feeds,
    broker: Arc<EventBroker>,
    facade: Arc<StreamEventFacade>,
    registry: Arc<ProcessorRegistry>,
    processors: Vec<Arc<dyn ReplicatedEventProcessor>>,
    caches: Arc<CacheWatchTable>,
    ledger: Arc<DeletionLedger>,
    pipeline: Option<Pipeline>,
}

impl std::fmt::Debug for ReplicatedEventsCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicatedEventsCoordinator")
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl ReplicatedEventsCoordinator {
    /// Validates `config`, creates the staging directories and wires every component.
    ///
    /// With replication disabled no directory is created, the feeds drop
    /// everything and stream notifications are delivered locally only.
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration or if a directory cannot be created.
    pub fn new(mut config: ReplicationConfig, capabilities: Capabilities) -> Result<Self> {
        config.normalize();
        config.validate()?;
        let config = Arc::new(config);
        let factory = EnvelopeFactory::new(config.node_id.clone());

        let outgoing = if config.enabled {
            let directories = &config.directories;
            for directory in [
                &directories.outgoing,
                &directories.incoming,
                &directories.incoming_failed,
            ] {
                create_directory(directory)?;
            }
            Some(OutgoingScheduler::new(&directories.outgoing, &config.outgoing))
        } else {
            info!(node = %config.node_id, "replication disabled");
            None
        };

        let context = match &outgoing {
            Some(scheduler) => FeedContext::new(factory, Arc::new(scheduler.clone())),
            None => FeedContext::disabled(factory),
        };

        let broker = Arc::new(EventBroker::new(capabilities.permissions.clone()));
        let facade = Arc::new(StreamEventFacade::new(
            broker.clone(),
            StreamEventsFeed::new(context.clone(), &config),
        ));
        let bridge = Arc::new(StreamReplayBridge::new(facade.clone(), config.node_id.clone()));

        let caches = Arc::new(CacheWatchTable::new());
        let ledger = Arc::new(DeletionLedger::new());
        let processors: Vec<Arc<dyn ReplicatedEventProcessor>> = vec![
            Arc::new(CacheProcessor::new(caches.clone(), config.clone())),
            Arc::new(ChangeIndexProcessor::new(capabilities.change_indexer.clone())),
            Arc::new(AccountIndexProcessor::new(capabilities.account_indexer.clone())),
            Arc::new(GroupIndexProcessor::new(capabilities.group_indexer.clone())),
            Arc::new(ProjectIndexProcessor::new(capabilities.project_indexer.clone())),
            Arc::new(ProjectProcessor::new(
                capabilities.repositories.clone(),
                capabilities.change_indexer.clone(),
                ProjectEventsFeed::new(context.clone()),
                ledger.clone(),
                config.project_deletion.preserve_on_disk,
            )),
            Arc::new(DeletionMessageProcessor::new(ledger.clone())),
            Arc::new(StreamProcessor::new(bridge)),
        ];

        let registry = Arc::new(ProcessorRegistry::new());
        let pipeline = outgoing.map(|outgoing| {
            let directories = &config.directories;
            let reader = IncomingEventReader::new(
                registry.clone(),
                &directories.incoming_failed,
                config.incoming.keep_failed_events,
            );
            Pipeline {
                outgoing,
                incoming: Arc::new(IncomingScheduler::new(
                    Arc::new(reader),
                    &directories.incoming,
                    &config.incoming,
                )),
            }
        });

        Ok(Self {
            feeds: Feeds::new(&context),
            config,
            state: Mutex::new(LifecycleState::NotStarted),
            broker,
            facade,
            registry,
            processors,
            caches,
            ledger,
            pipeline,
        })
    }

    /// Starts the outgoing workers, subscribes every processor and starts
    /// polling the incoming directory. Must be called inside a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyStarted`] on a second call.
    pub fn start(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            if *state != LifecycleState::NotStarted {
                return Err(Error::AlreadyStarted);
            }
            *state = LifecycleState::Running;
        }

        if let Some(pipeline) = &self.pipeline {
            pipeline.outgoing.start()?;
            for processor in &self.processors {
                self.registry.subscribe_processor(processor.clone())?;
            }
            pipeline.incoming.start()?;
        }

        info!(node = %self.config.node_id, enabled = self.config.enabled, "replication started");
        Ok(())
    }

    /// Stops polling, unsubscribes every processor, then drains the outgoing
    /// queue and publishes every open staging file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotRunning`] unless the coordinator is running.
    pub async fn stop(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            if *state != LifecycleState::Running {
                return Err(Error::NotRunning);
            }
            *state = LifecycleState::Stopped;
        }

        if let Some(pipeline) = &self.pipeline {
            pipeline.incoming.stop().await?;
            for processor in &self.processors {
                if !self.registry.stop_processor(processor) {
                    debug!(processor = processor.name(), "processor was not subscribed");
                }
            }
            pipeline.outgoing.stop().await?;
        }

        info!(node = %self.config.node_id, "replication stopped");
        Ok(())
    }

    /// Whether [`start`](Self::start) succeeded and [`stop`](Self::stop) has not been called.
    #[must_use]
    pub fn is_running(&self) -> bool {
        *self.state.lock() == LifecycleState::Running
    }

    /// Whether the pipeline replicates at all.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.pipeline.is_some()
    }

    /// Normalised configuration in use.
    #[must_use]
    pub fn config(&self) -> &ReplicationConfig {
        &self.config
    }

    /// Replication entry points.
    #[must_use]
    pub const fn feeds(&self) -> &Feeds {
        &self.feeds
    }

    /// Fires local stream notifications.
    #[must_use]
    pub const fn facade(&self) -> &Arc<StreamEventFacade> {
        &self.facade
    }

    /// Listener registrations.
    #[must_use]
    pub const fn broker(&self) -> &Arc<EventBroker> {
        &self.broker
    }

    /// Origin to processor routing.
    #[must_use]
    pub const fn registry(&self) -> &Arc<ProcessorRegistry> {
        &self.registry
    }

    /// Project deletion acknowledgements.
    #[must_use]
    pub const fn ledger(&self) -> &Arc<DeletionLedger> {
        &self.ledger
    }

    /// Caches that accept remote evictions.
    #[must_use]
    pub const fn caches(&self) -> &Arc<CacheWatchTable> {
        &self.caches
    }

    /// Makes a cache reachable by remote evictions. Returns `false` if the name was already taken.
    pub fn watch_cache(&self, name: impl Into<String>, cache: Arc<dyn ReplicatedCache>) -> bool {
        self.caches.watch(name, cache)
    }

    /// Where published outgoing files appear.
    #[must_use]
    pub fn outgoing_directory(&self) -> &Path {
        &self.config.directories.outgoing
    }

    /// Where the transport delivers files from other nodes.
    #[must_use]
    pub fn incoming_directory(&self) -> &Path {
        &self.config.directories.incoming
    }

    /// Publishes every open outgoing staging file now.
    pub async fn flush_outgoing(&self) {
        if let Some(pipeline) = &self.pipeline {
            pipeline.outgoing.flush_all().await;
        }
    }

    /// Consumes every file currently in the incoming directory without waiting for the next poll.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotRunning`] unless the coordinator is running, or an
    /// error if the incoming directory cannot be listed.
    pub async fn consume_incoming(&self) -> Result<FileReport> {
        if !self.is_running() {
            return Err(Error::NotRunning);
        }
        match &self.pipeline {
            Some(pipeline) => Ok(pipeline.incoming.run_pass().await?),
            None => Ok(FileReport::default()),
        }
    }
}

fn create_directory(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|source| Error::CreateDirectory {
        path: path.to_path_buf(),
        source,
    })
}
