use std::path::Path;
use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use replication_broker::{EventContext, Principal, StreamListener};
use replication_config::{DirectoryConfig, ReplicationConfig};
use replication_coordinator::{Capabilities, Error, ReplicatedEventsCoordinator};
use replication_events::{ChangeAttribute, EventMeta, StreamEvent, StreamEventKind};
use replication_incoming::{
    AccountIndexer, CapabilityError, ChangeIndexer, GroupIndexer, ProjectIndexer, ReplicatedCache,
    RepositoryManager,
};
use replication_outgoing::StagingFileName;

#[derive(Default)]
struct Application {
    calls: Mutex<Vec<String>>,
}

impl Application {
    fn record(&self, call: String) -> Result<(), CapabilityError> {
        self.calls.lock().push(call);
        Ok(())
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ChangeIndexer for Application {
    async fn index_no_repl(&self, project: &str, change_id: u32) -> Result<(), CapabilityError> {
        self.record(format!("index change {project}/{change_id}"))
    }

    async fn delete_no_repl(&self, project: &str, change_id: u32) -> Result<(), CapabilityError> {
        self.record(format!("delete change {project}/{change_id}"))
    }
}

#[async_trait]
impl AccountIndexer for Application {
    async fn index_no_repl(&self, account_id: u32) -> Result<(), CapabilityError> {
        self.record(format!("index account {account_id}"))
    }
}

#[async_trait]
impl GroupIndexer for Application {
    async fn index_no_repl(&self, group_uuid: &str) -> Result<(), CapabilityError> {
        self.record(format!("index group {group_uuid}"))
    }
}

#[async_trait]
impl ProjectIndexer for Application {
    async fn index_no_repl(&self, project: &str) -> Result<(), CapabilityError> {
        self.record(format!("index project {project}"))
    }

    async fn delete_no_repl(&self, project: &str) -> Result<(), CapabilityError> {
        self.record(format!("delete project {project}"))
    }
}

#[async_trait]
impl RepositoryManager for Application {
    async fn close_and_evict(&self, project: &str) -> Result<bool, CapabilityError> {
        self.record(format!("close {project}"))?;
        Ok(true)
    }
}

#[derive(Default)]
struct ProjectCache {
    evicted: Mutex<Vec<serde_json::Value>>,
}

impl ReplicatedCache for ProjectCache {
    fn evict(&self, key: &serde_json::Value) {
        self.evicted.lock().push(key.clone());
    }

    fn reload(&self, _key: &serde_json::Value) -> Result<(), CapabilityError> {
        Ok(())
    }
}

#[derive(Default)]
struct Listener {
    seen: Mutex<Vec<(String, EventContext)>>,
}

impl StreamListener for Listener {
    fn on_stream_event(&self, event: &StreamEvent, context: &EventContext) {
        self.seen.lock().push((event.kind.simple_name().to_string(), context.clone()));
    }
}

struct Node {
    _dir: tempfile::TempDir,
    app: Arc<Application>,
    coordinator: ReplicatedEventsCoordinator,
}

fn node(node_id: &str, enabled: bool) -> Node {
    let dir = tempfile::tempdir().unwrap();
    let mut config = ReplicationConfig::new(node_id, 100, 60_000);
    config.enabled = enabled;
    config.directories = DirectoryConfig::under(dir.path());
    config.incoming.poll_interval_ms = 60_000;

    let app = Arc::new(Application::default());
    let capabilities =
        Capabilities::new(app.clone(), app.clone(), app.clone(), app.clone(), app.clone());
    let coordinator = ReplicatedEventsCoordinator::new(config, capabilities).unwrap();
    Node {
        _dir: dir,
        app,
        coordinator,
    }
}

fn comment_added(node: &str) -> StreamEvent {
    StreamEvent::new(
        EventMeta::new(node, 1_700_000_000_000, 1),
        StreamEventKind::CommentAdded {
            change: ChangeAttribute {
                project: "ProjectA".to_string(),
                branch: "main".to_string(),
                number: 17,
                id: "I0000000000000000000000000000000000000017".to_string(),
                subject: "Add frobnicator".to_string(),
                topic: None,
            },
            patch_set: 2,
            author: 1000,
            comment: "Looks good".to_string(),
            approvals: Vec::new(),
        },
    )
}

fn published(directory: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(directory)
        .unwrap()
        .filter_map(|entry| entry.unwrap().file_name().to_str().map(str::to_string))
        .filter(|name| StagingFileName::parse(name).is_some())
        .collect();
    names.sort();
    names
}

async fn wait_for_published(coordinator: &ReplicatedEventsCoordinator) {
    for _ in 0..100 {
        coordinator.flush_outgoing().await;
        if !published(coordinator.outgoing_directory()).is_empty() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("nothing was published");
}

fn transfer(from: &Path, to: &Path) -> usize {
    let names = published(from);
    for name in &names {
        std::fs::copy(from.join(name), to.join(name)).unwrap();
    }
    names.len()
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_events_cross_between_two_nodes_once() {
    let a = node("node-a", true);
    let b = node("node-b", true);
    let cache = Arc::new(ProjectCache::default());
    assert!(b.coordinator.watch_cache("projects", cache.clone()));
    let listener = Arc::new(Listener::default());
    b.coordinator.broker().register_listener(listener.clone());
    a.coordinator.start().unwrap();
    b.coordinator.start().unwrap();

    a.coordinator
        .facade()
        .fire(&comment_added("node-a"), &EventContext::local(Principal::Internal));
    let feeds = a.coordinator.feeds();
    feeds.cache.replicate_eviction("projects", serde_json::json!("ProjectA"), Some("ProjectA"));
    feeds.account_index.replicate_account_reindex(1000);
    feeds.index.replicate_change_reindex("ProjectA", 17);
    a.coordinator.stop().await.unwrap();

    let files = transfer(a.coordinator.outgoing_directory(), b.coordinator.incoming_directory());
    assert_eq!(files, 2);

    let report = b.coordinator.consume_incoming().await.unwrap();
    assert_eq!(report.dispatched, 4);
    assert_eq!(report.failed, 0);

    let seen = listener.seen.lock().clone();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, "CommentAdded");
    assert_eq!(seen[0].1, EventContext::replayed("node-a"));
    assert_eq!(*cache.evicted.lock(), vec![serde_json::json!("ProjectA")]);
    let mut calls = b.app.calls();
    calls.sort();
    assert_eq!(calls, vec!["index account 1000", "index change ProjectA/17"]);
    assert!(a.app.calls().is_empty());

    b.coordinator.stop().await.unwrap();
    assert!(published(b.coordinator.outgoing_directory()).is_empty());
    assert!(published(b.coordinator.incoming_directory()).is_empty());
    assert!(logs_contain("replication stopped"));
}

#[tokio::test]
async fn test_project_deletion_is_acknowledged_back() {
    let a = node("node-a", true);
    let b = node("node-b", true);
    a.coordinator.start().unwrap();
    b.coordinator.start().unwrap();

    let task_id = a
        .coordinator
        .feeds()
        .project
        .replicate_project_deletion("ProjectA", false)
        .unwrap();
    wait_for_published(&a.coordinator).await;
    transfer(a.coordinator.outgoing_directory(), b.coordinator.incoming_directory());
    b.coordinator.consume_incoming().await.unwrap();
    assert_eq!(b.app.calls(), vec!["close ProjectA"]);
    assert!(b.coordinator.ledger().released_locally(&task_id));

    b.coordinator.stop().await.unwrap();
    transfer(b.coordinator.outgoing_directory(), a.coordinator.incoming_directory());
    a.coordinator.consume_incoming().await.unwrap();

    assert_eq!(a.coordinator.ledger().acknowledged_by(&task_id), vec!["node-b"]);
    assert!(a.coordinator.ledger().delete_from_disk(&task_id));
    assert_eq!(a.coordinator.ledger().project(&task_id).as_deref(), Some("ProjectA"));
    a.coordinator.stop().await.unwrap();
}

#[tokio::test]
async fn test_lifecycle_misuse_is_rejected() {
    let a = node("node-a", true);

    assert_matches!(a.coordinator.stop().await, Err(Error::NotRunning));
    assert_matches!(a.coordinator.consume_incoming().await, Err(Error::NotRunning));
    a.coordinator.start().unwrap();
    assert!(a.coordinator.is_running());
    assert_matches!(a.coordinator.start(), Err(Error::AlreadyStarted));
    a.coordinator.stop().await.unwrap();
    assert_matches!(a.coordinator.stop().await, Err(Error::NotRunning));
    assert_matches!(a.coordinator.start(), Err(Error::AlreadyStarted));
}

#[tokio::test]
async fn test_disabled_node_delivers_locally_only() {
    let a = node("node-a", false);
    let listener = Arc::new(Listener::default());
    a.coordinator.broker().register_listener(listener.clone());
    a.coordinator.start().unwrap();

    let delivery = a
        .coordinator
        .facade()
        .fire(&comment_added("node-a"), &EventContext::local(Principal::Internal));
    a.coordinator.feeds().account_index.replicate_account_reindex(1);
    a.coordinator.stop().await.unwrap();

    assert!(!a.coordinator.is_enabled());
    assert_eq!(delivery.delivered, 1);
    assert_eq!(listener.seen.lock().len(), 1);
    assert!(!a.coordinator.outgoing_directory().exists());
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = ReplicationConfig::new("", 100, 0);
    config.directories = DirectoryConfig::under(dir.path());
    let app = Arc::new(Application::default());
    let capabilities = Capabilities::new(app.clone(), app.clone(), app.clone(), app.clone(), app);

    let result = ReplicatedEventsCoordinator::new(config, capabilities);

    assert_matches!(result, Err(Error::Config(_)));
    assert!(!dir.path().join("outgoing").exists());
}
