//! Configuration for the replicated event pipeline.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::{Error, Result};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level replication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationConfig {
    /// Gates the whole pipeline.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Identity of the local node.
    pub node_id: String,

    /// Staging directories.
    #[serde(default)]
    pub directories: DirectoryConfig,

    /// Outgoing batching and scheduling.
    pub outgoing: OutgoingConfig,

    /// Incoming scheduling.
    #[serde(default)]
    pub incoming: IncomingConfig,

    /// Per-cache settings, keyed by cache name.
    #[serde(default)]
    pub caches: HashMap<String, CacheConfig>,

    /// Activity stream settings.
    #[serde(default)]
    pub stream: StreamConfig,

    /// Project deletion settings.
    #[serde(default)]
    pub project_deletion: ProjectDeletionConfig,
}

/// Staging directory layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Where outgoing staging files are written and published.
    pub outgoing: PathBuf,

    /// Where published files from other nodes are delivered.
    pub incoming: PathBuf,

    /// Where events that failed to apply are kept.
    pub incoming_failed: PathBuf,
}

impl DirectoryConfig {
    /// Lays the three directories out below `base`.
    pub fn under(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        Self {
            outgoing: base.join("outgoing"),
            incoming: base.join("incoming"),
            incoming_failed: base.join("failed"),
        }
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self::under("replicated_events")
    }
}

/// Outgoing batching thresholds and worker pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutgoingConfig {
    /// A staging file is published once it holds more than this many events.
    pub max_events_before_proposing: u64,

    /// A staging file is published once it has been open longer than this.
    /// Zero or negative means every event is published immediately.
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_before_proposing_ms: i64,

    /// Number of outgoing workers.
    #[serde(default = "default_outgoing_pool")]
    pub worker_pool_size: usize,

    /// Period of the force-flush timer.
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    /// Consecutive failed passes after which staging failures are logged as errors.
    #[serde(default = "default_escalate_after")]
    pub escalate_after: u32,
}

impl OutgoingConfig {
    /// Creates outgoing settings with the given thresholds and default pool sizing.
    #[must_use]
    pub fn new(max_events_before_proposing: u64, max_wait_before_proposing_ms: i64) -> Self {
        Self {
            max_events_before_proposing,
            max_wait_before_proposing_ms,
            worker_pool_size: default_outgoing_pool(),
            flush_interval_ms: default_flush_interval_ms(),
            escalate_after: default_escalate_after(),
        }
    }

    /// Maximum wait before proposing, or `None` when every event is ready immediately.
    #[must_use]
    pub fn max_wait(&self) -> Option<Duration> {
        u64::try_from(self.max_wait_before_proposing_ms)
            .ok()
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    /// Period of the force-flush timer.
    #[must_use]
    pub const fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

/// Incoming scheduling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingConfig {
    /// Number of destinations processed concurrently.
    #[serde(default = "default_incoming_pool")]
    pub worker_pool_size: usize,

    /// How often the incoming directory is scanned.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Write events that failed to apply into the incoming-failed directory.
    #[serde(default = "default_true")]
    pub keep_failed_events: bool,
}

impl IncomingConfig {
    /// Scan period.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for IncomingConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: default_incoming_pool(),
            poll_interval_ms: default_poll_interval_ms(),
            keep_failed_events: true,
        }
    }
}

/// Settings for one cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Reload the key right after evicting it.
    #[serde(default)]
    pub reload_on_evict: bool,

    /// Apply remote evictions at all.
    #[serde(default = "default_true")]
    pub evict: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            reload_on_evict: false,
            evict: true,
        }
    }
}

/// Activity stream settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Simple type names of notifications that are never replicated.
    #[serde(default)]
    pub skip_events: Vec<String>,
}

/// Project deletion settings.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ProjectDeletionConfig {
    /// Keep repositories on disk after a replicated deletion.
    #[serde(default)]
    pub preserve_on_disk: bool,
}

impl ReplicationConfig {
    /// Creates a configuration with default directories and the given thresholds.
    pub fn new(
        node_id: impl Into<String>,
        max_events_before_proposing: u64,
        max_wait_before_proposing_ms: i64,
    ) -> Self {
        Self {
            enabled: true,
            node_id: node_id.into(),
            directories: DirectoryConfig::default(),
            outgoing: OutgoingConfig::new(
                max_events_before_proposing,
                max_wait_before_proposing_ms,
            ),
            incoming: IncomingConfig::default(),
            caches: HashMap::new(),
            stream: StreamConfig::default(),
            project_deletion: ProjectDeletionConfig::default(),
        }
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document does not parse or fails validation.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(contents)?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Loads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, does not parse or fails validation.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    /// Renders the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation fails.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Lower-cases and deduplicates the stream skip-list.
    pub fn normalize(&mut self) {
        let skip = &mut self.stream.skip_events;
        for name in skip.iter_mut() {
            *name = name.trim().to_lowercase();
        }
        skip.retain(|name| !name.is_empty());
        skip.sort();
        skip.dedup();
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<()> {
        if self.node_id.trim().is_empty() {
            return Err(Error::MissingNodeId);
        }

        if self.outgoing.max_events_before_proposing == 0 {
            return Err(Error::InvalidThreshold {
                name: "max_events_before_proposing",
                reason: "must be at least 1".to_string(),
            });
        }

        if self.outgoing.flush_interval_ms == 0 {
            return Err(Error::InvalidThreshold {
                name: "flush_interval_ms",
                reason: "must be positive".to_string(),
            });
        }

        if self.outgoing.worker_pool_size == 0 {
            return Err(Error::InvalidPoolSize("outgoing"));
        }

        if self.incoming.worker_pool_size == 0 {
            return Err(Error::InvalidPoolSize("incoming"));
        }

        Ok(())
    }

    /// Settings for a cache, falling back to defaults for unconfigured caches.
    #[must_use]
    pub fn cache(&self, name: &str) -> CacheConfig {
        self.caches.get(name).copied().unwrap_or_default()
    }

    /// Whether a stream notification with this simple type name is skipped.
    ///
    /// Matching is case-insensitive.
    #[must_use]
    pub fn skips_stream_event(&self, simple_name: &str) -> bool {
        self.stream
            .skip_events
            .iter()
            .any(|skipped| skipped.eq_ignore_ascii_case(simple_name))
    }
}

const fn default_true() -> bool {
    true
}

const fn default_max_wait_ms() -> i64 {
    5_000
}

fn default_outgoing_pool() -> usize {
    num_cpus::get().max(1)
}

const fn default_flush_interval_ms() -> u64 {
    1_000
}

const fn default_escalate_after() -> u32 {
    3
}

const fn default_incoming_pool() -> usize {
    2
}

const fn default_poll_interval_ms() -> u64 {
    500
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const MINIMAL: &str = r#"
        node_id = "node-1"

        [outgoing]
        max_events_before_proposing = 30
    "#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = ReplicationConfig::from_toml(MINIMAL).unwrap();

        assert!(config.enabled);
        assert_eq!(config.outgoing.max_wait_before_proposing_ms, 5_000);
        assert_eq!(config.incoming.worker_pool_size, 2);
        assert_eq!(config.directories.incoming_failed, PathBuf::from("replicated_events/failed"));
        assert_eq!(config.cache("accounts"), CacheConfig::default());
    }

    #[test]
    fn test_max_events_is_required() {
        assert_matches!(
            ReplicationConfig::from_toml("node_id = \"n\"\n[outgoing]\n"),
            Err(Error::Parse(_))
        );
    }

    #[test]
    fn test_skip_list_is_case_insensitive() {
        let config = ReplicationConfig::from_toml(
            r#"
            node_id = "node-1"

            [outgoing]
            max_events_before_proposing = 2

            [stream]
            skip_events = ["CommentAdded", " topicedited ", "COMMENTADDED"]
            "#,
        )
        .unwrap();

        assert_eq!(config.stream.skip_events, vec!["commentadded", "topicedited"]);
        assert!(config.skips_stream_event("commentAdded"));
        assert!(config.skips_stream_event("TopicEdited"));
        assert!(!config.skips_stream_event("ChangeMerged"));
    }

    #[test]
    fn test_non_positive_wait_means_always_ready() {
        assert_eq!(OutgoingConfig::new(5, 0).max_wait(), None);
        assert_eq!(OutgoingConfig::new(5, -1).max_wait(), None);
        assert_eq!(OutgoingConfig::new(5, 250).max_wait(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert_matches!(ReplicationConfig::new(" ", 1, 1).validate(), Err(Error::MissingNodeId));
        assert_matches!(
            ReplicationConfig::new("n", 0, 1).validate(),
            Err(Error::InvalidThreshold { name: "max_events_before_proposing", .. })
        );

        let mut config = ReplicationConfig::new("n", 1, 1);
        config.incoming.worker_pool_size = 0;
        assert_matches!(config.validate(), Err(Error::InvalidPoolSize("incoming")));
    }

    #[test]
    fn test_cache_overrides() {
        let config = ReplicationConfig::from_toml(
            r#"
            node_id = "node-1"

            [outgoing]
            max_events_before_proposing = 2

            [caches.projects]
            reload_on_evict = true

            [caches.web_sessions]
            evict = false
            "#,
        )
        .unwrap();

        assert!(config.cache("projects").reload_on_evict);
        assert!(config.cache("projects").evict);
        assert!(!config.cache("web_sessions").evict);
    }

    #[test]
    fn test_from_file_round_trips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("replication.toml");
        let mut config = ReplicationConfig::new("node-1", 10, 100);
        config.directories = DirectoryConfig::under(dir.path());
        std::fs::write(&path, config.to_toml().unwrap()).unwrap();

        let loaded = ReplicationConfig::from_file(&path).unwrap();
        assert_eq!(loaded.node_id, "node-1");
        assert_eq!(loaded.directories.outgoing, dir.path().join("outgoing"));
    }

    #[test]
    fn test_missing_file() {
        assert_matches!(
            ReplicationConfig::from_file("/definitely/not/here.toml"),
            Err(Error::Read { .. })
        );
    }
}
