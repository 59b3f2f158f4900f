use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{Error, Result};
use crate::naming::StagingFileName;

/// Batching thresholds shared by every writer.
#[derive(Clone, Debug)]
pub struct WriterSettings {
    /// Directory staging files are written and published into.
    pub directory: PathBuf,
    /// Publish once more than this many events were written.
    pub max_events: u64,
    /// Publish once the file has been open longer than this. `None` means always ready.
    pub max_wait: Option<Duration>,
}

/// Appends serialised envelopes for one destination to a temporary staging
/// file, then publishes it with an atomic rename.
#[derive(Debug)]
pub struct PersistedEventWriter {
    destination: String,
    name: StagingFileName,
    tmp_path: PathBuf,
    final_path: PathBuf,
    file: Option<File>,
    events_written: u64,
    opened_at: Instant,
    max_events: u64,
    max_wait: Option<Duration>,
    published: bool,
}

impl PersistedEventWriter {
    /// Creates a writer whose file is named after its first event.
    ///
    /// Nothing touches the disk until the first [`stage`](Self::stage) or
    /// [`publish`](Self::publish).
    #[must_use]
    pub fn new(
        settings: &WriterSettings,
        destination: &str,
        originating_node: &str,
        event_timestamp: i64,
        event_nano_time: i64,
    ) -> Self {
        let name =
            StagingFileName::new(destination, originating_node, event_timestamp, event_nano_time);
        Self {
            destination: destination.to_string(),
            tmp_path: settings.directory.join(name.tmp_name()),
            final_path: settings.directory.join(name.to_string()),
            name,
            file: None,
            events_written: 0,
            opened_at: Instant::now(),
            max_events: settings.max_events,
            max_wait: settings.max_wait,
            published: false,
        }
    }

    /// Destination this writer stages for.
    #[must_use]
    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Name the file is published under.
    #[must_use]
    pub const fn file_name(&self) -> &StagingFileName {
        &self.name
    }

    /// Path of the temporary file.
    #[must_use]
    pub fn tmp_path(&self) -> &Path {
        &self.tmp_path
    }

    /// Path of the published file.
    #[must_use]
    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    /// Number of events appended so far.
    #[must_use]
    pub const fn events_written(&self) -> u64 {
        self.events_written
    }

    /// Whether the file has been renamed into place.
    #[must_use]
    pub const fn is_published(&self) -> bool {
        self.published
    }

    /// Appends one serialised envelope as a line and returns the new event count.
    ///
    /// # Errors
    ///
    /// Fails if the writer is published, the directory cannot be created or the append fails.
    pub async fn stage(&mut self, line: &[u8]) -> Result<u64> {
        if self.published {
            return Err(Error::AlreadyPublished(self.destination.clone()));
        }

        let tmp_path = self.tmp_path.clone();
        let file = self.open().await?;
        let mut record = Vec::with_capacity(line.len() + 1);
        record.extend_from_slice(line);
        record.push(b'\n');
        file.write_all(&record).await.map_err(|source| Error::Io {
            operation: "error appending to",
            path: tmp_path.clone(),
            source,
        })?;
        file.flush().await.map_err(|source| Error::Io {
            operation: "error flushing",
            path: tmp_path,
            source,
        })?;

        self.events_written += 1;
        Ok(self.events_written)
    }

    /// True when the event count exceeds the maximum, the file has been open
    /// longer than the maximum wait, or the maximum wait is non-positive.
    #[must_use]
    pub fn is_ready_to_publish(&self) -> bool {
        self.exceeds_max_events() || self.wait_expired()
    }

    /// Whether more than the maximum number of events were written.
    #[must_use]
    pub const fn exceeds_max_events(&self) -> bool {
        self.events_written > self.max_events
    }

    /// Whether the file has been open longer than the maximum wait.
    #[must_use]
    pub fn wait_expired(&self) -> bool {
        self.max_wait.is_none_or(|max_wait| self.opened_at.elapsed() > max_wait)
    }

    /// Syncs the temporary file and atomically renames it to its final name.
    ///
    /// A writer that never staged anything publishes an empty file.
    ///
    /// # Errors
    ///
    /// Fails if the writer is already published or the file cannot be synced or renamed.
    pub async fn publish(&mut self) -> Result<PathBuf> {
        if self.published {
            return Err(Error::AlreadyPublished(self.destination.clone()));
        }

        let tmp_path = self.tmp_path.clone();
        let file = self.open().await?;
        file.sync_all().await.map_err(|source| Error::Io {
            operation: "error syncing",
            path: tmp_path.clone(),
            source,
        })?;
        self.file = None;

        fs::rename(&tmp_path, &self.final_path)
            .await
            .map_err(|source| Error::Io {
                operation: "error renaming",
                path: tmp_path,
                source,
            })?;
        self.published = true;

        debug!(
            destination = %self.destination,
            events = self.events_written,
            file = %self.name,
            "published staging file"
        );
        Ok(self.final_path.clone())
    }

    async fn open(&mut self) -> Result<&mut File> {
        if self.file.is_none() {
            if let Some(parent) = self.tmp_path.parent() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|source| Error::CreateDirectory {
                        path: parent.to_path_buf(),
                        source,
                    })?;
            }

            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.tmp_path)
                .await
                .map_err(|source| Error::Io {
                    operation: "error opening",
                    path: self.tmp_path.clone(),
                    source,
                })?;
            self.file = Some(file);
        }

        self.file.as_mut().ok_or(Error::AlreadyPublished(self.destination.clone()))
    }
}
