use std::path::{Path, PathBuf};
use std::sync::Arc;

use replication_events::Envelope;
use replication_outgoing::StagingFileName;
use tokio::fs;
use tracing::{debug, error, warn};

use crate::{Error, ProcessorRegistry, Result};

/// Outcome of consuming one published file.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FileReport {
    /// Events applied by their processor.
    pub dispatched: usize,
    /// Events skipped because they could not be routed, decoded or applied.
    pub failed: usize,
}

/// A published file waiting in the incoming directory.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IncomingFile {
    /// Parsed file name.
    pub name: StagingFileName,
    /// Full path.
    pub path: PathBuf,
}

/// Lists published files in `directory`, oldest first. Temporary and foreign files are ignored.
///
/// # Errors
///
/// Fails if the directory cannot be read.
pub async fn list_published(directory: &Path) -> Result<Vec<IncomingFile>> {
    let io = |operation: &'static str| {
        move |source: std::io::Error| Error::Io {
            operation,
            path: directory.to_path_buf(),
            source,
        }
    };

    let mut entries = fs::read_dir(directory)
        .await
        .map_err(io("error reading directory"))?;
    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(io("error reading directory entry"))?
    {
        let Some(file_name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if let Some(name) = StagingFileName::parse(&file_name) {
            files.push(IncomingFile {
                name,
                path: entry.path(),
            });
        }
    }

    files.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
    Ok(files)
}

/// Reads published files and dispatches each event to its processor.
pub struct IncomingEventReader {
    registry: Arc<ProcessorRegistry>,
    failed_directory: PathBuf,
    keep_failed_events: bool,
}

impl IncomingEventReader {
    /// Creates a reader that dispatches through `registry`.
    pub fn new(
        registry: Arc<ProcessorRegistry>,
        failed_directory: impl Into<PathBuf>,
        keep_failed_events: bool,
    ) -> Self {
        Self {
            registry,
            failed_directory: failed_directory.into(),
            keep_failed_events,
        }
    }

    /// Applies every event in `path`, in file order, then removes the file.
    ///
    /// A bad event is logged and skipped; it never stops the events after it.
    /// Skipped events are written to the incoming-failed directory when enabled.
    ///
    /// # Errors
    ///
    /// Fails only if the file cannot be read or removed. An unreadable file is
    /// moved to the incoming-failed directory.
    pub async fn process_file(&self, path: &Path) -> Result<FileReport> {
        let contents = match fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(source) => {
                error!(file = %path.display(), error = %source, "cannot read incoming file");
                self.quarantine(path).await;
                return Err(Error::Io {
                    operation: "error reading",
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let mut report = FileReport::default();
        let mut failed_lines = Vec::new();

        for (index, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match self.apply_line(line).await {
                Ok(()) => report.dispatched += 1,
                Err(e) => {
                    report.failed += 1;
                    error!(
                        file = %path.display(),
                        line = index + 1,
                        permanent = e.is_permanent(),
                        error = %e,
                        "skipping replicated event"
                    );
                    failed_lines.push(line);
                }
            }
        }

        if !failed_lines.is_empty() && self.keep_failed_events {
            self.write_failed(path, &failed_lines).await;
        }

        fs::remove_file(path).await.map_err(|source| Error::Io {
            operation: "error removing",
            path: path.to_path_buf(),
            source,
        })?;

        debug!(
            file = %path.display(),
            dispatched = report.dispatched,
            failed = report.failed,
            "consumed incoming file"
        );
        Ok(report)
    }

    async fn apply_line(&self, line: &str) -> Result<()> {
        let envelope = Envelope::from_json_line(line)?;
        self.registry.dispatch(&envelope).await
    }

    async fn write_failed(&self, path: &Path, lines: &[&str]) {
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            return;
        };
        let target = self.failed_directory.join(format!("failed_{name}"));
        let mut contents = lines.join("\n");
        contents.push('\n');

        if let Err(e) = fs::create_dir_all(&self.failed_directory).await {
            warn!(
                directory = %self.failed_directory.display(),
                error = %e,
                "cannot create incoming-failed directory"
            );
            return;
        }
        if let Err(e) = fs::write(&target, contents).await {
            warn!(file = %target.display(), error = %e, "cannot keep failed events");
        }
    }

    async fn quarantine(&self, path: &Path) {
        let Some(name) = path.file_name() else {
            return;
        };
        let target = self.failed_directory.join(name);
        if let Err(e) = fs::create_dir_all(&self.failed_directory).await {
            warn!(
                directory = %self.failed_directory.display(),
                error = %e,
                "cannot create incoming-failed directory"
            );
            return;
        }
        if let Err(e) = fs::rename(path, &target).await {
            warn!(file = %path.display(), error = %e, "cannot move unreadable file aside");
        }
    }
}
