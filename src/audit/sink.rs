//! Durable destinations for security log entries.

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use crate::audit::{AuditError, SecurityLogEntry};
use crate::observability::metrics;

/// A write-only destination for audit entries.
///
/// `write` runs on the request path and must not block.
pub trait AuditSink: Send + Sync {
    fn write(&self, entry: &SecurityLogEntry) -> Result<(), AuditError>;
}

/// Appends one JSON document per line.
///
/// Lines are encoded on the caller and handed to a writer task, which owns
/// the file.
pub struct JsonlSink {
    path: PathBuf,
    lines: mpsc::UnboundedSender<Vec<u8>>,
}

impl JsonlSink {
    /// Open (or create) the file and start its writer on the current
    /// Tokio runtime.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let runtime = tokio::runtime::Handle::try_current()?;
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        let (lines, receiver) = mpsc::unbounded_channel();
        runtime.spawn(write_lines(tokio::fs::File::from_std(file), path.clone(), receiver));

        Ok(Self { path, lines })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for JsonlSink {
    fn write(&self, entry: &SecurityLogEntry) -> Result<(), AuditError> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');
        self.lines.send(line).map_err(|_| AuditError::WriterClosed)
    }
}

/// Drain encoded lines into the file until every sender is gone.
async fn write_lines(mut file: tokio::fs::File, path: PathBuf, mut lines: mpsc::UnboundedReceiver<Vec<u8>>) {
    while let Some(line) = lines.recv().await {
        let written = match file.write_all(&line).await {
            Ok(()) => file.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            tracing::warn!(path = ?path, error = %e, "Failed to persist security event");
            metrics::record_audit_write_failure();
        }
    }
    tracing::debug!(path = ?path, "Security log writer stopped");
}

/// Read a JSON-lines security log. A missing file is an empty log;
/// unreadable lines are skipped with a warning.
pub fn read_jsonl(path: impl AsRef<Path>) -> Result<Vec<SecurityLogEntry>, AuditError> {
    read_jsonl_tail(path, usize::MAX)
}

/// Like [`read_jsonl`], keeping only the last `limit` entries.
pub fn read_jsonl_tail(path: impl AsRef<Path>, limit: usize) -> Result<Vec<SecurityLogEntry>, AuditError> {
    let path = path.as_ref();
    if !path.exists() || limit == 0 {
        return Ok(Vec::new());
    }

    let reader = BufReader::new(File::open(path)?);
    let mut entries = VecDeque::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(entry) => {
                if entries.len() == limit {
                    entries.pop_front();
                }
                entries.push_back(entry);
            }
            Err(e) => tracing::warn!(path = ?path, line = number + 1, error = %e, "Skipping malformed security log line"),
        }
    }
    Ok(entries.into())
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::Duration;

    use super::*;
    use crate::audit::{AuditLog, SecurityEventType};
    use crate::config::AuditConfig;

    fn temp_log() -> PathBuf {
        std::env::temp_dir().join(format!("admin-gate-audit-{}.jsonl", uuid::Uuid::new_v4()))
    }

    async fn wait_for_lines(path: &Path, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while read_jsonl(path).unwrap().len() < count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("writer did not catch up");
    }

    #[tokio::test]
    async fn test_log_survives_restart() {
        let path = temp_log();
        let config = AuditConfig {
            persistence_path: Some(path.to_string_lossy().into_owned()),
            ..AuditConfig::default()
        };

        let log = AuditLog::open(&config).unwrap();
        log.append(
            SecurityLogEntry::new(SecurityEventType::LoginLocked, "10.0.0.5".parse().ok(), "ua")
                .with_detail("attempts", 5),
        );
        wait_for_lines(&path, 1).await;
        drop(log);

        // Garbage lines are skipped, not fatal.
        std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap()
            .write_all(b"{not json}\n")
            .unwrap();

        let reopened = AuditLog::open(&config).unwrap();
        let entries = reopened.recent(10);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event_type, SecurityEventType::LoginLocked);
        assert_eq!(entries[0].details["attempts"], 5);

        std::fs::remove_file(&path).unwrap_or_default();
    }

    #[tokio::test]
    async fn test_replay_keeps_only_the_tail() {
        let path = temp_log();
        let config = AuditConfig {
            persistence_path: Some(path.to_string_lossy().into_owned()),
            retained_entries: 100,
        };

        let log = AuditLog::open(&config).unwrap();
        for attempt in 0..250 {
            log.append(
                SecurityLogEntry::new(SecurityEventType::LoginFailed, None, "ua").with_detail("attempt", attempt),
            );
        }
        wait_for_lines(&path, 250).await;
        drop(log);

        let reopened = AuditLog::open(&config).unwrap();
        assert_eq!(reopened.len(), 100);
        assert_eq!(reopened.recent(1)[0].details["attempt"], 249);
        assert_eq!(reopened.of_type(SecurityEventType::LoginFailed)[0].details["attempt"], 150);

        let tail = read_jsonl_tail(&path, 3).unwrap();
        assert_eq!(tail.len(), 3);
        assert_eq!(tail[0].details["attempt"], 247);

        std::fs::remove_file(&path).unwrap_or_default();
    }

    #[test]
    fn test_open_needs_a_runtime() {
        assert!(matches!(JsonlSink::open(temp_log()), Err(AuditError::Runtime(_))));
    }

    #[test]
    fn test_missing_file_is_empty() {
        assert!(read_jsonl("/nonexistent/admin-gate.jsonl").unwrap().is_empty());
    }
}
