//! Hot reload of the configuration file.
//!
//! The parent directory is watched rather than the file itself, so editors
//! that save by writing a temp file and renaming it over the original keep
//! triggering reloads. Saves that leave the content unchanged and edits that
//! fail to parse or validate are dropped; the running configuration stays in
//! place.

use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::config::loader::parse_config;
use crate::config::schema::GateConfig;

const POLL_INTERVAL: Duration = Duration::from_secs(2);

pub struct ConfigWatcher {
    path: PathBuf,
    updates: mpsc::UnboundedSender<GateConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and the receiving end of validated configs.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<GateConfig>) {
        let (updates, receiver) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            updates,
        };
        (watcher, receiver)
    }

    /// Start watching. Reloads stop when the returned handle is dropped.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let directory = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name: Option<OsString> = self.path.file_name().map(OsStr::to_os_string);
        let last_seen = Mutex::new(fs::read_to_string(&self.path).ok());
        let path = self.path.clone();
        let updates = self.updates;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if touches(&event, file_name.as_deref()) => {
                    reload(&path, &last_seen, &updates);
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default().with_poll_interval(POLL_INTERVAL),
        )?;
        watcher.watch(&directory, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

fn touches(event: &Event, file_name: Option<&OsStr>) -> bool {
    (event.kind.is_modify() || event.kind.is_create())
        && event.paths.iter().any(|p| p.file_name() == file_name)
}

/// Forward the file's configuration if its content changed and is valid.
/// Returns whether an update was sent.
fn reload(
    path: &Path,
    last_seen: &Mutex<Option<String>>,
    updates: &mpsc::UnboundedSender<GateConfig>,
) -> bool {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!(path = ?path, error = %e, "Config file unreadable, keeping current configuration");
            return false;
        }
    };

    {
        let mut last_seen = last_seen.lock();
        if last_seen.as_deref() == Some(content.as_str()) {
            return false;
        }
        *last_seen = Some(content.clone());
    }

    match parse_config(&content) {
        Ok(config) => {
            tracing::info!(path = ?path, "Config file changed, reloading");
            updates.send(config).is_ok()
        }
        Err(e) => {
            tracing::error!(path = ?path, error = %e, "Rejected config change, keeping current configuration");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reload_only_forwards_valid_changes() {
        let path = std::env::temp_dir().join(format!("admin-gate-{}.toml", uuid::Uuid::new_v4()));
        fs::write(&path, "[rate_limit]\nmax_attempts = 5\n").unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let last_seen = Mutex::new(fs::read_to_string(&path).ok());

        // Touch without a content change.
        assert!(!reload(&path, &last_seen, &tx));

        fs::write(&path, "[rate_limit]\nmax_attempts = 0\n").unwrap();
        assert!(!reload(&path, &last_seen, &tx));

        fs::write(&path, "[rate_limit]\nmax_attempts = 3\n").unwrap();
        assert!(reload(&path, &last_seen, &tx));
        assert_eq!(rx.try_recv().unwrap().rate_limit.max_attempts, 3);
        assert!(rx.try_recv().is_err());

        fs::remove_file(&path).unwrap();
        assert!(!reload(&path, &last_seen, &tx));
    }
}
