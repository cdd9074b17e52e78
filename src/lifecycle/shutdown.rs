//! Shutdown coordination for the gate.

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::lifecycle::signals::shutdown_signal;

/// Broadcasts a single shutdown notice to the server and its background
/// tasks.
#[derive(Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Notify every subscriber. Returns how many were listening.
    pub fn trigger(&self) -> usize {
        self.tx.send(()).unwrap_or(0)
    }

    /// Trigger once the process receives SIGINT or SIGTERM.
    pub fn trigger_on_signal(&self) -> JoinHandle<()> {
        let shutdown = self.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            let notified = shutdown.trigger();
            tracing::info!(tasks = notified, "Shutdown triggered");
        })
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
