//! Background expiry sweep.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Something the sweeper can periodically clean.
pub(crate) trait SweepTarget: Send + Sync + 'static {
    /// Remove expired entries and return how many went.
    fn sweep(&self) -> usize;

    /// Log the current counters.
    fn emit_summary(&self, reason: &str);
}

/// Running sweep task plus the channel that stops it.
pub(crate) struct SweeperHandle {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signal the task to exit. The task finishes its current tick, if any.
    pub(crate) fn signal_stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Signal the task and wait for it to exit.
    pub(crate) async fn join(self) {
        self.signal_stop();
        let _ = self.handle.await;
    }
}

/// Spawn a task that sweeps `target` every `period`.
///
/// Must be called from within a tokio runtime. Emits a final `shutdown`
/// summary when stopped.
pub(crate) fn spawn(target: Arc<dyn SweepTarget>, period: Duration) -> SweeperHandle {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(async move {
        info!(interval_ms = period.as_millis() as u64, "Cache sweeper started");
        let mut interval = tokio::time::interval(period);
        interval.tick().await; // skip first immediate tick

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let removed = target.sweep();
                    debug!(removed, "Cache sweep tick");
                    target.emit_summary("periodic");
                }
                changed = shutdown_rx.changed() => {
                    // A dropped sender also means nobody can restart us.
                    if changed.is_err() || *shutdown_rx.borrow() {
                        target.emit_summary("shutdown");
                        break;
                    }
                }
            }
        }
        info!("Cache sweeper stopped");
    });
    SweeperHandle {
        shutdown_tx,
        handle,
    }
}
