//! Cooperative shutdown signal shared by all tailing workers.
//!
//! Workers poll `is_stopped` at loop granularity and await `stopped` inside
//! interruptible waits, so shutdown latency is bounded by a loop iteration
//! rather than the poll interval.

use tokio::sync::watch;

/// Sender half, held by the host. Flipping it is idempotent.
pub struct StopHandle {
    tx: watch::Sender<bool>,
}

impl StopHandle {
    pub fn stop(&self) {
        let _ = self.tx.send(true);
    }

    pub fn signal(&self) -> StopSignal {
        StopSignal {
            rx: self.tx.subscribe(),
        }
    }
}

/// Receiver half, cloned into every worker.
#[derive(Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    /// Non-blocking check, safe to call every loop iteration.
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the stop flag is raised. Also resolves if the handle
    /// was dropped, so workers never hang on an abandoned signal.
    pub async fn stopped(&mut self) {
        loop {
            if *self.rx.borrow() {
                return;
            }
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

pub fn stop_channel() -> (StopHandle, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (StopHandle { tx }, StopSignal { rx })
}
