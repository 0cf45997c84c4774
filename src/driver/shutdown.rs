//! Cooperative shutdown signal
//!
//! Loops check the signal between steps and while sleeping or waiting for
//! the next reading. An HTTP request already in flight is never cut short.

use tokio::sync::watch;
use tracing::{info, warn};

/// Fires the shutdown signal
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }
}

/// Observes the shutdown signal
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

/// Create a linked trigger/observer pair
pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

impl Shutdown {
    /// A signal fired by Ctrl+C
    pub fn on_ctrl_c() -> Self {
        let (trigger, shutdown) = channel();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("[LOOP] Interrupt received");
                    trigger.trigger();
                }
                Err(e) => {
                    // Without a handler the process can only be killed
                    warn!("[LOOP] Unable to listen for Ctrl+C: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        });
        shutdown
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once the signal fires; never resolves if the trigger is gone
    pub async fn wait(&mut self) {
        if self.rx.wait_for(|stopped| *stopped).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
