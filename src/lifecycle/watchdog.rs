//! Shutdown watchdog.
//!
//! # Responsibilities
//! - Race a timer against the shutdown sequence
//! - Terminate the process if the budget elapses first
//!
//! # Design Decisions
//! - Runs as its own tokio task so a hung close cannot starve it
//! - The abrupt exit bypasses every remaining cleanup step
//! - The terminating side effect is injectable for tests

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::observability::metrics;

/// Exit status used when the watchdog forces termination.
pub const FORCED_TERMINATION_EXIT_CODE: i32 = 255;

/// The side effect performed when the watchdog expires.
pub trait Terminator: Send + Sync {
    fn terminate(&self, budget: Duration);
}

/// Prints a diagnostic and exits the process immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessExit;

impl Terminator for ProcessExit {
    fn terminate(&self, budget: Duration) {
        tracing::error!(budget_secs = budget.as_secs_f64(), "Shutdown budget exceeded");
        println!("Timed out on shutdown, terminating...");
        std::process::exit(FORCED_TERMINATION_EXIT_CODE);
    }
}

/// An armed watchdog. Disarm it once shutdown completes.
pub struct Watchdog {
    disarm: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
    fired: Arc<AtomicBool>,
}

impl Watchdog {
    /// Start the countdown.
    pub fn arm(budget: Duration, terminator: Arc<dyn Terminator>) -> Self {
        let (disarm, disarmed) = oneshot::channel();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();

        let task = tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(budget) => {
                    flag.store(true, Ordering::SeqCst);
                    metrics::record_watchdog_fired();
                    terminator.terminate(budget);
                }
                // A dropped sender is not a disarm; only `disarm` stops the countdown.
                Ok(()) = disarmed => {}
            }
        });

        Self {
            disarm: Some(disarm),
            task,
            fired,
        }
    }

    pub fn fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Stop the countdown, returning whether it had already fired.
    pub async fn disarm(mut self) -> bool {
        if let Some(tx) = self.disarm.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            tracing::warn!(error = %e, "Watchdog task ended abnormally");
        }
        self.fired()
    }
}
