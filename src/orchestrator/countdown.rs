//! Cosmetic countdown shown while an analysis run is in flight.
//!
//! The ticker runs as its own task and never touches the port calls; the
//! workflow stops it on every exit from Analyzing.

use crate::model::WorkflowEvent;
use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration};

pub struct Countdown {
    remaining: Arc<AtomicU32>,
    ticker: Option<JoinHandle<()>>,
    period: Duration,
    event_tx: Option<UnboundedSender<WorkflowEvent>>,
}

impl Countdown {
    pub fn new(period: Duration, event_tx: Option<UnboundedSender<WorkflowEvent>>) -> Self {
        Self {
            remaining: Arc::new(AtomicU32::new(0)),
            ticker: None,
            period,
            event_tx,
        }
    }

    /// Start from `estimate`, replacing any ticker already running.
    /// Must be called inside a Tokio runtime.
    pub fn start(&mut self, estimate: u32) {
        self.stop();
        self.remaining.store(estimate, Ordering::Relaxed);

        let remaining = self.remaining.clone();
        let event_tx = self.event_tx.clone();
        let period = self.period;
        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(time::Instant::now() + period, period);
            loop {
                interval.tick().await;
                // Clamp at zero; the run may well outlast the estimate.
                let prev = remaining
                    .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1))
                    .unwrap_or(0);
                let now = prev.saturating_sub(1);
                if let Some(tx) = &event_tx {
                    let _ = tx.send(WorkflowEvent::Countdown { remaining: now });
                }
                if now == 0 {
                    break;
                }
            }
        });
        self.ticker = Some(handle);
    }

    /// Cancel the ticker. Safe to call when nothing is running.
    pub fn stop(&mut self) {
        if let Some(handle) = self.ticker.take() {
            // Dropping a JoinHandle does not cancel the task; abort explicitly.
            handle.abort();
        }
        self.remaining.store(0, Ordering::Relaxed);
    }

    /// True from `start` until `stop`, even once the value has reached zero.
    pub fn is_active(&self) -> bool {
        self.ticker.is_some()
    }

    pub fn remaining(&self) -> u32 {
        self.remaining.load(Ordering::Relaxed)
    }

    /// Whether the background task is still alive. Used by tests.
    #[cfg(test)]
    pub(crate) fn task_finished(&self) -> bool {
        self.ticker.as_ref().map(|h| h.is_finished()).unwrap_or(true)
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.stop();
    }
}
