/// Periodic REST refresh scheduling
///
/// One active task per purpose: starting a purpose that is already running
/// stops the old task first, so repeated start calls never leak timers.
/// Stopping prevents future ticks and deactivates the handle's gate; a fetch
/// already in flight is allowed to complete, but its result is discarded by
/// whoever consults the gate before applying.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::Result;

/// Named category of periodic refresh, used to deduplicate timers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PollPurpose {
    /// Market overview cycle (status gate, snapshot, breadth)
    Market,
    /// Recent-trades refresh
    Trades,
}

impl PollPurpose {
    pub fn label(&self) -> &'static str {
        match self {
            PollPurpose::Market => "market",
            PollPurpose::Trades => "trades",
        }
    }
}

/// Still-active flag handed to each fetch cycle
///
/// Consulted after the fetch completes and before its result is applied, so
/// a cycle finishing after `stop` renders nothing.
#[derive(Debug, Clone)]
pub struct PollGate {
    active: Arc<AtomicBool>,
}

impl PollGate {
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub(crate) fn always_active() -> Self {
        Self {
            active: Arc::new(AtomicBool::new(true)),
        }
    }
}

/// Handle to one running periodic task
#[derive(Debug)]
pub struct PollHandle {
    purpose: PollPurpose,
    active: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl PollHandle {
    pub fn purpose(&self) -> PollPurpose {
        self.purpose
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// No further ticks fire; in-flight cycles are gated off
    pub fn stop(&self) {
        self.active.store(false, Ordering::SeqCst);
        self.task.abort();
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        self.task.abort();
    }
}

/// Owner of all periodic refresh tasks
#[derive(Debug, Default)]
pub struct PollScheduler {
    active: HashMap<PollPurpose, PollHandle>,
}

impl PollScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a periodic fetch cycle for `purpose`
    ///
    /// Any task already running for the purpose is stopped first. The first
    /// cycle runs immediately, then once per interval. A slow cycle does not
    /// suppress the next tick: cycles interleave, and the reconciler's
    /// idempotent-overwrite policy absorbs the ordering race.
    pub fn start_periodic<F, Fut>(
        &mut self,
        purpose: PollPurpose,
        interval: Duration,
        fetch: F,
    ) -> PollGate
    where
        F: Fn(PollGate) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if let Some(existing) = self.active.remove(&purpose) {
            debug!("replacing active {} poll", purpose.label());
            existing.stop();
        }

        let active = Arc::new(AtomicBool::new(true));
        let gate = PollGate {
            active: Arc::clone(&active),
        };

        let tick_active = Arc::clone(&active);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if !tick_active.load(Ordering::SeqCst) {
                    break;
                }
                let cycle_gate = PollGate {
                    active: Arc::clone(&tick_active),
                };
                tokio::spawn(fetch(cycle_gate));
            }
        });

        self.active.insert(
            purpose,
            PollHandle {
                purpose,
                active,
                task,
            },
        );
        gate
    }

    /// Stop the task for `purpose`, if one is running
    pub fn stop(&mut self, purpose: PollPurpose) {
        if let Some(handle) = self.active.remove(&purpose) {
            debug!("stopping {} poll", purpose.label());
            handle.stop();
        }
    }

    pub fn is_running(&self, purpose: PollPurpose) -> bool {
        self.active
            .get(&purpose)
            .map(|handle| handle.is_active())
            .unwrap_or(false)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Page teardown: stop everything
    pub fn stop_all(&mut self) {
        for (_, handle) in self.active.drain() {
            handle.stop();
        }
    }
}

/// One-shot request flow
///
/// Failures propagate to the caller, which is responsible for surfacing them
/// inline; they are never an unhandled fault.
pub async fn run_once<T, Fut>(fetch: Fut) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    match fetch.await {
        Ok(value) => Ok(value),
        Err(e) => {
            debug!("one-shot fetch failed: {}", e);
            Err(e)
        }
    }
}
