//! # Schedule
//!
//! Fixed-interval polling loops that can be cancelled without leaking stale
//! writes.
//!
//! Every loop owns a generation counter. Each tick receives a [`Ticket`]
//! stamped with the generation current when the tick fired; stopping the loop
//! bumps the generation, so a tick whose I/O is still in flight can tell that
//! its result must be discarded.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::debug;

/// What a tick asks of its loop once it completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep ticking on the regular interval.
    Continue,
    /// Stop the loop. No further ticks are scheduled.
    Halt,
}

/// Proof that a tick belongs to the loop generation it was issued for.
#[derive(Debug, Clone)]
pub struct Ticket {
    generation: Arc<AtomicU64>,
    issued: u64,
}

impl Ticket {
    /// Returns `true` while the loop that issued this ticket has not been
    /// stopped. Results must be dropped once this turns `false`.
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.generation.load(Ordering::Acquire) == self.issued
    }

    /// The generation this ticket was issued for.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.issued
    }
}

/// Builder for a named, fixed-interval loop.
#[derive(Debug, Clone)]
pub struct Schedule {
    name: &'static str,
    period: Duration,
}

impl Schedule {
    #[must_use]
    pub const fn every(name: &'static str, period: Duration) -> Self {
        Self { name, period }
    }

    /// Spawn the loop on the current runtime. The first tick fires
    /// immediately; later ticks follow `period` apart. A tick runs to
    /// completion before the next one may start.
    pub fn spawn<F, Fut>(self, mut tick: F) -> LoopHandle
    where
        F: FnMut(Ticket) -> Fut + Send + 'static,
        Fut: Future<Output = Flow> + Send + 'static,
    {
        let generation = Arc::new(AtomicU64::new(0));
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let Self { name, period } = self;

        let counter = Arc::clone(&generation);
        let task = tokio::spawn(async move {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = stop_rx.changed() => break,
                    _ = interval.tick() => {}
                }

                let issued = counter.load(Ordering::Acquire);
                if issued != 0 {
                    break;
                }
                let ticket = Ticket { generation: Arc::clone(&counter), issued };
                if tick(ticket).await == Flow::Halt {
                    debug!(schedule = name, "loop halted by tick");
                    break;
                }
            }
            debug!(schedule = name, "loop finished");
        });

        LoopHandle { name, generation, stop_tx, task }
    }
}

/// Handle to a running loop. Dropping the handle stops the loop.
#[derive(Debug)]
pub struct LoopHandle {
    name: &'static str,
    generation: Arc<AtomicU64>,
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl LoopHandle {
    /// Stop the loop. Any tick already in flight completes, but its ticket
    /// is no longer current.
    pub fn stop(&self) {
        if self.generation.fetch_add(1, Ordering::AcqRel) == 0 {
            debug!(schedule = self.name, "stopping loop");
        }
        self.stop_tx.send_replace(true);
    }

    /// Whether the loop has been stopped or halted itself.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.generation.load(Ordering::Acquire) != 0 || self.task.is_finished()
    }
}

impl Drop for LoopHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
