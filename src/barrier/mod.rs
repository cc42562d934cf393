//! Generation-counted completion barrier
//!
//! A [`CompletionBarrier`] lets a controlling task wait until every unit of
//! work registered before it started waiting has finished. Work is
//! registered with [`CompletionBarrier::open`], which hands back a
//! [`RequestTicket`]; the ticket arrives at the barrier when it is closed or
//! dropped.
//!
//! Tickets belong to the generation that was current when they were opened.
//! [`CompletionBarrier::flush`] snapshots the current generation and moves
//! the barrier on to the next one, so tickets opened while a flush is
//! waiting never extend that wait.

pub mod ticket;


pub use ticket::RequestTicket;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Errors raised while waiting on a [`CompletionBarrier`]
#[derive(Debug, thiserror::Error)]
pub enum BarrierError {
    #[error("flush cancelled while waiting for generation {generation}")]
    Cancelled { generation: u64 },
}

/// Counter state guarded by the barrier mutex
#[derive(Debug, Default)]
struct Phases {
    generation: u64,
    /// Parties not yet arrived, keyed by generation. Drained entries are removed.
    outstanding: BTreeMap<u64, usize>,
}

impl Phases {
    fn drained_through(&self, generation: u64) -> bool {
        self.outstanding.range(..=generation).next().is_none()
    }
}

#[derive(Debug, Default)]
pub(crate) struct Shared {
    phases: Mutex<Phases>,
    arrived: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Phases> {
        // Critical sections only touch integers, so a poisoned lock still holds consistent counts.
        self.phases.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn register(&self) -> u64 {
        let mut phases = self.lock();
        let generation = phases.generation;
        *phases.outstanding.entry(generation).or_default() += 1;
        trace!(generation, "party registered");
        generation
    }

    pub(crate) fn arrive(&self, generation: u64) {
        let completed = {
            let mut phases = self.lock();
            let Some(count) = phases.outstanding.get_mut(&generation) else {
                warn!(generation, "arrival for a generation with no outstanding parties");
                return;
            };
            *count -= 1;
            if *count > 0 {
                false
            } else {
                phases.outstanding.remove(&generation);
                if phases.generation == generation {
                    phases.generation += 1;
                }
                true
            }
        };

        if completed {
            debug!(generation, "generation complete");
            self.arrived.notify_waiters();
        }
    }
}

/// Rendezvous point between in-flight work and tasks waiting for it to finish
///
/// Cloning is cheap and every clone refers to the same barrier.
///
/// # Examples
///
/// ```
/// use fixturesrv::barrier::CompletionBarrier;
///
/// #[tokio::main]
/// async fn main() {
///     let barrier = CompletionBarrier::new();
///     let ticket = barrier.open();
///
///     let worker = tokio::spawn(async move {
///         // ... write a response ...
///         ticket.close();
///     });
///
///     barrier.flush().await;
///     assert_eq!(barrier.outstanding(), 0);
///     worker.await.unwrap();
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct CompletionBarrier {
    shared: Arc<Shared>,
}

impl CompletionBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one party against the current generation.
    pub fn open(&self) -> RequestTicket {
        let generation = self.shared.register();
        RequestTicket::new(Arc::clone(&self.shared), generation)
    }

    /// Waits until every ticket opened before this call has arrived.
    ///
    /// Dropping the returned future abandons the wait without affecting
    /// the barrier.
    pub async fn flush(&self) {
        let target = self.advance();
        self.wait_for(target).await;
    }

    /// Like [`flush`](Self::flush), but gives up with
    /// [`BarrierError::Cancelled`] once `cancel` fires.
    pub async fn flush_or_cancel(&self, cancel: &CancellationToken) -> Result<(), BarrierError> {
        let target = self.advance();
        tokio::select! {
            biased;
            _ = self.wait_for(target) => Ok(()),
            _ = cancel.cancelled() => {
                debug!(generation = target, "flush cancelled");
                Err(BarrierError::Cancelled { generation: target })
            }
        }
    }

    /// Current generation number
    pub fn generation(&self) -> u64 {
        self.shared.lock().generation
    }

    /// Number of parties that have not arrived yet, across all generations
    pub fn outstanding(&self) -> usize {
        self.shared.lock().outstanding.values().sum()
    }

    /// Snapshots the current generation and, if anything up to it is still
    /// in flight, starts the next one so later tickets are not waited on.
    fn advance(&self) -> u64 {
        let mut phases = self.shared.lock();
        let target = phases.generation;
        if !phases.drained_through(target) {
            phases.generation += 1;
        }
        debug!(generation = target, outstanding = ?phases.outstanding, "flush requested");
        target
    }

    async fn wait_for(&self, target: u64) {
        loop {
            let notified = self.shared.arrived.notified();
            tokio::pin!(notified);
            // Register interest before checking so an arrival in between is not lost.
            notified.as_mut().enable();

            if self.shared.lock().drained_through(target) {
                trace!(generation = target, "flush satisfied");
                return;
            }

            notified.await;
        }
    }
}
