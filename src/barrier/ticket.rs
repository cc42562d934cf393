use super::Shared;
use std::fmt;
use std::sync::Arc;

/// One unit of outstanding work registered with a
/// [`CompletionBarrier`](super::CompletionBarrier)
///
/// The ticket arrives at the barrier exactly once: when it is closed or,
/// failing that, when it is dropped. Holding it across a fallible operation
/// therefore releases it on every exit path.
#[must_use = "dropping a ticket immediately records its arrival"]
pub struct RequestTicket {
    shared: Arc<Shared>,
    generation: u64,
}

impl RequestTicket {
    pub(super) fn new(shared: Arc<Shared>, generation: u64) -> Self {
        Self { shared, generation }
    }

    /// Generation this ticket was opened in
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Records arrival now.
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for RequestTicket {
    fn drop(&mut self) {
        self.shared.arrive(self.generation);
    }
}

impl fmt::Debug for RequestTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestTicket")
            .field("generation", &self.generation)
            .finish()
    }
}
