//! Resource limits for the embedded engine

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, thiserror::Error)]
pub enum LimitError {
    #[error("Connection limit of {max} reached")]
    ConnectionLimit { max: usize },
    #[error("Request too large: {actual} bytes, maximum allowed: {max} bytes")]
    TooLarge { actual: usize, max: usize },
}

/// Caps the number of connections served at once
///
/// Connections beyond the cap are refused immediately rather than queued;
/// a fixture server that is over its limit is a test bug worth seeing.
#[derive(Debug, Clone)]
pub struct ConnectionLimiter {
    permits: Arc<Semaphore>,
    active: Arc<AtomicUsize>,
    total: Arc<AtomicU64>,
    max_connections: usize,
}

impl ConnectionLimiter {
    pub fn new(max_connections: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_connections)),
            active: Arc::new(AtomicUsize::new(0)),
            total: Arc::new(AtomicU64::new(0)),
            max_connections,
        }
    }

    /// Claims a connection slot, released when the guard drops.
    pub fn try_acquire(&self) -> Result<ConnectionGuard, LimitError> {
        let permit = Arc::clone(&self.permits)
            .try_acquire_owned()
            .map_err(|_| LimitError::ConnectionLimit {
                max: self.max_connections,
            })?;

        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        let total = self.total.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(active_connections = active, total_connections = total, "Connection acquired");

        Ok(ConnectionGuard {
            _permit: permit,
            active: Arc::clone(&self.active),
            start_time: Instant::now(),
        })
    }

    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn total_connections(&self) -> u64 {
        self.total.load(Ordering::SeqCst)
    }
}

/// RAII guard for one connection slot
#[derive(Debug)]
pub struct ConnectionGuard {
    _permit: OwnedSemaphorePermit,
    active: Arc<AtomicUsize>,
    start_time: Instant,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let active = self.active.fetch_sub(1, Ordering::SeqCst) - 1;
        tracing::debug!(
            active_connections = active,
            connection_duration_ms = self.start_time.elapsed().as_millis(),
            "Connection released"
        );
    }
}

/// Size validator for requests
#[derive(Debug, Clone, Copy)]
pub struct SizeValidator {
    max_size: usize,
}

impl SizeValidator {
    pub fn new(max_size: usize) -> Self {
        Self { max_size }
    }

    pub fn validate_size(&self, size: usize) -> Result<(), LimitError> {
        if size > self.max_size {
            Err(LimitError::TooLarge {
                actual: size,
                max: self.max_size,
            })
        } else {
            Ok(())
        }
    }
}
