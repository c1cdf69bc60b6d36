//! Fixed-capacity admission control in front of the renderer.

use std::{num::NonZeroUsize, sync::Arc};

use metrics::gauge;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

pub const METRIC_RENDERER_IN_FLIGHT: &str = "webclip_renderer_in_flight";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("request cancelled while waiting for a renderer slot")]
    Cancelled,
    #[error("admission gateway is closed")]
    Closed,
}

/// Slot pool sized once at construction. Waiters are released either by a freed slot
/// or by their own cancellation token, whichever happens first.
#[derive(Debug, Clone)]
pub struct AdmissionGateway {
    slots: Arc<Semaphore>,
    capacity: usize,
}

impl AdmissionGateway {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(capacity.get())),
            capacity: capacity.get(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    pub fn in_flight(&self) -> usize {
        self.capacity.saturating_sub(self.available())
    }

    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<SlotPermit, AdmissionError> {
        if cancel.is_cancelled() {
            return Err(AdmissionError::Cancelled);
        }

        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AdmissionError::Cancelled),
            permit = Arc::clone(&self.slots).acquire_owned() => {
                permit.map_err(|_| AdmissionError::Closed)?
            }
        };

        gauge!(METRIC_RENDERER_IN_FLIGHT).increment(1.0);
        Ok(SlotPermit { _permit: permit })
    }
}

/// A held renderer slot. Dropping it returns the slot to the pool, on every exit path.
#[derive(Debug)]
pub struct SlotPermit {
    _permit: OwnedSemaphorePermit,
}

impl Drop for SlotPermit {
    fn drop(&mut self) {
        gauge!(METRIC_RENDERER_IN_FLIGHT).decrement(1.0);
    }
}
