//! Single-slot "latest result wins" cell for interactive recomputation.
//!
//! Each submission takes a fresh, strictly increasing request id via
//! [`LatestResultCell::begin`]. A finished computation is published only if
//! no newer request has been submitted since; otherwise it is dropped. A
//! published value is therefore never replaced by an older one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

#[derive(Debug, Clone)]
pub struct Published<T> {
    pub request_id: u64,
    pub value: Arc<T>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RecomputeOutcome {
    Published { request_id: u64 },
    /// A newer request exists; the result was discarded.
    Superseded { request_id: u64, latest_request_id: u64 },
}

struct Slot<T> {
    latest_requested: u64,
    published: Option<Published<T>>,
}

pub struct LatestResultCell<T> {
    next_id: AtomicU64,
    slot: Mutex<Slot<T>>,
}

impl<T> Default for LatestResultCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LatestResultCell<T> {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            slot: Mutex::new(Slot {
                latest_requested: 0,
                published: None,
            }),
        }
    }

    /// Register a new request and return its id.
    pub fn begin(&self) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.latest_requested = slot.latest_requested.max(id);
        id
    }

    /// False once a newer request has been submitted. Long computations may
    /// poll this to stop early.
    pub fn is_current(&self, request_id: u64) -> bool {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.latest_requested == request_id
    }

    pub fn publish(&self, request_id: u64, value: T) -> RecomputeOutcome {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if request_id != slot.latest_requested {
            tracing::debug!(
                "Discarding stale result {} (latest request {})",
                request_id,
                slot.latest_requested
            );
            return RecomputeOutcome::Superseded {
                request_id,
                latest_request_id: slot.latest_requested,
            };
        }
        slot.published = Some(Published {
            request_id,
            value: Arc::new(value),
        });
        RecomputeOutcome::Published { request_id }
    }

    pub fn latest(&self) -> Option<Published<T>> {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.published.as_ref().map(|p| Published {
            request_id: p.request_id,
            value: Arc::clone(&p.value),
        })
    }

    /// Id of the newest submitted request, 0 before any.
    pub fn latest_requested(&self) -> u64 {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .latest_requested
    }
}
