//! Per-order lock table
//!
//! Process-local: it serialises clicks handled by this instance only. Across
//! instances the confirmed-terms check on the order record is the guard.

use crate::types::OrderId;
use dashmap::DashSet;
use std::sync::Arc;
use tracing::trace;

/// Orders currently being processed
#[derive(Clone, Debug, Default)]
pub struct OrderLocks {
    held: Arc<DashSet<OrderId>>,
}

impl OrderLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock for `order`, or `None` if another task holds it.
    /// The lock is released when the guard drops.
    pub fn try_acquire(&self, order: &OrderId) -> Option<OrderLockGuard> {
        if self.held.insert(order.clone()) {
            trace!(order_id = %order, "order lock acquired");
            Some(OrderLockGuard {
                held: self.held.clone(),
                order: order.clone(),
            })
        } else {
            None
        }
    }

    pub fn is_locked(&self, order: &OrderId) -> bool {
        self.held.contains(order)
    }

    pub fn held_count(&self) -> usize {
        self.held.len()
    }
}

/// Releases its order lock on drop
#[derive(Debug)]
pub struct OrderLockGuard {
    held: Arc<DashSet<OrderId>>,
    order: OrderId,
}

impl OrderLockGuard {
    pub fn order(&self) -> &OrderId {
        &self.order
    }
}

impl Drop for OrderLockGuard {
    fn drop(&mut self) {
        self.held.remove(&self.order);
        trace!(order_id = %self.order, "order lock released");
    }
}
