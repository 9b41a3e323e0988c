//! Seller approval handling: per-order locking and the confirm/deny state machine

pub mod lock;
pub mod machine;

pub use lock::{OrderLockGuard, OrderLocks};
pub use machine::{ApprovalMachine, ApprovalOutcome, ApprovalState};
