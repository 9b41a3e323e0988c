//! DealDesk
//!
//! Seller offer negotiation for externally sourced inventory:
//! - VAT-aware offer/confirmation decisions per seller
//! - Fan-out of offer messages and their durable log
//! - Winner-take-all approval handling for concurrent seller clicks
//! - Deal finalization into sale and affiliate records

pub mod approval;
pub mod cli;
pub mod config;
pub mod error;
pub mod finalize;
pub mod messaging;
pub mod negotiation;
pub mod store;
pub mod types;
pub mod vat;

// Re-export commonly used types
pub use approval::{ApprovalMachine, ApprovalOutcome, ApprovalState, OrderLocks};
pub use config::DealConfig;
pub use error::{DealError, Result};
pub use finalize::{DealFinalizer, FinalizeOutcome};
pub use negotiation::{Decision, DecisionEngine, Mode, NegotiationOrchestrator, OfferRequest};
pub use types::{OrderId, SellerId, VatType};
