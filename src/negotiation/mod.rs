//! Negotiation module: offer/confirm decisions and seller fan-out

pub mod decision;
pub mod ledger;
pub mod orchestrator;
pub mod types;

pub use decision::{DecisionEngine, PriceInputs};
pub use ledger::{ClosedMessage, OfferLedger, OfferMessage};
pub use orchestrator::{FanOutSummary, NegotiationOrchestrator, SellerOutcome, SentOffer};
pub use types::{Decision, Display, Mode, OfferRequest, OrderInfo, SellerOffer};
