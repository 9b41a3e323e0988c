//! Fan an order out to every eligible seller

use super::decision::{DecisionEngine, PriceInputs};
use super::ledger::OfferLedger;
use super::types::{Decision, OfferRequest, OrderInfo, SellerOffer};
use crate::error::{DealError, Result};
use crate::messaging::{ApprovalAction, ButtonPayload, MessageKind, Messenger, SellerMessage};
use crate::types::{InventoryId, MessageRef, OrderId, SellerId, VatType};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// A message that reached a seller
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentOffer {
    pub seller_id: SellerId,
    pub message_id: MessageRef,
    pub kind: MessageKind,
    pub confirmed_vat_type: VatType,
    pub price: f64,
    /// False when the message went out but could not be written to the log
    pub logged: bool,
}

/// Per-seller result of a fan-out
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SellerOutcome {
    Sent(SentOffer),
    #[serde(rename_all = "camelCase")]
    Skipped { seller_id: SellerId, reason: String },
    #[serde(rename_all = "camelCase")]
    Failed { seller_id: SellerId, error: String },
}

impl SellerOutcome {
    pub fn seller_id(&self) -> &SellerId {
        match self {
            SellerOutcome::Sent(sent) => &sent.seller_id,
            SellerOutcome::Skipped { seller_id, .. } | SellerOutcome::Failed { seller_id, .. } => {
                seller_id
            }
        }
    }

    pub fn sent(&self) -> Option<&SentOffer> {
        match self {
            SellerOutcome::Sent(sent) => Some(sent),
            _ => None,
        }
    }
}

/// Result of fanning one order out
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FanOutSummary {
    pub order_id: OrderId,
    pub total_sent: usize,
    pub outcomes: Vec<SellerOutcome>,
}

impl FanOutSummary {
    pub fn sent(&self) -> impl Iterator<Item = &SentOffer> {
        self.outcomes.iter().filter_map(SellerOutcome::sent)
    }
}

/// Sends offer or confirmation messages to every seller of an order
pub struct NegotiationOrchestrator {
    engine: DecisionEngine,
    messenger: Arc<dyn Messenger>,
    ledger: OfferLedger,
}

impl NegotiationOrchestrator {
    pub fn new(engine: DecisionEngine, messenger: Arc<dyn Messenger>, ledger: OfferLedger) -> Self {
        Self {
            engine,
            messenger,
            ledger,
        }
    }

    /// Fan an order out. Individual seller failures are reported in the
    /// summary; only a missing order or an empty seller list is an error.
    pub async fn fan_out(&self, request: &OfferRequest) -> Result<FanOutSummary> {
        let order = request.order.as_ref().ok_or(DealError::MissingOrder)?;
        if order.record_id.as_str().trim().is_empty() {
            return Err(DealError::MissingOrder);
        }
        if request.sellers.is_empty() {
            return Err(DealError::NoSellers(order.record_id.to_string()));
        }

        info!(
            order_id = %order.record_id,
            sellers = request.sellers.len(),
            "fanning out order {}",
            order.order_number
        );

        let mut outcomes = Vec::with_capacity(request.sellers.len());
        for seller in &request.sellers {
            outcomes.push(self.offer_to_seller(order, seller).await);
        }

        let total_sent = outcomes.iter().filter(|o| o.sent().is_some()).count();
        info!(order_id = %order.record_id, total_sent, "fan-out complete");

        Ok(FanOutSummary {
            order_id: order.record_id.clone(),
            total_sent,
            outcomes,
        })
    }

    async fn offer_to_seller(&self, order: &OrderInfo, seller: &SellerOffer) -> SellerOutcome {
        let seller_id = seller.seller_id.clone();

        let (inventory, decision) = match self.prepare(seller) {
            Ok(prepared) => prepared,
            Err(e) => {
                warn!(order_id = %order.record_id, seller_id = %seller_id, "skipping seller: {}", e);
                return SellerOutcome::Skipped {
                    seller_id,
                    reason: e.to_string(),
                };
            }
        };

        let price = decision.button_price();
        let message = SellerMessage {
            order: order.clone(),
            seller: seller.clone(),
            display: decision.display.clone(),
            price,
            confirm: payload(ApprovalAction::Confirm, order, seller, &inventory, &decision),
            deny: payload(ApprovalAction::Deny, order, seller, &inventory, &decision),
        };

        let kind = decision.mode.message_kind();
        let sent = match kind {
            MessageKind::Offer => self.messenger.send_offer_message(&message).await,
            MessageKind::Confirmation => self.messenger.send_confirmation_message(&message).await,
        };

        let handle = match sent {
            Ok(handle) => handle,
            Err(e) => {
                warn!(order_id = %order.record_id, seller_id = %seller_id, "message send failed: {}", e);
                return SellerOutcome::Failed {
                    seller_id,
                    error: e.to_string(),
                };
            }
        };

        // The seller already has the message; a log failure must not trigger a resend
        let logged = match self
            .ledger
            .record_sent(&order.record_id, &seller_id, &inventory, &handle, price)
            .await
        {
            Ok(_) => true,
            Err(e) => {
                warn!(
                    order_id = %order.record_id,
                    seller_id = %seller_id,
                    "message {} sent but not logged: {}",
                    handle,
                    e
                );
                false
            }
        };

        info!(
            order_id = %order.record_id,
            seller_id = %seller_id,
            "sent {:?} at {:.2} {}",
            kind,
            price,
            decision.confirmed_vat_type
        );

        SellerOutcome::Sent(SentOffer {
            seller_id,
            message_id: handle.message,
            kind,
            confirmed_vat_type: decision.confirmed_vat_type,
            price,
            logged,
        })
    }

    fn prepare(&self, seller: &SellerOffer) -> Result<(InventoryId, Decision)> {
        let invalid = |reason: &str| DealError::InvalidPrice {
            seller: seller.seller_id.to_string(),
            reason: reason.to_string(),
        };

        let seller_price = seller
            .seller_price
            .filter(|p| p.is_finite())
            .ok_or_else(|| invalid("seller price is not a number"))?;
        let our_offer = seller
            .our_offer
            .filter(|p| p.is_finite())
            .ok_or_else(|| invalid("our offer is not a number"))?;

        let inventory = seller
            .inventory_id
            .clone()
            .filter(|id| !id.as_str().trim().is_empty())
            .ok_or_else(|| {
                DealError::Validation(format!("seller {} has no inventory unit", seller.seller_id))
            })?;

        let decision = self.engine.decide(&PriceInputs {
            seller_price,
            our_offer_incl: our_offer,
            regime: seller.regime(),
            vat_pct: seller.vat_pct,
            country: &seller.country,
        });

        Ok((inventory, decision))
    }
}

fn payload(
    action: ApprovalAction,
    order: &OrderInfo,
    seller: &SellerOffer,
    inventory: &InventoryId,
    decision: &Decision,
) -> ButtonPayload {
    ButtonPayload {
        action,
        order: order.record_id.clone(),
        seller: seller.seller_id.clone(),
        inventory: inventory.clone(),
        price: decision.button_price(),
        vat: decision.confirmed_vat_type,
    }
}
