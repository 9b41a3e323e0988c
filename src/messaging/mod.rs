//! Messaging collaborator
//!
//! Sellers are reached through a chat transport with interactive buttons. The
//! core sends offer and confirmation messages, disables them once a decision is
//! made, and consumes approval events produced when a seller clicks a button.

pub mod memory;

use crate::error::{DealError, Result};
use crate::negotiation::{Display, OrderInfo, SellerOffer};
use crate::types::{ChannelRef, InventoryId, MessageRef, OrderId, SellerId, VatType};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use memory::RecordingMessenger;

/// Kind of seller-facing message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// House price is lower; seller accepts a specific number
    Offer,
    /// Seller's own price stands; seller confirms availability
    Confirmation,
}

/// Where a sent message lives
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageHandle {
    pub channel: ChannelRef,
    pub message: MessageRef,
}

impl MessageHandle {
    pub fn new(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            channel: ChannelRef(channel.into()),
            message: MessageRef(message.into()),
        }
    }
}

impl fmt::Display for MessageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.channel, self.message)
    }
}

/// Button action a seller can take
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalAction {
    Confirm,
    Deny,
}

impl ApprovalAction {
    fn as_str(&self) -> &'static str {
        match self {
            ApprovalAction::Confirm => "confirm",
            ApprovalAction::Deny => "deny",
        }
    }
}

/// Data a button carries back when clicked.
///
/// Encoded as `action:order:seller:inventory:price:vat` so it fits the short
/// custom-id slot chat transports give each button.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ButtonPayload {
    pub action: ApprovalAction,
    pub order: OrderId,
    pub seller: SellerId,
    pub inventory: InventoryId,
    pub price: f64,
    pub vat: VatType,
}

impl ButtonPayload {
    pub fn encode(&self) -> String {
        format!(
            "{}:{}:{}:{}:{:.2}:{}",
            self.action.as_str(),
            self.order,
            self.seller,
            self.inventory,
            self.price,
            self.vat.label()
        )
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let parts: Vec<&str> = raw.split(':').collect();
        if parts.len() != 6 {
            return Err(DealError::InvalidPayload(format!(
                "expected 6 segments, got {}",
                parts.len()
            )));
        }

        let action = match parts[0] {
            "confirm" => ApprovalAction::Confirm,
            "deny" => ApprovalAction::Deny,
            other => {
                return Err(DealError::InvalidPayload(format!("unknown action '{}'", other)))
            }
        };

        let price = parts[4]
            .parse::<f64>()
            .ok()
            .filter(|p| p.is_finite())
            .ok_or_else(|| DealError::InvalidPayload(format!("bad price '{}'", parts[4])))?;

        let vat = VatType::parse(parts[5])
            .ok_or_else(|| DealError::InvalidPayload(format!("bad VAT label '{}'", parts[5])))?;

        for (name, value) in [("order", parts[1]), ("seller", parts[2]), ("inventory", parts[3])] {
            if value.is_empty() {
                return Err(DealError::InvalidPayload(format!("empty {} reference", name)));
            }
        }

        Ok(Self {
            action,
            order: OrderId::new(parts[1]),
            seller: SellerId::new(parts[2]),
            inventory: InventoryId::new(parts[3]),
            price,
            vat,
        })
    }
}

/// Everything a transport needs to render one seller-facing message
#[derive(Clone, Debug, PartialEq)]
pub struct SellerMessage {
    pub order: OrderInfo,
    pub seller: SellerOffer,
    pub display: Display,
    /// Price the confirm button commits to
    pub price: f64,
    pub confirm: ButtonPayload,
    pub deny: ButtonPayload,
}

/// A seller clicked a button on one of our messages
#[derive(Clone, Debug, PartialEq)]
pub struct ApprovalEvent {
    pub payload: ButtonPayload,
    pub handle: MessageHandle,
}

impl ApprovalEvent {
    /// Build an event from a raw button id
    pub fn from_button(custom_id: &str, handle: MessageHandle) -> Result<Self> {
        Ok(Self {
            payload: ButtonPayload::parse(custom_id)?,
            handle,
        })
    }
}

/// Outbound side of the chat transport
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_offer_message(&self, message: &SellerMessage) -> Result<MessageHandle>;

    async fn send_confirmation_message(&self, message: &SellerMessage) -> Result<MessageHandle>;

    /// Replace the buttons with a disabled state and append `note`. Idempotent.
    async fn disable_message(&self, handle: &MessageHandle, note: &str) -> Result<()>;
}
