//! Negotiation request and decision types

use crate::messaging::MessageKind;
use crate::types::{InventoryId, OrderId, SellerId, VatType};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Order being negotiated
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderInfo {
    /// Internal record id
    pub record_id: OrderId,
    /// Human-readable order number
    #[serde(default)]
    pub order_number: String,
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub product_name: String,
}

/// One seller candidate for an order
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerOffer {
    pub seller_id: SellerId,
    #[serde(default)]
    pub seller_name: String,
    #[serde(default)]
    pub inventory_id: Option<InventoryId>,
    /// Seller's asking price, on the basis implied by `vat_type`
    #[serde(default, deserialize_with = "lenient_number")]
    pub seller_price: Option<f64>,
    #[serde(default)]
    pub vat_type: Option<String>,
    /// Percentage (`21`) or fraction (`0.21`)
    #[serde(default, deserialize_with = "lenient_number")]
    pub vat_pct: Option<f64>,
    #[serde(default)]
    pub country: String,
    /// House offer, VAT inclusive
    #[serde(default, deserialize_with = "lenient_number")]
    pub our_offer: Option<f64>,
}

impl SellerOffer {
    pub fn regime(&self) -> Option<VatType> {
        self.vat_type.as_deref().and_then(VatType::parse)
    }

    pub fn display_name(&self) -> &str {
        if self.seller_name.trim().is_empty() {
            self.seller_id.as_str()
        } else {
            &self.seller_name
        }
    }
}

/// Fan-out request: an order and the sellers to approach
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferRequest {
    #[serde(default)]
    pub order: Option<OrderInfo>,
    #[serde(default)]
    pub sellers: Vec<SellerOffer>,
}

/// Accept JSON numbers and numeric strings; anything else becomes `None`
fn lenient_number<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => crate::store::field::parse_number_text(&s),
        _ => None,
    })
}

/// What the seller is asked to do
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Seller must accept our lower price
    Offer,
    /// Seller only confirms availability at their own price
    Confirm,
}

impl Mode {
    pub fn message_kind(&self) -> MessageKind {
        match self {
            Mode::Offer => MessageKind::Offer,
            Mode::Confirm => MessageKind::Confirmation,
        }
    }
}

/// Amounts and labels shown to the seller, rounded to cents
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Display {
    pub your_amount: f64,
    pub our_amount: f64,
    pub vat_tag_your: String,
    pub vat_tag_our: String,
    pub your_label: String,
    pub our_label: String,
}

/// Outcome of the mode/display decision for one seller
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub mode: Mode,
    pub display: Display,
    pub confirmed_vat_type: VatType,
}

impl Decision {
    /// Price the confirm button commits to
    pub fn button_price(&self) -> f64 {
        match self.mode {
            Mode::Offer => self.display.our_amount,
            Mode::Confirm => self.display.your_amount,
        }
    }
}
