//! Core types used throughout DealDesk

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }
    };
}

string_id!(
    /// Internal record id of an order
    OrderId
);
string_id!(
    /// Record id of a seller
    SellerId
);
string_id!(
    /// Record id of an inventory unit
    InventoryId
);
string_id!(
    /// Messaging channel a seller-facing message lives in
    ChannelRef
);
string_id!(
    /// Id of a single seller-facing message
    MessageRef
);

/// VAT regime a price is quoted or invoiced under
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VatType {
    Margin,
    #[serde(rename = "VAT21")]
    Vat21,
    #[serde(rename = "VAT0")]
    Vat0,
}

impl VatType {
    /// Label written to records and carried in button payloads
    pub fn label(&self) -> &'static str {
        match self {
            VatType::Margin => "Margin",
            VatType::Vat21 => "VAT21",
            VatType::Vat0 => "VAT0",
        }
    }

    /// Tag shown next to an amount in seller-facing messages
    pub fn display_tag(&self) -> &'static str {
        match self {
            VatType::Margin => "(Margin)",
            VatType::Vat21 => "(VAT 21%)",
            VatType::Vat0 => "(VAT 0%)",
        }
    }

    /// Parse a free-form regime string (`"vat-21"`, `"Margin "`, `"VAT 0"`)
    pub fn parse(raw: &str) -> Option<Self> {
        match crate::vat::normalize_vat_token(raw).as_str() {
            "MARGIN" => Some(VatType::Margin),
            "VAT21" => Some(VatType::Vat21),
            "VAT0" => Some(VatType::Vat0),
            _ => None,
        }
    }
}

impl fmt::Display for VatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// VAT type an operator picks for the outgoing invoice
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SellingVatType {
    Margin,
    #[serde(rename = "VAT21")]
    Vat21,
    #[serde(rename = "VAT0")]
    Vat0,
    Private,
}

impl SellingVatType {
    pub fn parse(raw: &str) -> Option<Self> {
        match crate::vat::normalize_vat_token(raw).as_str() {
            "PRIVATE" => Some(SellingVatType::Private),
            _ => VatType::parse(raw).map(Self::from),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SellingVatType::Margin => "Margin",
            SellingVatType::Vat21 => "VAT21",
            SellingVatType::Vat0 => "VAT0",
            SellingVatType::Private => "Private",
        }
    }
}

impl From<VatType> for SellingVatType {
    fn from(vat: VatType) -> Self {
        match vat {
            VatType::Margin => SellingVatType::Margin,
            VatType::Vat21 => SellingVatType::Vat21,
            VatType::Vat0 => SellingVatType::Vat0,
        }
    }
}

/// Round a currency amount to cents. Only used at display/storage time.
pub fn round2(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Whole cents, for exact comparisons against stored floors
pub fn to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// Render an amount as `€100.00`
pub fn format_money(symbol: &str, amount: f64) -> String {
    format!("{}{:.2}", symbol, round2(amount))
}
