//! Invoice VAT remapping
//!
//! Combines the regime recorded when the seller confirmed with the operator's
//! selling VAT choice into the VAT type the sale is invoiced under.

use crate::types::{SellingVatType, VatType};
use crate::vat::is_netherlands;
use thiserror::Error;

/// Buyer details that decide whether a zero-rated invoice is allowed
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BuyerVatFacts {
    pub country: Option<String>,
    pub vat_id: Option<String>,
}

impl BuyerVatFacts {
    pub fn new(country: Option<String>, vat_id: Option<String>) -> Self {
        Self { country, vat_id }
    }

    pub fn is_dutch(&self) -> bool {
        self.country.as_deref().map(is_netherlands).unwrap_or(false)
    }

    pub fn has_vat_id(&self) -> bool {
        self.vat_id
            .as_deref()
            .map(|id| !id.trim().is_empty())
            .unwrap_or(false)
    }
}

/// Why a VAT combination cannot be invoiced
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum VatMappingError {
    #[error("Offer was confirmed under Margin, so the sale must be invoiced as Margin (selected {0})")]
    MarginOnly(&'static str),

    #[error("Margin resale needs a Margin purchase; the offer was confirmed as {0}")]
    MarginNotConfirmed(&'static str),

    #[error("VAT0 is not allowed for a buyer in the Netherlands")]
    DutchBuyer,

    #[error("VAT0 requires the buyer's VAT ID")]
    MissingVatId,
}

/// Decide the invoice VAT type.
///
/// An unset selection falls back to the confirmed regime, or VAT21 when the
/// order carries none. Zero-rating is checked against the buyer whichever way
/// VAT0 was arrived at.
pub fn map_invoice_vat(
    confirmed: Option<VatType>,
    selling: Option<SellingVatType>,
    buyer: &BuyerVatFacts,
) -> Result<VatType, VatMappingError> {
    let mapped = match (confirmed, selling) {
        (Some(VatType::Margin), None | Some(SellingVatType::Margin)) => VatType::Margin,
        (Some(VatType::Margin), Some(other)) => return Err(VatMappingError::MarginOnly(other.label())),
        // House rule on top of the Margin-confirmation rule: Margin invoicing
        // requires a Margin purchase, so a VAT21/VAT0 confirmation cannot be
        // resold under Margin.
        (confirmed, Some(SellingVatType::Margin)) => {
            let label = confirmed.map(|c| c.label()).unwrap_or("none");
            return Err(VatMappingError::MarginNotConfirmed(label));
        }
        (_, Some(SellingVatType::Private)) | (_, Some(SellingVatType::Vat21)) => VatType::Vat21,
        (_, Some(SellingVatType::Vat0)) => VatType::Vat0,
        (confirmed, None) => confirmed.unwrap_or(VatType::Vat21),
    };

    if mapped == VatType::Vat0 {
        if buyer.is_dutch() {
            return Err(VatMappingError::DutchBuyer);
        }
        if !buyer.has_vat_id() {
            return Err(VatMappingError::MissingVatId);
        }
    }

    Ok(mapped)
}
