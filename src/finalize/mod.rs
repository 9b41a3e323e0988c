//! Deal finalization: invoice VAT remapping, price floors and sale records

pub mod validator;
pub mod vat_mapping;

pub use validator::{DealFinalizer, FinalizeOutcome, FinalizeReceipt};
pub use vat_mapping::{map_invoice_vat, BuyerVatFacts, VatMappingError};
