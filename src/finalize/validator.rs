//! Deal finalization
//!
//! Turns an order with confirmed terms and a final deal price into a Sale and
//! an Affiliate Sale. Every validation failure is written back to the order as
//! feedback and parks the deal in `Closing` for an operator to fix.

use super::vat_mapping::{map_invoice_vat, BuyerVatFacts};
use crate::config::TableNames;
use crate::error::Result;
use crate::store::schema::{affiliate_sales, buyers, inventory, orders, sales, skus, status};
use crate::store::{FieldsPatch, Filter, Record, RecordWriter};
use crate::types::{format_money, round2, to_cents, OrderId, SellingVatType, VatType};
use serde::Serialize;
use tracing::{debug, info, warn};

/// What a finalize run produced
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "camelCase")]
pub enum FinalizeOutcome {
    /// Validation failed; nothing was created
    Rejected { reason: String },
    /// The sale exists; `affiliate_id` is `None` when only part of the deal went through
    Processed(FinalizeReceipt),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeReceipt {
    pub sale_id: String,
    pub affiliate_id: Option<String>,
    pub inventory_id: Option<String>,
    pub vat: VatType,
    pub sale_price: f64,
    pub warnings: Vec<String>,
}

impl FinalizeReceipt {
    pub fn is_complete(&self) -> bool {
        self.affiliate_id.is_some()
    }
}

impl FinalizeOutcome {
    pub fn is_rejected(&self) -> bool {
        matches!(self, FinalizeOutcome::Rejected { .. })
    }
}

/// Order fields that passed the presence and confirmed-offer checks
struct DealTerms {
    order_number: Option<String>,
    final_price: f64,
    buyer: String,
    sku: String,
    seller: String,
    confirmed_price: f64,
    confirmed_inventory: Option<String>,
    size: Option<String>,
    confirmed_vat: Option<VatType>,
    exception_approved: bool,
}

type Check<T> = std::result::Result<T, String>;

pub struct DealFinalizer {
    writer: RecordWriter,
    tables: TableNames,
    currency_symbol: String,
}

impl DealFinalizer {
    pub fn new(writer: RecordWriter, tables: TableNames, currency_symbol: impl Into<String>) -> Self {
        Self {
            writer,
            tables,
            currency_symbol: currency_symbol.into(),
        }
    }

    /// Validate an order and create its sale records.
    ///
    /// Store failures are returned as errors; validation failures come back
    /// as [`FinalizeOutcome::Rejected`] after the feedback is written.
    pub async fn finalize(&self, order_id: &OrderId) -> Result<FinalizeOutcome> {
        let order = self
            .writer
            .store()
            .get_record(&self.tables.orders, order_id.as_str())
            .await?;

        let terms = match read_terms(&order) {
            Ok(terms) => terms,
            Err(reason) => return self.reject(order_id, reason).await,
        };

        let vat = match self.invoice_vat(&order, &terms).await? {
            Ok(vat) => vat,
            Err(reason) => return self.reject(order_id, reason).await,
        };

        if let Err(reason) = self.check_floor(&terms, vat).await? {
            return self.reject(order_id, reason).await;
        }

        let mut warnings = Vec::new();

        let unit = self.resolve_inventory(&terms).await;
        let sale_id = self.create_sale(order_id, &terms, unit.as_ref(), vat).await?;
        info!(order_id = %order_id, sale_id = %sale_id, "sale created as {}", vat);

        match &unit {
            Some(unit) => {
                if let Err(e) = self.decrement(unit).await {
                    warn!(order_id = %order_id, inventory_id = %unit.id, "inventory decrement failed: {}", e);
                    warnings.push(format!("Inventory {} was not decremented: {}", unit.id, e));
                }
            }
            None => {
                warn!(order_id = %order_id, "no inventory unit to decrement");
                warnings.push("No inventory unit found to decrement".to_string());
            }
        }

        let affiliate_id = match self.create_affiliate(order_id, &terms, &sale_id, vat).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(order_id = %order_id, sale_id = %sale_id, "affiliate sale creation failed: {}", e);
                warnings.push(format!("Affiliate sale was not created: {}", e));
                None
            }
        };

        let receipt = FinalizeReceipt {
            sale_id,
            affiliate_id,
            inventory_id: unit.map(|u| u.id),
            vat,
            sale_price: round2(terms.final_price),
            warnings,
        };
        self.report(order_id, &receipt).await?;

        Ok(FinalizeOutcome::Processed(receipt))
    }

    async fn invoice_vat(&self, order: &Record, terms: &DealTerms) -> Result<Check<VatType>> {
        let selling = match order.field(orders::SELLING_VAT_TYPE).text() {
            Some(raw) => match SellingVatType::parse(&raw) {
                Some(selling) => Some(selling),
                None => return Ok(Err(format!("Unknown Selling VAT Type '{}'", raw))),
            },
            None => None,
        };

        // Buyer facts only matter for zero-rating
        let zero_rated = matches!(
            (terms.confirmed_vat, selling),
            (_, Some(SellingVatType::Vat0)) | (Some(VatType::Vat0), None)
        );
        let facts = if zero_rated {
            match self
                .writer
                .store()
                .get_record(&self.tables.buyers, &terms.buyer)
                .await
            {
                Ok(buyer) => BuyerVatFacts::new(
                    buyer.field(buyers::COUNTRY).text(),
                    buyer.field(buyers::VAT_ID).text(),
                ),
                Err(e) if e.is_not_found() => {
                    return Ok(Err(format!("Buyer record {} not found", terms.buyer)))
                }
                Err(e) => return Err(e),
            }
        } else {
            BuyerVatFacts::default()
        };

        Ok(map_invoice_vat(terms.confirmed_vat, selling, &facts).map_err(|e| e.to_string()))
    }

    async fn check_floor(&self, terms: &DealTerms, vat: VatType) -> Result<Check<()>> {
        let sku = match self
            .writer
            .store()
            .get_record(&self.tables.skus, &terms.sku)
            .await
        {
            Ok(sku) => sku,
            Err(e) if e.is_not_found() => {
                return Ok(Err(format!("SKU record {} not found", terms.sku)))
            }
            Err(e) => return Err(e),
        };

        let floor_field = match vat {
            VatType::Margin => skus::MIN_PRICE_MARGIN,
            VatType::Vat21 => skus::MIN_PRICE_VAT21,
            VatType::Vat0 => skus::MIN_PRICE_VAT0,
        };

        let Some(floor) = sku.field(floor_field).number() else {
            debug!(sku = %terms.sku, "no {} floor set", vat);
            return Ok(Ok(()));
        };

        if to_cents(terms.final_price) >= to_cents(floor) {
            return Ok(Ok(()));
        }

        if terms.exception_approved {
            info!(sku = %terms.sku, "final price below {} floor, exception approved", vat);
            return Ok(Ok(()));
        }

        Ok(Err(format!(
            "Final price {} is below the {} minimum of {}",
            self.money(terms.final_price),
            vat,
            self.money(floor)
        )))
    }

    /// The confirmed unit, or any in-stock unit of the same seller and SKU
    async fn resolve_inventory(&self, terms: &DealTerms) -> Option<Record> {
        let store = self.writer.store();

        if let Some(id) = &terms.confirmed_inventory {
            match store.get_record(&self.tables.inventory, id).await {
                Ok(unit) => return Some(unit),
                Err(e) if e.is_not_found() => {
                    debug!(inventory_id = %id, "confirmed inventory is gone, searching by seller and SKU");
                }
                Err(e) => {
                    warn!(inventory_id = %id, "inventory lookup failed: {}", e);
                    return None;
                }
            }
        }

        let mut filters = vec![
            Filter::links_to(inventory::SELLER, &terms.seller),
            Filter::links_to(inventory::SKU, &terms.sku),
            Filter::greater_than(inventory::QUANTITY, 0.0),
        ];
        if let Some(size) = &terms.size {
            filters.push(Filter::equals(inventory::SIZE, size.as_str()));
        }

        match store
            .query_records(&self.tables.inventory, &Filter::And(filters))
            .await
        {
            Ok(mut units) if !units.is_empty() => Some(units.remove(0)),
            Ok(_) => None,
            Err(e) => {
                warn!(seller_id = %terms.seller, "inventory search failed: {}", e);
                None
            }
        }
    }

    async fn create_sale(
        &self,
        order_id: &OrderId,
        terms: &DealTerms,
        unit: Option<&Record>,
        vat: VatType,
    ) -> Result<String> {
        let mut patch = FieldsPatch::new()
            .link(sales::ORDER, order_id.as_str())
            .link(sales::BUYER, &terms.buyer)
            .link(sales::SELLER, &terms.seller)
            .link(sales::SKU, &terms.sku)
            .set(sales::SALE_PRICE, round2(terms.final_price))
            .set(sales::PURCHASE_PRICE, round2(terms.confirmed_price))
            .select(sales::VAT_TYPE, vat.label());

        if let Some(number) = &terms.order_number {
            patch = patch.set(sales::ORDER_NUMBER, number.as_str());
        }
        if let Some(size) = &terms.size {
            patch = patch.set(sales::SIZE, size.as_str());
        }
        if let Some(unit) = unit {
            patch = patch.link(sales::INVENTORY, &unit.id);
        }

        self.writer.create(&self.tables.sales, &patch).await
    }

    async fn decrement(&self, unit: &Record) -> Result<()> {
        let quantity = unit.field(inventory::QUANTITY).number().unwrap_or(0.0);
        let remaining = (quantity - 1.0).max(0.0);
        self.writer
            .patch(
                &self.tables.inventory,
                &unit.id,
                &FieldsPatch::new().set(inventory::QUANTITY, remaining),
            )
            .await?;
        debug!(inventory_id = %unit.id, "quantity {} -> {}", quantity, remaining);
        Ok(())
    }

    async fn create_affiliate(
        &self,
        order_id: &OrderId,
        terms: &DealTerms,
        sale_id: &str,
        vat: VatType,
    ) -> Result<String> {
        let patch = FieldsPatch::new()
            .link(affiliate_sales::SALE, sale_id)
            .link(affiliate_sales::ORDER, order_id.as_str())
            .link(affiliate_sales::SELLER, &terms.seller)
            .set(affiliate_sales::PAYOUT, round2(terms.confirmed_price))
            .select(affiliate_sales::VAT_TYPE, vat.label());

        self.writer.create(&self.tables.affiliate_sales, &patch).await
    }

    async fn reject(&self, order_id: &OrderId, reason: String) -> Result<FinalizeOutcome> {
        warn!(order_id = %order_id, "finalization rejected: {}", reason);

        let patch = FieldsPatch::new()
            .set(orders::FEEDBACK, format!("❌ {}", reason))
            .select(orders::DEAL_STATUS, status::DEAL_CLOSING);
        self.writer
            .patch(&self.tables.orders, order_id.as_str(), &patch)
            .await?;

        Ok(FinalizeOutcome::Rejected { reason })
    }

    /// Write the outcome to the order; only a complete deal advances its status
    async fn report(&self, order_id: &OrderId, receipt: &FinalizeReceipt) -> Result<()> {
        let mut feedback = if receipt.is_complete() {
            format!(
                "✅ Deal processed: sale created at {} ({}).",
                self.money(receipt.sale_price),
                receipt.vat
            )
        } else {
            format!(
                "⚠️ Sale created at {} ({}) but the deal is incomplete.",
                self.money(receipt.sale_price),
                receipt.vat
            )
        };
        for warning in &receipt.warnings {
            feedback.push_str("\n⚠️ ");
            feedback.push_str(warning);
        }

        let mut patch = FieldsPatch::new().set(orders::FEEDBACK, feedback);
        if receipt.is_complete() {
            patch = patch.select(orders::DEAL_STATUS, status::DEAL_PROCESSED);
        }

        self.writer
            .patch(&self.tables.orders, order_id.as_str(), &patch)
            .await
    }

    fn money(&self, amount: f64) -> String {
        format_money(&self.currency_symbol, amount)
    }
}

fn read_terms(order: &Record) -> Check<DealTerms> {
    let final_price = order.field(orders::FINAL_PRICE).number();
    let buyer = order.field(orders::BUYER).first_linked_id();
    let has_label = order.field(orders::SHIPPING_LABEL).is_present();

    let mut missing = Vec::new();
    if final_price.is_none() {
        missing.push(orders::FINAL_PRICE);
    }
    if buyer.is_none() {
        missing.push(orders::BUYER);
    }
    if !has_label {
        missing.push(orders::SHIPPING_LABEL);
    }
    if !missing.is_empty() {
        return Err(format!("Missing required fields: {}", missing.join(", ")));
    }

    let sku = order.field(orders::SKU).first_linked_id();
    let seller = order.field(orders::CONFIRMED_SELLER).first_linked_id();
    let confirmed_price = order.field(orders::CONFIRMED_PRICE).number();

    let mut unconfirmed = Vec::new();
    if sku.is_none() {
        unconfirmed.push(orders::SKU);
    }
    if seller.is_none() {
        unconfirmed.push(orders::CONFIRMED_SELLER);
    }
    if confirmed_price.is_none() {
        unconfirmed.push(orders::CONFIRMED_PRICE);
    }

    match (final_price, buyer, sku, seller, confirmed_price) {
        (Some(final_price), Some(buyer), Some(sku), Some(seller), Some(confirmed_price)) => {
            Ok(DealTerms {
                order_number: order.field(orders::ORDER_NUMBER).text(),
                final_price,
                buyer,
                sku,
                seller,
                confirmed_price,
                confirmed_inventory: order.field(orders::CONFIRMED_INVENTORY).first_linked_id(),
                size: order.field(orders::SIZE).text(),
                confirmed_vat: order
                    .field(orders::CONFIRMED_VAT_TYPE)
                    .text()
                    .and_then(|raw| VatType::parse(&raw)),
                exception_approved: order.field(orders::MIN_PRICE_EXCEPTION).is_truthy(),
            })
        }
        _ => Err(format!(
            "No confirmed offer on this order yet (missing {})",
            unconfirmed.join(", ")
        )),
    }
}
