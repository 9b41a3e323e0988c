//! Log of seller-facing offer messages
//!
//! Every sent message is written to the offer-message table so it can be found
//! again and disabled once the order is matched or withdrawn.

use crate::error::Result;
use crate::messaging::{MessageHandle, Messenger};
use crate::store::schema::offer_messages as om;
use crate::store::{FieldsPatch, Filter, Record, RecordWriter};
use crate::types::{round2, InventoryId, OrderId, SellerId};
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, warn};

/// A logged offer message
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OfferMessage {
    pub record_id: String,
    pub order: OrderId,
    pub seller: SellerId,
    pub inventory: Option<InventoryId>,
    pub handle: MessageHandle,
    pub price: Option<f64>,
}

impl OfferMessage {
    fn from_record(record: &Record) -> Option<Self> {
        let channel = record.field(om::CHANNEL).text()?;
        let message = record.field(om::MESSAGE).text()?;

        Some(Self {
            record_id: record.id.clone(),
            order: OrderId(record.field(om::ORDER).text().unwrap_or_default()),
            seller: SellerId(record.field(om::SELLER).text().unwrap_or_default()),
            inventory: record.field(om::INVENTORY).text().map(InventoryId),
            handle: MessageHandle::new(channel, message),
            price: record.field(om::PRICE).number(),
        })
    }
}

/// Result of disabling one logged message
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClosedMessage {
    pub handle: MessageHandle,
    pub error: Option<String>,
}

impl ClosedMessage {
    pub fn is_closed(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Clone)]
pub struct OfferLedger {
    writer: RecordWriter,
    table: String,
}

impl OfferLedger {
    pub fn new(writer: RecordWriter, table: impl Into<String>) -> Self {
        Self {
            writer,
            table: table.into(),
        }
    }

    /// Log a sent message, returning the log record id
    pub async fn record_sent(
        &self,
        order: &OrderId,
        seller: &SellerId,
        inventory: &InventoryId,
        handle: &MessageHandle,
        price: f64,
    ) -> Result<String> {
        let patch = FieldsPatch::new()
            .set(om::ORDER, order.as_str())
            .set(om::SELLER, seller.as_str())
            .set(om::INVENTORY, inventory.as_str())
            .set(om::CHANNEL, handle.channel.as_str())
            .set(om::MESSAGE, handle.message.as_str())
            .set(om::PRICE, round2(price));

        let id = self.writer.create(&self.table, &patch).await?;
        debug!(order_id = %order, msg_ref = %handle, "offer message logged");
        Ok(id)
    }

    pub async fn messages_for_order(&self, order: &OrderId) -> Result<Vec<OfferMessage>> {
        let records = self
            .writer
            .store()
            .query_records(&self.table, &Filter::equals(om::ORDER, order.as_str()))
            .await?;

        Ok(records.iter().filter_map(OfferMessage::from_record).collect())
    }

    /// Disable every logged message of an order except `except`.
    ///
    /// Each message is attempted independently; failures are reported per
    /// message and never stop the others.
    pub async fn close_order_offers(
        &self,
        messenger: &dyn Messenger,
        order: &OrderId,
        note: &str,
        except: Option<&MessageHandle>,
    ) -> Result<Vec<ClosedMessage>> {
        let mut handles: Vec<MessageHandle> = Vec::new();
        for message in self.messages_for_order(order).await? {
            if Some(&message.handle) != except && !handles.contains(&message.handle) {
                handles.push(message.handle);
            }
        }

        let attempts = handles.into_iter().map(|handle| async move {
            let error = match messenger.disable_message(&handle, note).await {
                Ok(()) => None,
                Err(e) => {
                    warn!(order_id = %order, msg_ref = %handle, "failed to disable offer message: {}", e);
                    Some(e.to_string())
                }
            };
            ClosedMessage { handle, error }
        });

        Ok(join_all(attempts).await)
    }
}
