//! Approval state machine
//!
//! Consumes seller button clicks. At most one seller can win an order: the
//! first confirm click that gets through the lock table and finds no confirmed
//! terms on the order writes the terms and closes every other offer message.

use super::lock::OrderLocks;
use crate::config::TableNames;
use crate::error::Result;
use crate::messaging::{ApprovalAction, ApprovalEvent, Messenger};
use crate::negotiation::{ClosedMessage, OfferLedger};
use crate::store::schema::{inventory, orders, sellers, status};
use crate::store::{FieldsPatch, Record, RecordWriter};
use crate::types::{format_money, round2, OrderId, SellerId, VatType};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

const NOTE_DENIED: &str = "❌ Denied by seller. This offer is closed.";
const NOTE_BUSY: &str = "⏳ This order is already being processed. Your response was not applied.";
const NOTE_MATCHED: &str = "ℹ️ This order has already been matched with another offer.";
const NOTE_SIBLING: &str = "🔒 Confirmed by another seller. Offers for this order are closed.";
const NOTE_FAILED: &str = "⚠️ We could not process your confirmation. Our team will contact you.";

/// Where an order stands in the approval flow
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ApprovalState {
    /// No winner yet
    Open,
    /// A click for this order is being handled on this instance
    Processing,
    /// Terms are written
    Confirmed,
}

/// What handling one click did
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum ApprovalOutcome {
    Denied,
    AlreadyProcessing,
    AlreadyMatched,
    Confirmed {
        seller: SellerId,
        price: f64,
        vat: VatType,
        siblings: Vec<ClosedMessage>,
    },
    Failed {
        error: String,
    },
}

pub struct ApprovalMachine {
    writer: RecordWriter,
    messenger: Arc<dyn Messenger>,
    ledger: OfferLedger,
    locks: OrderLocks,
    tables: TableNames,
    currency_symbol: String,
}

impl ApprovalMachine {
    pub fn new(
        writer: RecordWriter,
        messenger: Arc<dyn Messenger>,
        ledger: OfferLedger,
        tables: TableNames,
        currency_symbol: impl Into<String>,
    ) -> Self {
        Self {
            writer,
            messenger,
            ledger,
            locks: OrderLocks::new(),
            tables,
            currency_symbol: currency_symbol.into(),
        }
    }

    pub fn locks(&self) -> &OrderLocks {
        &self.locks
    }

    /// Current state of an order. The record store decides `Confirmed`.
    pub async fn state_of(&self, order: &OrderId) -> Result<ApprovalState> {
        let record = self
            .writer
            .store()
            .get_record(&self.tables.orders, order.as_str())
            .await?;

        if has_confirmed_terms(&record) {
            Ok(ApprovalState::Confirmed)
        } else if self.locks.is_locked(order) {
            Ok(ApprovalState::Processing)
        } else {
            Ok(ApprovalState::Open)
        }
    }

    /// Handle one click. Never fails: errors are logged and reported as
    /// [`ApprovalOutcome::Failed`].
    pub async fn handle(&self, event: &ApprovalEvent) -> ApprovalOutcome {
        match event.payload.action {
            ApprovalAction::Deny => self.deny(event).await,
            ApprovalAction::Confirm => self.confirm(event).await,
        }
    }

    async fn deny(&self, event: &ApprovalEvent) -> ApprovalOutcome {
        info!(
            order_id = %event.payload.order,
            seller_id = %event.payload.seller,
            "seller denied offer"
        );
        self.disable(event, NOTE_DENIED).await;
        ApprovalOutcome::Denied
    }

    async fn confirm(&self, event: &ApprovalEvent) -> ApprovalOutcome {
        let order = &event.payload.order;

        let Some(_guard) = self.locks.try_acquire(order) else {
            info!(order_id = %order, "confirm click while order is being processed");
            self.disable(event, NOTE_BUSY).await;
            return ApprovalOutcome::AlreadyProcessing;
        };

        match self.confirm_locked(event).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(order_id = %order, seller_id = %event.payload.seller, "confirmation failed: {}", e);
                self.disable(event, NOTE_FAILED).await;
                ApprovalOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
        // _guard drops here, on every path
    }

    async fn confirm_locked(&self, event: &ApprovalEvent) -> Result<ApprovalOutcome> {
        let payload = &event.payload;
        let store = self.writer.store();

        let order_record = store
            .get_record(&self.tables.orders, payload.order.as_str())
            .await?;
        if has_confirmed_terms(&order_record) {
            info!(order_id = %payload.order, seller_id = %payload.seller, "order already matched");
            self.disable(event, NOTE_MATCHED).await;
            return Ok(ApprovalOutcome::AlreadyMatched);
        }

        let unit = store
            .get_record(&self.tables.inventory, payload.inventory.as_str())
            .await?;
        let seller = match unit.field(inventory::SELLER).first_linked_id() {
            Some(id) => SellerId(id),
            None => {
                warn!(
                    inventory_id = %payload.inventory,
                    "inventory unit has no linked seller, using seller from the click"
                );
                payload.seller.clone()
            }
        };

        let price = round2(payload.price);
        let patch = FieldsPatch::new()
            .set(orders::CONFIRMED_PRICE, price)
            .link(orders::CONFIRMED_SELLER, seller.as_str())
            .link(orders::CONFIRMED_INVENTORY, payload.inventory.as_str())
            .select(orders::OFFER_STATUS, status::OFFER_CONFIRMED)
            .select(orders::CONFIRMED_VAT_TYPE, payload.vat.label())
            .select(orders::DEAL_STATUS, status::DEAL_CLOSING);
        self.writer
            .patch(&self.tables.orders, payload.order.as_str(), &patch)
            .await?;

        info!(
            order_id = %payload.order,
            seller_id = %seller,
            "order confirmed at {:.2} {}",
            price,
            payload.vat
        );

        // Terms are written from here on; nothing below may undo them
        let name = self.seller_name(&seller).await;
        let note = format!(
            "✅ Confirmed by {} at {} ({}).",
            name,
            format_money(&self.currency_symbol, price),
            payload.vat
        );
        self.disable(event, &note).await;

        let siblings = match self
            .ledger
            .close_order_offers(&*self.messenger, &payload.order, NOTE_SIBLING, Some(&event.handle))
            .await
        {
            Ok(closed) => closed,
            Err(e) => {
                warn!(order_id = %payload.order, "could not look up sibling offers: {}", e);
                Vec::new()
            }
        };

        Ok(ApprovalOutcome::Confirmed {
            seller,
            price,
            vat: payload.vat,
            siblings,
        })
    }

    async fn seller_name(&self, seller: &SellerId) -> String {
        match self
            .writer
            .store()
            .get_record(&self.tables.sellers, seller.as_str())
            .await
        {
            Ok(record) => record
                .field(sellers::NAME)
                .text()
                .unwrap_or_else(|| seller.to_string()),
            Err(e) => {
                warn!(seller_id = %seller, "seller lookup failed: {}", e);
                seller.to_string()
            }
        }
    }

    async fn disable(&self, event: &ApprovalEvent, note: &str) {
        if let Err(e) = self.messenger.disable_message(&event.handle, note).await {
            warn!(msg_ref = %event.handle, "failed to disable clicked message: {}", e);
        }
    }

    /// Consume approval events until the channel closes, one task per event.
    /// Returns the number of events handled.
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<ApprovalEvent>) -> usize {
        let mut tasks = JoinSet::new();
        let mut handled = 0;

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => {
                        let machine = self.clone();
                        tasks.spawn(async move { machine.handle(&event).await });
                    }
                    None => break,
                },
                Some(joined) = tasks.join_next() => {
                    handled += 1;
                    if let Err(e) = joined {
                        error!("approval task aborted: {}", e);
                    }
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            handled += 1;
            if let Err(e) = joined {
                error!("approval task aborted: {}", e);
            }
        }

        handled
    }
}

fn has_confirmed_terms(order: &Record) -> bool {
    order
        .field(orders::OFFER_STATUS)
        .text()
        .map(|s| s.eq_ignore_ascii_case(status::OFFER_CONFIRMED))
        .unwrap_or(false)
        || order.field(orders::CONFIRMED_SELLER).is_present()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::{ButtonPayload, MessageHandle, RecordingMessenger};
    use crate::store::{Fields, Filter, MemoryStore, RecordStore};
    use crate::types::InventoryId;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use tokio::sync::Semaphore;

    const ORDER: &str = "recORDER000000001";
    const SELLER_A: &str = "recSELLERA0000001";
    const SELLER_B: &str = "recSELLERB0000001";
    const INV_A: &str = "recINVENTA0000001";
    const INV_B: &str = "recINVENTB0000001";

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    async fn seeded_store(store: MemoryStore) -> Arc<MemoryStore> {
        let tables = TableNames::default();
        store
            .insert_with_id(&tables.orders, ORDER, fields(json!({"Order ID": "#1042"})))
            .await;
        store
            .insert_with_id(&tables.inventory, INV_A, fields(json!({"Seller": [SELLER_A], "Quantity": 1})))
            .await;
        store
            .insert_with_id(&tables.inventory, INV_B, fields(json!({"Seller": [SELLER_B], "Quantity": 1})))
            .await;
        store
            .insert_with_id(&tables.sellers, SELLER_A, fields(json!({"Name": "Sneaker Vault"})))
            .await;
        Arc::new(store)
    }

    fn machine(store: Arc<dyn RecordStore>, messenger: Arc<RecordingMessenger>) -> ApprovalMachine {
        let writer = RecordWriter::new(store);
        let tables = TableNames::default();
        let ledger = OfferLedger::new(writer.clone(), tables.offer_messages.clone());
        ApprovalMachine::new(writer, messenger, ledger, tables, "€")
    }

    fn click(action: ApprovalAction, seller: &str, inventory: &str, msg: &str) -> ApprovalEvent {
        ApprovalEvent {
            payload: ButtonPayload {
                action,
                order: OrderId::new(ORDER),
                seller: SellerId::new(seller),
                inventory: InventoryId::new(inventory),
                price: 90.0,
                vat: VatType::Vat21,
            },
            handle: MessageHandle::new(RecordingMessenger::channel_for(seller), msg),
        }
    }

    async fn log_message(machine: &ApprovalMachine, event: &ApprovalEvent) {
        machine
            .ledger
            .record_sent(
                &event.payload.order,
                &event.payload.seller,
                &event.payload.inventory,
                &event.handle,
                event.payload.price,
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_deny_only_disables_that_message() {
        let store = seeded_store(MemoryStore::new()).await;
        let messenger = Arc::new(RecordingMessenger::new());
        let machine = machine(store.clone(), messenger.clone());

        let event = click(ApprovalAction::Deny, SELLER_A, INV_A, "msg-1");
        assert_eq!(machine.handle(&event).await, ApprovalOutcome::Denied);

        assert_eq!(messenger.disabled_note(&event.handle).await.as_deref(), Some(NOTE_DENIED));
        assert_eq!(
            machine.state_of(&OrderId::new(ORDER)).await.unwrap(),
            ApprovalState::Open
        );
    }

    #[tokio::test]
    async fn test_confirm_writes_terms_and_closes_siblings() {
        let store = seeded_store(MemoryStore::new()).await;
        let messenger = Arc::new(RecordingMessenger::new());
        let machine = machine(store.clone(), messenger.clone());

        let winner = click(ApprovalAction::Confirm, SELLER_A, INV_A, "msg-1");
        let sibling = click(ApprovalAction::Confirm, SELLER_B, INV_B, "msg-2");
        log_message(&machine, &winner).await;
        log_message(&machine, &sibling).await;

        let outcome = machine.handle(&winner).await;
        let ApprovalOutcome::Confirmed { seller, price, vat, siblings } = outcome else {
            panic!("expected confirmation, got {:?}", outcome);
        };
        assert_eq!(seller, SellerId::new(SELLER_A));
        assert_eq!(price, 90.0);
        assert_eq!(vat, VatType::Vat21);
        assert_eq!(siblings.len(), 1);
        assert!(siblings[0].is_closed());

        let order = store.get_record("Orders", ORDER).await.unwrap();
        assert_eq!(order.field("Confirmed Price").number(), Some(90.0));
        assert_eq!(order.field("Confirmed Seller").first_linked_id().as_deref(), Some(SELLER_A));
        assert_eq!(order.field("Confirmed Inventory").first_linked_id().as_deref(), Some(INV_A));
        assert_eq!(order.field("Offer Status").text().as_deref(), Some("Confirmed"));
        assert_eq!(order.field("Confirmed VAT Type").text().as_deref(), Some("VAT21"));
        assert_eq!(order.field("Deal Status").text().as_deref(), Some("Closing"));

        assert_eq!(
            messenger.disabled_note(&winner.handle).await.as_deref(),
            Some("✅ Confirmed by Sneaker Vault at €90.00 (VAT21).")
        );
        assert_eq!(messenger.disabled_note(&sibling.handle).await.as_deref(), Some(NOTE_SIBLING));
        assert_eq!(
            machine.state_of(&OrderId::new(ORDER)).await.unwrap(),
            ApprovalState::Confirmed
        );
        assert!(!machine.locks().is_locked(&OrderId::new(ORDER)));
    }

    #[tokio::test]
    async fn test_second_confirm_is_already_matched() {
        let store = seeded_store(MemoryStore::new()).await;
        let messenger = Arc::new(RecordingMessenger::new());
        let machine = machine(store.clone(), messenger.clone());

        let first = click(ApprovalAction::Confirm, SELLER_A, INV_A, "msg-1");
        let second = click(ApprovalAction::Confirm, SELLER_B, INV_B, "msg-2");

        assert!(matches!(machine.handle(&first).await, ApprovalOutcome::Confirmed { .. }));
        assert_eq!(machine.handle(&second).await, ApprovalOutcome::AlreadyMatched);
        // Redelivery of the winning click is also harmless
        assert_eq!(machine.handle(&first).await, ApprovalOutcome::AlreadyMatched);

        let order = store.get_record("Orders", ORDER).await.unwrap();
        assert_eq!(order.field("Confirmed Seller").first_linked_id().as_deref(), Some(SELLER_A));
        assert_eq!(messenger.disabled_note(&second.handle).await.as_deref(), Some(NOTE_MATCHED));
    }

    /// Parks order reads until the test opens the gate
    struct GatedStore {
        inner: Arc<MemoryStore>,
        gate: Arc<Semaphore>,
    }

    #[async_trait]
    impl RecordStore for GatedStore {
        async fn get_record(&self, table: &str, id: &str) -> Result<Record> {
            if table == "Orders" {
                let permit = self.gate.acquire().await.map_err(|e| crate::DealError::Internal(e.to_string()))?;
                drop(permit);
            }
            self.inner.get_record(table, id).await
        }

        async fn patch_record(&self, table: &str, id: &str, fields: Fields) -> Result<()> {
            self.inner.patch_record(table, id, fields).await
        }

        async fn create_record(&self, table: &str, fields: Fields) -> Result<String> {
            self.inner.create_record(table, fields).await
        }

        async fn query_records(&self, table: &str, filter: &Filter) -> Result<Vec<Record>> {
            self.inner.query_records(table, filter).await
        }
    }

    #[tokio::test]
    async fn test_concurrent_confirms_only_one_writes() {
        let inner = seeded_store(MemoryStore::new()).await;
        let gate = Arc::new(Semaphore::new(0));
        let store = Arc::new(GatedStore {
            inner: inner.clone(),
            gate: gate.clone(),
        });
        let messenger = Arc::new(RecordingMessenger::new());
        let machine = Arc::new(machine(store, messenger.clone()));
        let order = OrderId::new(ORDER);

        let first = click(ApprovalAction::Confirm, SELLER_A, INV_A, "msg-1");
        let racing = machine.clone();
        let in_flight = tokio::spawn(async move { racing.handle(&first).await });

        while !machine.locks().is_locked(&order) {
            tokio::task::yield_now().await;
        }

        let second = click(ApprovalAction::Confirm, SELLER_B, INV_B, "msg-2");
        assert_eq!(machine.handle(&second).await, ApprovalOutcome::AlreadyProcessing);
        assert_eq!(messenger.disabled_note(&second.handle).await.as_deref(), Some(NOTE_BUSY));

        gate.add_permits(8);
        let outcome = in_flight.await.unwrap();
        assert!(matches!(outcome, ApprovalOutcome::Confirmed { .. }));

        let order_record = inner.get_record("Orders", ORDER).await.unwrap();
        assert_eq!(
            order_record.field("Confirmed Seller").first_linked_id().as_deref(),
            Some(SELLER_A)
        );
        assert!(!machine.locks().is_locked(&order));
    }

    #[tokio::test]
    async fn test_failure_releases_lock() {
        let store = seeded_store(MemoryStore::new()).await;
        let messenger = Arc::new(RecordingMessenger::new());
        let machine = machine(store.clone(), messenger.clone());

        let broken = click(ApprovalAction::Confirm, SELLER_A, "recMISSING0000001", "msg-1");
        let outcome = machine.handle(&broken).await;
        assert!(matches!(outcome, ApprovalOutcome::Failed { .. }));
        assert_eq!(messenger.disabled_note(&broken.handle).await.as_deref(), Some(NOTE_FAILED));
        assert!(!machine.locks().is_locked(&OrderId::new(ORDER)));

        let retry = click(ApprovalAction::Confirm, SELLER_A, INV_A, "msg-1");
        assert!(matches!(machine.handle(&retry).await, ApprovalOutcome::Confirmed { .. }));
    }

    #[tokio::test]
    async fn test_plain_select_bases_are_supported() {
        let store = seeded_store(MemoryStore::new().with_plain_selects(&[
            "Offer Status",
            "Confirmed VAT Type",
            "Deal Status",
        ]))
        .await;
        let messenger = Arc::new(RecordingMessenger::new());
        let machine = machine(store.clone(), messenger);

        let event = click(ApprovalAction::Confirm, SELLER_B, INV_B, "msg-1");
        let outcome = machine.handle(&event).await;
        assert!(matches!(outcome, ApprovalOutcome::Confirmed { .. }));

        let order = store.fetch("Orders", ORDER).await.unwrap();
        assert_eq!(order["Deal Status"], json!("Closing"));
    }

    #[tokio::test]
    async fn test_unnamed_seller_falls_back_to_id() {
        let store = seeded_store(MemoryStore::new()).await;
        let messenger = Arc::new(RecordingMessenger::new());
        let machine = machine(store, messenger.clone());

        let event = click(ApprovalAction::Confirm, SELLER_B, INV_B, "msg-9");
        machine.handle(&event).await;
        assert_eq!(
            messenger.disabled_note(&event.handle).await,
            Some(format!("✅ Confirmed by {} at €90.00 (VAT21).", SELLER_B))
        );
    }

    #[tokio::test]
    async fn test_event_loop_handles_every_event() {
        let store = seeded_store(MemoryStore::new()).await;
        let messenger = Arc::new(RecordingMessenger::new());
        let machine = Arc::new(machine(store.clone(), messenger.clone()));

        let (tx, rx) = mpsc::channel(8);
        let runner = tokio::spawn(machine.clone().run(rx));

        tx.send(click(ApprovalAction::Deny, SELLER_B, INV_B, "msg-2")).await.unwrap();
        tx.send(click(ApprovalAction::Confirm, SELLER_A, INV_A, "msg-1")).await.unwrap();
        drop(tx);

        assert_eq!(runner.await.unwrap(), 2);
        assert_eq!(
            machine.state_of(&OrderId::new(ORDER)).await.unwrap(),
            ApprovalState::Confirmed
        );
    }
}
