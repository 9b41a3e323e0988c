//! DealDesk application wiring the negotiation, approval and finalization components

use crate::approval::{ApprovalMachine, ApprovalOutcome};
use crate::config::DealConfig;
use crate::error::DealError;
use crate::finalize::{DealFinalizer, FinalizeOutcome};
use crate::messaging::{ApprovalEvent, MessageHandle, Messenger, RecordingMessenger};
use crate::negotiation::{DecisionEngine, NegotiationOrchestrator, OfferLedger, OfferRequest};
use crate::store::{MemoryStore, RecordStore, RecordWriter};
use crate::types::OrderId;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tracing::{error, warn};

const NOTE_WITHDRAWN: &str = "🔒 This order is no longer available. Offers are closed.";
const NOTE_INVALID: &str = "⚠️ This button is no longer valid. Our team will contact you.";

/// Status code and JSON body returned by an entry point
#[derive(Clone, Debug, PartialEq)]
pub struct EndpointReply {
    pub status: u16,
    pub body: Value,
}

impl EndpointReply {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: 400,
            body: json!({ "success": false, "error": message.into() }),
        }
    }

    pub fn unprocessable(reason: impl Into<String>) -> Self {
        Self {
            status: 422,
            body: json!({ "success": false, "error": reason.into() }),
        }
    }

    /// Generic failure; details stay in the log
    pub fn internal() -> Self {
        Self {
            status: 500,
            body: json!({ "success": false, "error": "Internal error" }),
        }
    }

    fn from_error(endpoint: &str, err: DealError) -> Self {
        if err.is_validation() || err.is_not_found() {
            Self::bad_request(err.to_string())
        } else {
            error!(endpoint, "request failed: {}", err);
            Self::internal()
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// Main DealDesk application
#[derive(Clone)]
pub struct DealDesk {
    config: DealConfig,
    orchestrator: Arc<NegotiationOrchestrator>,
    approvals: Arc<ApprovalMachine>,
    finalizer: Arc<DealFinalizer>,
    ledger: OfferLedger,
    messenger: Arc<dyn Messenger>,
}

impl DealDesk {
    pub fn new(config: DealConfig, store: Arc<dyn RecordStore>, messenger: Arc<dyn Messenger>) -> Self {
        let writer = RecordWriter::new(store);
        let tables = config.tables.clone();
        let ledger = OfferLedger::new(writer.clone(), tables.offer_messages.clone());

        let engine = DecisionEngine::new(config.default_vat_fraction, config.currency_symbol.clone());
        let orchestrator = NegotiationOrchestrator::new(engine, messenger.clone(), ledger.clone());
        let approvals = ApprovalMachine::new(
            writer.clone(),
            messenger.clone(),
            ledger.clone(),
            tables.clone(),
            config.currency_symbol.clone(),
        );
        let finalizer = DealFinalizer::new(writer, tables, config.currency_symbol.clone());

        Self {
            config,
            orchestrator: Arc::new(orchestrator),
            approvals: Arc::new(approvals),
            finalizer: Arc::new(finalizer),
            ledger,
            messenger,
        }
    }

    /// Application backed by in-process collaborators
    pub fn in_memory(config: DealConfig) -> (Self, Arc<MemoryStore>, Arc<RecordingMessenger>) {
        let store = Arc::new(MemoryStore::new());
        let messenger = Arc::new(RecordingMessenger::new());
        let desk = Self::new(config, store.clone(), messenger.clone());
        (desk, store, messenger)
    }

    pub fn config(&self) -> &DealConfig {
        &self.config
    }

    /// Approval machine, e.g. to drive [`ApprovalMachine::run`] from a transport
    pub fn approvals(&self) -> Arc<ApprovalMachine> {
        self.approvals.clone()
    }

    /// Fan an order out to its sellers (`POST /external-offers`)
    pub async fn fan_out(&self, body: Value) -> EndpointReply {
        let desk = self.clone();
        guarded("fan-out", async move {
            let request: OfferRequest = match serde_json::from_value(body) {
                Ok(request) => request,
                Err(e) => return EndpointReply::bad_request(format!("Invalid request body: {}", e)),
            };

            match desk.orchestrator.fan_out(&request).await {
                Ok(summary) => EndpointReply::ok(json!({
                    "success": true,
                    "orderId": summary.order_id,
                    "totalSent": summary.total_sent,
                    "results": summary.outcomes,
                })),
                Err(e) => EndpointReply::from_error("fan-out", e),
            }
        })
        .await
    }

    /// Close every logged message of an order (`POST /disable-offers`)
    pub async fn disable_offers(&self, order_id: &str, note: Option<&str>) -> EndpointReply {
        if order_id.trim().is_empty() {
            return EndpointReply::from_error("disable-offers", DealError::MissingOrder);
        }

        let desk = self.clone();
        let order = OrderId::new(order_id.trim());
        let note = note.unwrap_or(NOTE_WITHDRAWN).to_string();
        guarded("disable-offers", async move {
            let result = desk
                .ledger
                .close_order_offers(&*desk.messenger, &order, &note, None)
                .await;

            match result {
                Ok(closed) => {
                    let disabled = closed.iter().filter(|c| c.is_closed()).count();
                    EndpointReply::ok(json!({
                        "success": true,
                        "orderId": order,
                        "disabled": disabled,
                        "failed": closed.len() - disabled,
                        "results": closed,
                    }))
                }
                Err(e) => EndpointReply::from_error("disable-offers", e),
            }
        })
        .await
    }

    /// Handle a button click delivered by the messaging transport
    pub async fn handle_approval(&self, custom_id: &str, handle: MessageHandle) -> EndpointReply {
        let event = match ApprovalEvent::from_button(custom_id, handle.clone()) {
            Ok(event) => event,
            Err(e) => {
                // Unparseable buttons are retired so the click cannot repeat
                if let Err(disable_err) = self.messenger.disable_message(&handle, NOTE_INVALID).await {
                    warn!("Failed to disable {} after bad payload: {}", handle, disable_err);
                }
                return EndpointReply::from_error("approval", e);
            }
        };

        let approvals = self.approvals.clone();
        guarded("approval", async move {
            let outcome = approvals.handle(&event).await;
            match &outcome {
                ApprovalOutcome::Failed { .. } => EndpointReply {
                    status: 500,
                    body: json!({ "success": false, "outcome": outcome }),
                },
                _ => EndpointReply::ok(json!({ "success": true, "outcome": outcome })),
            }
        })
        .await
    }

    /// Validate a ready order and create its sale (`POST /finalize-external-deal`)
    pub async fn finalize(&self, order_id: &str) -> EndpointReply {
        if order_id.trim().is_empty() {
            return EndpointReply::from_error("finalize", DealError::MissingOrder);
        }

        let finalizer = self.finalizer.clone();
        let order = OrderId::new(order_id.trim());
        guarded("finalize", async move {
            match finalizer.finalize(&order).await {
                Ok(FinalizeOutcome::Rejected { reason }) => EndpointReply::unprocessable(reason),
                Ok(FinalizeOutcome::Processed(receipt)) => EndpointReply::ok(json!({
                    "success": true,
                    "complete": receipt.is_complete(),
                    "receipt": receipt,
                })),
                Err(e) => EndpointReply::from_error("finalize", e),
            }
        })
        .await
    }

    /// Liveness probe (`GET /health`)
    pub fn health(&self) -> EndpointReply {
        EndpointReply::ok(json!({
            "status": "ok",
            "service": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        }))
    }
}

/// Run one request on its own task so a panic becomes a 500 instead of taking
/// the process down
async fn guarded<F>(endpoint: &'static str, work: F) -> EndpointReply
where
    F: Future<Output = EndpointReply> + Send + 'static,
{
    match tokio::spawn(work).await {
        Ok(reply) => reply,
        Err(e) => {
            error!(endpoint, "handler aborted: {}", e);
            EndpointReply::internal()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Fields;

    const ORDER: &str = "recORDER000000001";
    const SELLER: &str = "recSELLER00000001";
    const INV: &str = "recINVENT00000001";
    const BUYER: &str = "recBUYER000000001";
    const SKU: &str = "recSKU00000000001";

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    async fn seeded() -> (DealDesk, Arc<MemoryStore>, Arc<RecordingMessenger>) {
        let (desk, store, messenger) = DealDesk::in_memory(DealConfig::default());
        store
            .insert_with_id(
                "Orders",
                ORDER,
                fields(json!({"Order ID": "#1042", "SKU": [SKU], "Size": "42"})),
            )
            .await;
        store
            .insert_with_id(
                "Inventory",
                INV,
                fields(json!({"Seller": [SELLER], "SKU": [SKU], "Size": "42", "Quantity": 1})),
            )
            .await;
        store
            .insert_with_id("Sellers", SELLER, fields(json!({"Name": "Sneaker Vault"})))
            .await;
        store
            .insert_with_id("Buyers", BUYER, fields(json!({"Country": "Belgium", "VAT ID": "BE1"})))
            .await;
        store
            .insert_with_id("SKU Master", SKU, fields(json!({"Min Price VAT21": 100.0})))
            .await;
        (desk, store, messenger)
    }

    fn request(seller_price: Value, our_offer: Value, vat_type: &str, country: &str) -> Value {
        json!({
            "order": {
                "recordId": ORDER,
                "orderNumber": "#1042",
                "sku": "DD1391-100",
                "size": "42",
                "productName": "Dunk Low Panda"
            },
            "sellers": [{
                "sellerId": SELLER,
                "sellerName": "Sneaker Vault",
                "inventoryId": INV,
                "sellerPrice": seller_price,
                "vatType": vat_type,
                "vatPct": 21,
                "country": country,
                "ourOffer": our_offer
            }]
        })
    }

    async fn click_confirm(desk: &DealDesk, messenger: &RecordingMessenger) -> EndpointReply {
        let sent = messenger.sent().await;
        let last = sent.last().unwrap();
        desk.handle_approval(&last.message.confirm.encode(), last.handle.clone())
            .await
    }

    #[tokio::test]
    async fn test_scenario_offer_flow_to_processed_sale() {
        let (desk, store, messenger) = seeded().await;

        let reply = desk.fan_out(request(json!(100), json!(90), "VAT21", "Germany")).await;
        assert_eq!(reply.status, 200);
        assert_eq!(reply.body["totalSent"], json!(1));
        assert_eq!(reply.body["results"][0]["status"], json!("sent"));
        assert_eq!(reply.body["results"][0]["kind"], json!("offer"));
        assert_eq!(reply.body["results"][0]["price"], json!(90.0));

        let sent = messenger.sent().await;
        assert!(sent[0].message.confirm.encode().ends_with(":90.00:VAT21"));

        let reply = click_confirm(&desk, &messenger).await;
        assert_eq!(reply.status, 200);
        assert_eq!(reply.body["outcome"]["outcome"], json!("confirmed"));

        let order = store.get_record("Orders", ORDER).await.unwrap();
        assert_eq!(order.field("Confirmed Price").number(), Some(90.0));

        store
            .patch_record(
                "Orders",
                ORDER,
                fields(json!({
                    "Final Price": 140.0,
                    "Buyer": [BUYER],
                    "Shipping Label": [{"url": "https://files.example/label.pdf"}]
                })),
            )
            .await
            .unwrap();

        let reply = desk.finalize(ORDER).await;
        assert_eq!(reply.status, 200);
        assert_eq!(reply.body["complete"], json!(true));
        assert_eq!(store.records("Sales").await.len(), 1);
        assert_eq!(store.records("Affiliate Sales").await.len(), 1);
    }

    #[tokio::test]
    async fn test_scenario_confirmation_at_seller_price() {
        let (desk, _store, messenger) = seeded().await;

        let reply = desk.fan_out(request(json!(100), json!(110), "VAT21", "Germany")).await;
        assert_eq!(reply.body["results"][0]["kind"], json!("confirmation"));
        assert_eq!(reply.body["results"][0]["price"], json!(100.0));

        let sent = messenger.sent().await;
        assert_eq!(sent[0].message.display.your_amount, 100.0);
    }

    #[tokio::test]
    async fn test_scenario_dutch_vat0_seller_confirmed_as_vat21() {
        let (desk, store, messenger) = seeded().await;

        let reply = desk.fan_out(request(json!(100), json!(125), "VAT0", "Netherlands")).await;
        assert_eq!(reply.body["results"][0]["kind"], json!("confirmation"));
        assert_eq!(reply.body["results"][0]["price"], json!(121.0));
        assert_eq!(reply.body["results"][0]["confirmedVatType"], json!("VAT21"));

        click_confirm(&desk, &messenger).await;
        let order = store.get_record("Orders", ORDER).await.unwrap();
        assert_eq!(order.field("Confirmed Price").number(), Some(121.0));
        assert_eq!(order.field("Confirmed VAT Type").text().as_deref(), Some("VAT21"));
    }

    #[tokio::test]
    async fn test_fan_out_validation() {
        let (desk, _store, _messenger) = seeded().await;

        let reply = desk.fan_out(json!({"sellers": []})).await;
        assert_eq!(reply.status, 400);

        let reply = desk
            .fan_out(json!({"order": {"recordId": ORDER}, "sellers": []}))
            .await;
        assert_eq!(reply.status, 400);

        let reply = desk.fan_out(json!("not an object")).await;
        assert_eq!(reply.status, 400);
    }

    #[tokio::test]
    async fn test_disable_offers_closes_everything() {
        let (desk, _store, messenger) = seeded().await;
        desk.fan_out(request(json!(100), json!(90), "VAT21", "Germany")).await;
        desk.fan_out(request(json!(100), json!(95), "VAT21", "Germany")).await;

        let reply = desk.disable_offers(ORDER, None).await;
        assert_eq!(reply.status, 200);
        assert_eq!(reply.body["disabled"], json!(2));
        assert_eq!(messenger.disabled().await.len(), 2);

        assert_eq!(desk.disable_offers("  ", None).await.status, 400);
    }

    #[tokio::test]
    async fn test_finalize_rejection_is_422() {
        let (desk, store, _messenger) = seeded().await;
        let reply = desk.finalize(ORDER).await;
        assert_eq!(reply.status, 422);

        let order = store.fetch("Orders", ORDER).await.unwrap();
        assert_eq!(order["Deal Status"], json!({"name": "Closing"}));
    }

    #[tokio::test]
    async fn test_bad_button_payload_is_400() {
        let (desk, _store, messenger) = seeded().await;
        let handle = MessageHandle::new("dm", "msg-1");
        let reply = desk.handle_approval("confirm:only:three", handle.clone()).await;
        assert_eq!(reply.status, 400);

        let note = messenger.disabled_note(&handle).await;
        assert_eq!(note.as_deref(), Some(NOTE_INVALID));
    }

    #[tokio::test]
    async fn test_bad_payload_still_400_when_disable_fails() {
        let store = Arc::new(MemoryStore::new());
        let messenger = Arc::new(RecordingMessenger::new().with_failing_disables("S1"));
        let desk = DealDesk::new(DealConfig::default(), store, messenger.clone());

        let handle = MessageHandle::new(&RecordingMessenger::channel_for("S1"), "msg-1");
        let reply = desk.handle_approval("garbage", handle).await;
        assert_eq!(reply.status, 400);
        assert!(messenger.disabled().await.is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_is_generic_500() {
        let store = Arc::new(MemoryStore::new().with_failing_writes("Orders"));
        store
            .insert_with_id("Orders", ORDER, fields(json!({"Order ID": "#1042"})))
            .await;
        let desk = DealDesk::new(DealConfig::default(), store, Arc::new(RecordingMessenger::new()));

        let reply = desk.finalize(ORDER).await;
        assert_eq!(reply.status, 500);
        assert_eq!(reply.body["error"], json!("Internal error"));
    }

    #[test]
    fn test_health() {
        let (desk, _store, _messenger) = DealDesk::in_memory(DealConfig::default());
        let reply = desk.health();
        assert!(reply.is_success());
        assert_eq!(reply.body["service"], json!("dealdesk"));
    }
}
