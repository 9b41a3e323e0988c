//! In-process messenger that records what would have been sent

use super::{MessageHandle, MessageKind, Messenger, SellerMessage};
use crate::error::{DealError, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

/// A message accepted by [`RecordingMessenger`]
#[derive(Clone, Debug)]
pub struct SentMessage {
    pub kind: MessageKind,
    pub handle: MessageHandle,
    pub message: SellerMessage,
}

/// Messenger that keeps sent and disabled messages in memory.
///
/// Each seller gets a direct channel `dm-<seller id>`; message ids are
/// `msg-1`, `msg-2`, ... in send order.
#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<SentMessage>>,
    disabled: Mutex<Vec<(MessageHandle, String)>>,
    failing_sends: HashSet<String>,
    failing_disables: HashSet<String>,
    next_id: AtomicU64,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every send to this seller
    pub fn with_failing_sends(mut self, seller_id: &str) -> Self {
        self.failing_sends.insert(seller_id.to_string());
        self
    }

    /// Fail every disable in this seller's channel
    pub fn with_failing_disables(mut self, seller_id: &str) -> Self {
        self.failing_disables.insert(Self::channel_for(seller_id));
        self
    }

    pub fn channel_for(seller_id: &str) -> String {
        format!("dm-{}", seller_id)
    }

    pub async fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }

    /// Every disable call in order, including repeats
    pub async fn disabled(&self) -> Vec<(MessageHandle, String)> {
        self.disabled.lock().await.clone()
    }

    /// Latest note a message was disabled with
    pub async fn disabled_note(&self, handle: &MessageHandle) -> Option<String> {
        self.disabled
            .lock()
            .await
            .iter()
            .rev()
            .find(|(h, _)| h == handle)
            .map(|(_, note)| note.clone())
    }

    async fn send(&self, kind: MessageKind, message: &SellerMessage) -> Result<MessageHandle> {
        let seller_id = message.seller.seller_id.as_str();
        if self.failing_sends.contains(seller_id) {
            return Err(DealError::MessageSend(format!(
                "channel for seller {} unavailable",
                seller_id
            )));
        }

        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let handle = MessageHandle::new(Self::channel_for(seller_id), format!("msg-{}", n));

        self.sent.lock().await.push(SentMessage {
            kind,
            handle: handle.clone(),
            message: message.clone(),
        });

        Ok(handle)
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_offer_message(&self, message: &SellerMessage) -> Result<MessageHandle> {
        self.send(MessageKind::Offer, message).await
    }

    async fn send_confirmation_message(&self, message: &SellerMessage) -> Result<MessageHandle> {
        self.send(MessageKind::Confirmation, message).await
    }

    async fn disable_message(&self, handle: &MessageHandle, note: &str) -> Result<()> {
        if self.failing_disables.contains(handle.channel.as_str()) {
            return Err(DealError::MessageEdit(format!("cannot edit {}", handle)));
        }

        self.disabled
            .lock()
            .await
            .push((handle.clone(), note.to_string()));
        Ok(())
    }
}
