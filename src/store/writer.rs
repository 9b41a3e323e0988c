//! Single-select encoding negotiation
//!
//! Depending on how a base is configured, single-select fields accept either
//! `{"name": "Closing"}` or `"Closing"`. Writes go out in the structured form
//! first and are retried once in the plain form when the store rejects the shape.

use super::{Fields, RecordStore};
use crate::error::{DealError, Result};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

/// How single-select values are encoded in a write
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectEncoding {
    /// `{"name": value}`
    Structured,
    /// `"value"`
    Plain,
}

/// A set of field writes, keeping single-selects apart so they can be re-encoded
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldsPatch {
    plain: Fields,
    selects: Vec<(String, String)>,
}

impl FieldsPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.plain.insert(field.to_string(), value.into());
        self
    }

    /// Linked-record field pointing at one record
    pub fn link(self, field: &str, id: &str) -> Self {
        self.set(field, json!([id]))
    }

    pub fn select(mut self, field: &str, value: &str) -> Self {
        self.selects.retain(|(f, _)| f != field);
        self.selects.push((field.to_string(), value.to_string()));
        self
    }

    pub fn has_selects(&self) -> bool {
        !self.selects.is_empty()
    }

    pub fn encode(&self, encoding: SelectEncoding) -> Fields {
        let mut fields = self.plain.clone();
        for (field, value) in &self.selects {
            let encoded = match encoding {
                SelectEncoding::Structured => json!({ "name": value }),
                SelectEncoding::Plain => json!(value),
            };
            fields.insert(field.clone(), encoded);
        }
        fields
    }
}

/// Writes [`FieldsPatch`]es through a [`RecordStore`], negotiating select encoding
#[derive(Clone)]
pub struct RecordWriter {
    store: Arc<dyn RecordStore>,
}

impl RecordWriter {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub async fn patch(&self, table: &str, id: &str, patch: &FieldsPatch) -> Result<()> {
        let structured = patch.encode(SelectEncoding::Structured);
        match self.store.patch_record(table, id, structured).await {
            Err(DealError::UnsupportedFieldShape { field, .. }) if patch.has_selects() => {
                debug!(table, id, field = %field, "structured select rejected, retrying as plain text");
                self.store
                    .patch_record(table, id, patch.encode(SelectEncoding::Plain))
                    .await
            }
            other => other,
        }
    }

    pub async fn create(&self, table: &str, patch: &FieldsPatch) -> Result<String> {
        let structured = patch.encode(SelectEncoding::Structured);
        match self.store.create_record(table, structured).await {
            Err(DealError::UnsupportedFieldShape { field, .. }) if patch.has_selects() => {
                debug!(table, field = %field, "structured select rejected, retrying as plain text");
                self.store
                    .create_record(table, patch.encode(SelectEncoding::Plain))
                    .await
            }
            other => other,
        }
    }
}
