//! In-process record store
//!
//! ```
//! use dealdesk::store::{MemoryStore, RecordStore};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let store = MemoryStore::new();
//! let fields = json!({"Order ID": "#1042"}).as_object().cloned().unwrap();
//! let id = store.insert("Orders", fields).await;
//!
//! let order = store.get_record("Orders", &id).await.unwrap();
//! assert_eq!(order.field("Order ID").text().as_deref(), Some("#1042"));
//! # });
//! ```

use super::{Fields, Filter, Record, RecordStore};
use crate::error::{DealError, Result};
use async_trait::async_trait;
use rand::RngCore;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::RwLock;

type Table = BTreeMap<String, Fields>;

/// Record store kept in memory.
///
/// Can be told to reject structured single-select writes for some fields (to
/// mimic bases configured for plain-text selects) and to fail every write to a
/// table.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Table>>,
    plain_select_fields: HashSet<String>,
    failing_tables: HashSet<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject `{"name": ..}` values for these fields
    pub fn with_plain_selects(mut self, fields: &[&str]) -> Self {
        self.plain_select_fields
            .extend(fields.iter().map(|f| f.to_string()));
        self
    }

    /// Make every create/patch against `table` fail
    pub fn with_failing_writes(mut self, table: &str) -> Self {
        self.failing_tables.insert(table.to_string());
        self
    }

    /// Generate a `rec` + 14 hex character id
    pub fn generate_id() -> String {
        let mut bytes = [0u8; 7];
        rand::thread_rng().fill_bytes(&mut bytes);
        format!("rec{}", hex::encode(bytes))
    }

    /// Seed a record, bypassing write checks
    pub async fn insert(&self, table: &str, fields: Fields) -> String {
        let id = Self::generate_id();
        self.insert_with_id(table, &id, fields).await;
        id
    }

    pub async fn insert_with_id(&self, table: &str, id: &str, fields: Fields) {
        self.tables
            .write()
            .await
            .entry(table.to_string())
            .or_default()
            .insert(id.to_string(), fields);
    }

    /// Current fields of a record
    pub async fn fetch(&self, table: &str, id: &str) -> Option<Fields> {
        let tables = self.tables.read().await;
        tables.get(table).and_then(|t| t.get(id)).cloned()
    }

    /// All records of a table, ordered by id
    pub async fn records(&self, table: &str) -> Vec<Record> {
        let tables = self.tables.read().await;
        tables
            .get(table)
            .map(|t| {
                t.iter()
                    .map(|(id, fields)| Record {
                        id: id.clone(),
                        fields: fields.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn check_write(&self, table: &str, fields: &Fields) -> Result<()> {
        if self.failing_tables.contains(table) {
            return Err(DealError::Store(format!("writes to {} are failing", table)));
        }

        for (field, value) in fields {
            if matches!(value, Value::Object(_)) && self.plain_select_fields.contains(field) {
                return Err(DealError::UnsupportedFieldShape {
                    table: table.to_string(),
                    field: field.clone(),
                });
            }
        }

        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get_record(&self, table: &str, id: &str) -> Result<Record> {
        self.fetch(table, id)
            .await
            .map(|fields| Record {
                id: id.to_string(),
                fields,
            })
            .ok_or_else(|| DealError::RecordNotFound {
                table: table.to_string(),
                id: id.to_string(),
            })
    }

    async fn patch_record(&self, table: &str, id: &str, fields: Fields) -> Result<()> {
        self.check_write(table, &fields)?;

        let mut tables = self.tables.write().await;
        let record = tables
            .get_mut(table)
            .and_then(|t| t.get_mut(id))
            .ok_or_else(|| DealError::RecordNotFound {
                table: table.to_string(),
                id: id.to_string(),
            })?;

        record.extend(fields);
        Ok(())
    }

    async fn create_record(&self, table: &str, fields: Fields) -> Result<String> {
        self.check_write(table, &fields)?;
        Ok(self.insert(table, fields).await)
    }

    async fn query_records(&self, table: &str, filter: &Filter) -> Result<Vec<Record>> {
        Ok(self
            .records(table)
            .await
            .into_iter()
            .filter(|record| filter.matches(&record.fields))
            .collect())
    }
}
