//! Record-store collaborator
//!
//! Orders, inventory, sellers, sales and the offer-message log all live in an
//! external record store. The core only needs four operations on it, captured
//! by [`RecordStore`]. Field values come back loosely typed; [`FieldValue`]
//! turns them into a tagged value and [`RecordWriter`] negotiates the encoding
//! of single-select fields on the way in.

pub mod field;
pub mod memory;
pub mod schema;
pub mod writer;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use field::FieldValue;
pub use memory::MemoryStore;
pub use writer::{FieldsPatch, RecordWriter, SelectEncoding};

/// Raw field map of a record
pub type Fields = Map<String, Value>;

/// A record as returned by the store
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub fields: Fields,
}

impl Record {
    /// Parse one field into a tagged value
    pub fn field(&self, name: &str) -> FieldValue {
        FieldValue::parse(self.fields.get(name))
    }
}

/// Typed filter expression for [`RecordStore::query_records`]
#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    /// Field equals a text, number or boolean value
    Equals { field: String, value: Value },
    /// Linked-record field contains the given record id
    LinksTo { field: String, id: String },
    /// Numeric field strictly greater than a value
    GreaterThan { field: String, value: f64 },
    And(Vec<Filter>),
}

impl Filter {
    pub fn equals(field: &str, value: impl Into<Value>) -> Self {
        Filter::Equals {
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub fn links_to(field: &str, id: &str) -> Self {
        Filter::LinksTo {
            field: field.to_string(),
            id: id.to_string(),
        }
    }

    pub fn greater_than(field: &str, value: f64) -> Self {
        Filter::GreaterThan {
            field: field.to_string(),
            value,
        }
    }

    /// Evaluate against a record's fields
    pub fn matches(&self, fields: &Fields) -> bool {
        match self {
            Filter::Equals { field, value } => {
                let parsed = FieldValue::parse(fields.get(field));
                match value {
                    Value::String(expected) => parsed.text().as_deref() == Some(expected.as_str()),
                    Value::Number(expected) => parsed.number() == expected.as_f64(),
                    Value::Bool(expected) => parsed.is_truthy() == *expected,
                    other => fields.get(field) == Some(other),
                }
            }
            Filter::LinksTo { field, id } => FieldValue::parse(fields.get(field))
                .linked_ids()
                .iter()
                .any(|linked| linked == id),
            Filter::GreaterThan { field, value } => FieldValue::parse(fields.get(field))
                .number()
                .map(|n| n > *value)
                .unwrap_or(false),
            Filter::And(filters) => filters.iter().all(|f| f.matches(fields)),
        }
    }
}

/// Access to the external record store
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch one record; a missing record is [`crate::DealError::RecordNotFound`]
    async fn get_record(&self, table: &str, id: &str) -> Result<Record>;

    /// Overwrite the given fields, leaving the others untouched
    async fn patch_record(&self, table: &str, id: &str, fields: Fields) -> Result<()>;

    /// Create a record and return its id
    async fn create_record(&self, table: &str, fields: Fields) -> Result<String>;

    async fn query_records(&self, table: &str, filter: &Filter) -> Result<Vec<Record>>;
}
