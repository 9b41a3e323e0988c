//! Tagged parsing of loosely-typed record fields
//!
//! The same logical field can arrive as a plain string, a number, an array of
//! linked record ids, a lookup array of values, a single-select object
//! (`{"id", "name"}`) or an attachment list (`[{"id", "url", "filename"}]`).

use serde_json::Value;

/// Parsed value of a single record field
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Empty,
    Text(String),
    Number(f64),
    Flag(bool),
    LinkedRecord(String),
    LinkedRecords(Vec<String>),
}

impl FieldValue {
    pub fn parse(raw: Option<&Value>) -> Self {
        match raw {
            None | Some(Value::Null) => FieldValue::Empty,
            Some(Value::Bool(b)) => FieldValue::Flag(*b),
            Some(Value::Number(n)) => n.as_f64().map(FieldValue::Number).unwrap_or(FieldValue::Empty),
            Some(Value::String(s)) => Self::from_str(s),
            Some(Value::Object(obj)) => {
                if let Some(Value::String(name)) = obj.get("name") {
                    Self::text_or_empty(name)
                } else if let Some(Value::String(url)) = obj.get("url") {
                    Self::text_or_empty(url)
                } else if let Some(Value::String(id)) = obj.get("id") {
                    Self::from_str(id)
                } else {
                    FieldValue::Empty
                }
            }
            Some(Value::Array(items)) => Self::from_items(items),
        }
    }

    fn from_str(s: &str) -> Self {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            FieldValue::Empty
        } else if is_record_id(trimmed) {
            FieldValue::LinkedRecord(trimmed.to_string())
        } else {
            FieldValue::Text(s.to_string())
        }
    }

    fn text_or_empty(s: &str) -> Self {
        if s.trim().is_empty() {
            FieldValue::Empty
        } else {
            FieldValue::Text(s.to_string())
        }
    }

    fn from_items(items: &[Value]) -> Self {
        let parsed: Vec<FieldValue> = items
            .iter()
            .map(|item| Self::parse(Some(item)))
            .filter(|v| *v != FieldValue::Empty)
            .collect();

        if parsed.is_empty() {
            return FieldValue::Empty;
        }

        let all_linked = parsed.iter().all(|v| matches!(v, FieldValue::LinkedRecord(_)));
        if all_linked {
            let mut ids: Vec<String> = parsed.into_iter().flat_map(|v| v.linked_ids()).collect();
            return if ids.len() == 1 {
                FieldValue::LinkedRecord(ids.remove(0))
            } else {
                FieldValue::LinkedRecords(ids)
            };
        }

        if parsed.len() == 1 {
            return parsed.into_iter().next().unwrap_or(FieldValue::Empty);
        }

        let joined: Vec<String> = parsed.iter().filter_map(FieldValue::text).collect();
        FieldValue::Text(joined.join(", "))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, FieldValue::Empty)
    }

    pub fn is_present(&self) -> bool {
        !self.is_empty()
    }

    /// Text rendering of the value, `None` when empty
    pub fn text(&self) -> Option<String> {
        match self {
            FieldValue::Empty => None,
            FieldValue::Text(s) => Some(s.clone()),
            FieldValue::Number(n) => Some(n.to_string()),
            FieldValue::Flag(b) => Some(b.to_string()),
            FieldValue::LinkedRecord(id) => Some(id.clone()),
            FieldValue::LinkedRecords(ids) => Some(ids.join(", ")),
        }
    }

    /// Numeric value, accepting numbers stored as text (`"€ 1.234,50"` style included)
    pub fn number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(s) => parse_number_text(s),
            _ => None,
        }
    }

    pub fn first_linked_id(&self) -> Option<String> {
        match self {
            FieldValue::LinkedRecord(id) => Some(id.clone()),
            FieldValue::LinkedRecords(ids) => ids.first().cloned(),
            _ => None,
        }
    }

    pub fn linked_ids(&self) -> Vec<String> {
        match self {
            FieldValue::LinkedRecord(id) => vec![id.clone()],
            FieldValue::LinkedRecords(ids) => ids.clone(),
            _ => Vec::new(),
        }
    }

    /// Checkbox-style truthiness
    pub fn is_truthy(&self) -> bool {
        match self {
            FieldValue::Flag(b) => *b,
            FieldValue::Number(n) => *n != 0.0,
            FieldValue::Text(s) => matches!(
                s.trim().to_lowercase().as_str(),
                "true" | "yes" | "y" | "1" | "checked" | "approved"
            ),
            _ => false,
        }
    }
}

/// Record ids are `rec` followed by 14 alphanumeric characters
pub fn is_record_id(s: &str) -> bool {
    s.len() == 17 && s.starts_with("rec") && s[3..].chars().all(|c| c.is_ascii_alphanumeric())
}

/// Parse a human-entered number: strips currency symbols and spaces, accepts a
/// decimal comma, and treats `.` as a thousands separator when a comma follows it.
pub fn parse_number_text(s: &str) -> Option<f64> {
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-'))
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    let normalized = match (cleaned.rfind(','), cleaned.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(_), None) => cleaned.replace(',', "."),
        _ => cleaned,
    };

    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}
