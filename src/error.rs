//! Error types for DealDesk

use thiserror::Error;

/// Main error type for DealDesk
#[derive(Error, Debug)]
pub enum DealError {
    // Request validation errors
    #[error("Missing order reference")]
    MissingOrder,

    #[error("No sellers supplied for order {0}")]
    NoSellers(String),

    #[error("Invalid price for seller {seller}: {reason}")]
    InvalidPrice { seller: String, reason: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    // Record store errors
    #[error("Record not found: {table}/{id}")]
    RecordNotFound { table: String, id: String },

    #[error("Unsupported shape for field '{field}' in table {table}")]
    UnsupportedFieldShape { table: String, field: String },

    #[error("Record store error: {0}")]
    Store(String),

    // Messaging errors
    #[error("Message send failed: {0}")]
    MessageSend(String),

    #[error("Message edit failed: {0}")]
    MessageEdit(String),

    #[error("Invalid button payload: {0}")]
    InvalidPayload(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid configuration value: {0}")]
    InvalidConfig(String),

    // General errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DealError {
    /// Errors caused by the caller's input rather than a collaborator failure
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            DealError::MissingOrder
                | DealError::NoSellers(_)
                | DealError::InvalidPrice { .. }
                | DealError::Validation(_)
                | DealError::InvalidPayload(_)
        )
    }

    /// True when the record store reported the record as absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, DealError::RecordNotFound { .. })
    }
}

/// Result type alias for DealDesk operations
pub type Result<T> = std::result::Result<T, DealError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = DealError::RecordNotFound {
            table: "Orders".to_string(),
            id: "rec123".to_string(),
        };
        assert_eq!(err.to_string(), "Record not found: Orders/rec123");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_result_type() {
        fn sample_function() -> Result<u64> {
            Ok(42)
        }

        let result = sample_function();
        assert!(result.is_ok());
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn test_error_conversion() {
        fn json_error_function() -> Result<serde_json::Value> {
            Ok(serde_json::from_str("{not json")?)
        }

        let result = json_error_function();
        assert!(matches!(result.unwrap_err(), DealError::Json(_)));
    }

    #[test]
    fn test_validation_classification() {
        assert!(DealError::MissingOrder.is_validation());
        assert!(DealError::NoSellers("rec1".to_string()).is_validation());
        assert!(!DealError::Store("timeout".to_string()).is_validation());
        assert!(!DealError::MessageSend("rate limited".to_string()).is_validation());
    }

    #[test]
    fn test_invalid_price_error() {
        let err = DealError::InvalidPrice {
            seller: "recSeller".to_string(),
            reason: "seller price is not a number".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid price for seller recSeller: seller price is not a number"
        );
    }
}
