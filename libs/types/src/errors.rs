//! Error taxonomy shared across service crates

use thiserror::Error;

/// Ledger operation failures
///
/// Every variant leaves balances untouched; operations are all-or-nothing.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("insufficient {asset} balance: required {required}, available {available}")]
    InsufficientBalance {
        asset: String,
        required: String,
        available: String,
    },

    #[error("amount must be positive")]
    NonPositiveAmount,
}

/// Outbox store failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OutboxError {
    #[error("failed to serialize event payload: {0}")]
    Serialize(String),

    #[error("unknown outbox record: {id}")]
    UnknownRecord { id: String },
}

/// Bus publish failures, as seen by the outbox publisher
///
/// The publisher treats every variant identically: retry with backoff until
/// the attempt budget is exhausted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PublishError {
    #[error("broker rejected publish: {0}")]
    Rejected(String),

    #[error("confirm timed out after {timeout_ms}ms")]
    ConfirmTimeout { timeout_ms: u64 },

    #[error("transport error: {0}")]
    Transport(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_balance_display() {
        let err = LedgerError::InsufficientBalance {
            asset: "USD".to_string(),
            required: "150".to_string(),
            available: "100".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("USD"));
        assert!(msg.contains("150"));
        assert!(msg.contains("100"));
    }

    #[test]
    fn test_publish_error_display() {
        let err = PublishError::ConfirmTimeout { timeout_ms: 5000 };
        assert_eq!(err.to_string(), "confirm timed out after 5000ms");
    }
}
