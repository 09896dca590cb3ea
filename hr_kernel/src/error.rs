//! Typed failures surfaced by every kernel operation.
//!
//! Nothing in the kernel retries. Every failure leaves the caller's prior
//! state intact because transitions work on clones.

use chrono::NaiveDate;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Malformed input, unknown level, unknown event code.
    #[error("validation failed on {field}: {reason}")]
    Validation { field: String, reason: String },

    /// Hierarchy already locked, setup not finished, duplicate tenant.
    #[error("state conflict: {0}")]
    StateConflict(String),

    /// A new record must start strictly after the active record.
    #[error(
        "temporal order violated for {event_code}: valid_from {requested} is not after active record start {active_from}"
    )]
    TemporalOrder {
        event_code: String,
        requested: NaiveDate,
        active_from: NaiveDate,
    },

    #[error("field {field} is immutable")]
    ImmutableField { field: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Lost an optimistic-lock race; the caller may re-read and retry.
    #[error("concurrent modification: expected version {expected}, found {found}")]
    ConcurrencyConflict { expected: u64, found: u64 },
}

impl CoreError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn state_conflict(message: impl Into<String>) -> Self {
        CoreError::StateConflict(message.into())
    }

    pub fn immutable(field: impl Into<String>) -> Self {
        CoreError::ImmutableField {
            field: field.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        CoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Stable tag for transports and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::Validation { .. } => "validation",
            CoreError::StateConflict(_) => "state_conflict",
            CoreError::TemporalOrder { .. } => "temporal_order",
            CoreError::ImmutableField { .. } => "immutable_field",
            CoreError::NotFound { .. } => "not_found",
            CoreError::ConcurrencyConflict { .. } => "concurrency_conflict",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_context() {
        let err = CoreError::validation("unit_type", "unknown level \"Squad\"");
        assert_eq!(
            err.to_string(),
            "validation failed on unit_type: unknown level \"Squad\""
        );

        let err = CoreError::not_found("org_unit", "abc");
        assert_eq!(err.to_string(), "org_unit not found: abc");
    }

    #[test]
    fn test_temporal_order_display() {
        let err = CoreError::TemporalOrder {
            event_code: "203".to_string(),
            requested: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            active_from: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        };
        let msg = err.to_string();
        assert!(msg.contains("203"));
        assert!(msg.contains("2023-01-01"));
        assert!(msg.contains("2024-06-01"));
    }

    #[test]
    fn test_kind_tags() {
        assert_eq!(CoreError::state_conflict("x").kind(), "state_conflict");
        assert_eq!(CoreError::immutable("parent_id").kind(), "immutable_field");
        assert_eq!(
            CoreError::ConcurrencyConflict {
                expected: 1,
                found: 2
            }
            .kind(),
            "concurrency_conflict"
        );
    }

    #[test]
    fn test_result_propagation() {
        fn inner() -> Result<()> {
            Err(CoreError::not_found("employee", "e-1"))
        }

        fn outer() -> Result<()> {
            inner()?;
            Ok(())
        }

        assert_eq!(outer().unwrap_err().kind(), "not_found");
    }
}
