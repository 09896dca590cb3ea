//! Runtime failures: kernel errors plus journal, snapshot and configuration
//! problems.

use hr_kernel::CoreError;
use thiserror::Error;

use crate::snapshot_codec::SnapshotError;

pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Journal read/write failures. Anything that is not plain I/O means the
/// file cannot be trusted and replay stops.
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("journal io: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt journal frame at offset {offset}: {reason}")]
    Corrupt { offset: u64, reason: String },

    #[error("journal frame at offset {offset} failed to decode: {source}")]
    Decode {
        offset: u64,
        #[source]
        source: prost::DecodeError,
    },

    #[error("journal sequence violation: expected {expected}, found {found}")]
    Sequence { expected: u64, found: u64 },

    #[error("malformed journal entry field {field}: {reason}")]
    Malformed { field: &'static str, reason: String },

    /// A well-formed entry the kernel refused during replay.
    #[error("journal entry {sequence} rejected on replay: {source}")]
    Rejected {
        sequence: u64,
        #[source]
        source: CoreError,
    },
}

impl JournalError {
    pub fn malformed(field: &'static str, reason: impl ToString) -> Self {
        JournalError::Malformed {
            field,
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Journal(#[from] JournalError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl RuntimeError {
    /// Stable tag; kernel errors keep their own tag.
    pub fn kind(&self) -> &'static str {
        match self {
            RuntimeError::Core(err) => err.kind(),
            RuntimeError::Journal(_) => "journal",
            RuntimeError::Snapshot(_) => "snapshot",
            RuntimeError::Config(_) => "config",
        }
    }

    pub fn as_core(&self) -> Option<&CoreError> {
        match self {
            RuntimeError::Core(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_passes_through_core_tags() {
        let err: RuntimeError = CoreError::state_conflict("locked").into();
        assert_eq!(err.kind(), "state_conflict");
        assert!(err.as_core().is_some());

        let err: RuntimeError = JournalError::Sequence { expected: 2, found: 5 }.into();
        assert_eq!(err.kind(), "journal");
        assert!(err.to_string().contains("expected 2, found 5"));
    }
}
