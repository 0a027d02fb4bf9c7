//! Error Types
//!
//! Every failure a command can report is a recoverable, per-call condition.
//! Missing keys are not errors at all: read commands answer with `None`,
//! `0`, `false` or an empty collection instead.

use crate::storage::pool::PoolError;
use crate::storage::value::ValueKind;
use thiserror::Error;

/// Errors returned by store commands.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The key exists but holds a different kind of value
    #[error("WRONGTYPE operation expects a {expected} value but the key holds a {actual} value")]
    WrongType {
        expected: ValueKind,
        actual: ValueKind,
    },

    /// The stored string is not a base-10 signed 64-bit integer
    #[error("value is not an integer or out of range")]
    NotAnInteger,

    /// The adjusted integer does not fit in 64 bits
    #[error("increment or decrement would overflow")]
    IntegerOverflow,

    /// A value handle no longer refers to a live slot
    #[error("value pool: {0}")]
    Pool(#[from] PoolError),
}

impl StoreError {
    /// Returns true if this is a type mismatch.
    pub fn is_wrong_type(&self) -> bool {
        matches!(self, StoreError::WrongType { .. })
    }
}

/// Result alias used by every store command.
pub type StoreResult<T> = Result<T, StoreError>;
