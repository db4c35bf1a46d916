//! Engine error taxonomy.
//!
//! Three classes of failure, per the protocol's error-handling design:
//!
//! 1. **Caller/input errors** ([`EngineError::InvalidPayload`],
//!    [`EngineError::MissingResult`], [`EngineError::InvalidResult`],
//!    [`EngineError::ReasonRequired`]): reported synchronously, never
//!    retried, zero state mutation.
//! 2. **Race/conflict outcomes** ([`EngineError::Conflict`],
//!    [`EngineError::Expired`]): expected results of concurrent operation,
//!    not system failures. Callers treat them as "someone else already
//!    handled this" and must not retry with the same intent.
//! 3. **Internal fallback degradation**, which is not an error at all: a timeout
//!    firing with `fallback = default` but no usable default silently
//!    degrades the request to `expired`.
//!
//! There is no catastrophic error class: every failure mode is either
//! caller-reported or degrades gracefully to a terminal request status.

use crate::request::Status;
use crate::store::StoreError;
use thiserror::Error;

/// Errors surfaced by engine operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// No request exists with the given id
    #[error("request not found: {0}")]
    NotFound(String),

    /// The request already reached a terminal status
    ///
    /// Expected outcome of a lost race; the loser's call had zero side
    /// effects.
    #[error("request already {status}")]
    Conflict {
        /// The terminal status observed at the time of the call
        status: Status,
    },

    /// Distinct conflict for resolve/cancel on an already-expired request
    #[error("request expired before it was resolved")]
    Expired,

    /// The creation payload violated an action's shape constraints
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// Resolution was attempted without a result
    #[error("result is required")]
    MissingResult,

    /// The submitted result does not fit the request's action
    #[error("invalid result: {0}")]
    InvalidResult(String),

    /// APPROVE rejection with `reject_requires_reason` set and no reason
    #[error("rejection requires a non-empty reason")]
    ReasonRequired,

    /// The storage backend failed
    #[error("store error: {0}")]
    Store(String),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::NotFound(id),
            StoreError::Conflict { current } => Self::Conflict { status: current },
            StoreError::Backend(message) => Self::Store(message),
        }
    }
}
