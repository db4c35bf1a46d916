//! Storage port for execution requests.
//!
//! The engine is specified against this abstract interface, not a concrete
//! technology: implementations may be in-memory (the default, in
//! `hxp-runtime`) or backed by a durable store, without changing callers.
//!
//! The single point of mutation is [`RequestStore::compare_and_transition`]:
//! a CAS-style guarded update that verifies the stored status is still in an
//! allowed set before applying a mutator, atomically with respect to all
//! other callers racing on the same id. Every lifecycle trigger (resolve,
//! cancel, timeout-fire) funnels through it, which makes it the sole
//! arbiter of races between a human resolving a request and its timer
//! firing.
//!
//! # Dyn Compatibility
//!
//! The trait uses explicit `Pin<Box<dyn Future>>` returns instead of
//! `async fn` so it can be held as a trait object (`Arc<dyn RequestStore>`)
//! by the engine and by timer tasks.

use crate::request::{Action, ExecutionRequest, Priority, Status};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Mutation applied inside a guarded transition.
///
/// Runs at most once, only after the status guard has passed, while the
/// store holds exclusive access to the request.
pub type Mutator = Box<dyn FnOnce(&mut ExecutionRequest) + Send>;

/// Errors from store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No request exists with the given id
    #[error("request not found: {0}")]
    NotFound(String),

    /// The guarded transition found the request outside the allowed statuses
    #[error("transition conflict: request is {current}")]
    Conflict {
        /// Status observed under the guard
        current: Status,
    },

    /// The backing storage failed
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Optional filters for listing requests; all present fields are
/// AND-combined.
#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    /// Match a specific agent
    pub agent_id: Option<String>,
    /// Match a specific project
    pub project_id: Option<String>,
    /// Match any of these statuses
    pub statuses: Option<Vec<Status>>,
    /// Match a specific priority
    pub priority: Option<Priority>,
    /// Match a specific action kind
    pub action: Option<Action>,
}

impl RequestFilter {
    /// Whether a request passes every present filter field.
    #[must_use]
    pub fn matches(&self, request: &ExecutionRequest) -> bool {
        let agent_ok = self
            .agent_id
            .as_ref()
            .is_none_or(|agent_id| request.agent_id == *agent_id);
        let project_ok = self
            .project_id
            .as_ref()
            .is_none_or(|project_id| request.project_id.as_deref() == Some(project_id.as_str()));
        let status_ok = self
            .statuses
            .as_ref()
            .is_none_or(|statuses| statuses.contains(&request.status));
        let priority_ok = self
            .priority
            .is_none_or(|priority| request.priority == priority);
        let action_ok = self.action.is_none_or(|action| request.action() == action);

        agent_ok && project_ok && status_ok && priority_ok && action_ok
    }
}

/// Concurrency-safe keyed storage for execution requests.
///
/// # Guarantees
///
/// - [`compare_and_transition`](Self::compare_and_transition) is atomic per
///   request id: exactly one of several racing callers wins; losers observe
///   [`StoreError::Conflict`] with zero side effects.
/// - Reads and listings never block in-flight writers and may return a
///   slightly stale snapshot (no cross-request isolation guarantee).
pub trait RequestStore: Send + Sync {
    /// Insert a new request under its id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the backing storage fails.
    fn create(&self, request: ExecutionRequest) -> StoreFuture<'_, ()>;

    /// Fetch a request by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for an unknown id.
    fn get<'a>(&'a self, id: &'a str) -> StoreFuture<'a, ExecutionRequest>;

    /// List requests passing the filter, in unspecified order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the backing storage fails.
    fn list(&self, filter: RequestFilter) -> StoreFuture<'_, Vec<ExecutionRequest>>;

    /// Atomically apply `mutator` if the stored status is in `allowed`.
    ///
    /// Returns the request as stored after the mutation.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] for an unknown id
    /// - [`StoreError::Conflict`] when the status guard fails; the stored
    ///   request is untouched and `mutator` was never invoked
    fn compare_and_transition<'a>(
        &'a self,
        id: &'a str,
        allowed: &'a [Status],
        mutator: Mutator,
    ) -> StoreFuture<'a, ExecutionRequest>;
}
