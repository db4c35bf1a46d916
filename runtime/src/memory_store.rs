//! In-memory request store.
//!
//! The default [`RequestStore`] implementation for the single-process
//! engine: a mutex-guarded map keyed by request id. The mutex is held for
//! the whole guard-check-plus-mutate of a transition, which is what makes
//! [`compare_and_transition`](RequestStore::compare_and_transition) atomic
//! with respect to all other callers racing on the same id.
//!
//! Listing clones a snapshot under the lock and may therefore be slightly
//! stale relative to concurrent mutations, which the store contract allows.

use hxp_core::request::{ExecutionRequest, Status};
use hxp_core::store::{Mutator, RequestFilter, RequestStore, StoreError, StoreFuture};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Mutex-guarded map of requests, keyed by id.
#[derive(Debug, Default)]
pub struct InMemoryRequestStore {
    requests: Mutex<HashMap<String, ExecutionRequest>>,
}

impl InMemoryRequestStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.guard().len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }

    fn guard(&self) -> MutexGuard<'_, HashMap<String, ExecutionRequest>> {
        // A poisoned lock means a panic elsewhere; the map itself is still
        // consistent because mutations are single assignments.
        self.requests.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RequestStore for InMemoryRequestStore {
    fn create(&self, request: ExecutionRequest) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.guard().insert(request.id.clone(), request);
            Ok(())
        })
    }

    fn get<'a>(&'a self, id: &'a str) -> StoreFuture<'a, ExecutionRequest> {
        Box::pin(async move {
            self.guard()
                .get(id)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(id.to_string()))
        })
    }

    fn list(&self, filter: RequestFilter) -> StoreFuture<'_, Vec<ExecutionRequest>> {
        Box::pin(async move {
            let snapshot: Vec<ExecutionRequest> = self
                .guard()
                .values()
                .filter(|request| filter.matches(request))
                .cloned()
                .collect();
            Ok(snapshot)
        })
    }

    fn compare_and_transition<'a>(
        &'a self,
        id: &'a str,
        allowed: &'a [Status],
        mutator: Mutator,
    ) -> StoreFuture<'a, ExecutionRequest> {
        Box::pin(async move {
            let mut requests = self.guard();
            let request = requests
                .get_mut(id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            if !allowed.contains(&request.status) {
                return Err(StoreError::Conflict {
                    current: request.status,
                });
            }
            mutator(request);
            Ok(request.clone())
        })
    }
}
