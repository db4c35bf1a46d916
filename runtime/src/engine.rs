//! Lifecycle state machine: the transition authority for execution requests.
//!
//! The [`ExecutionEngine`] owns a request from creation to terminal
//! resolution. It is the only writer of `status` and `receipt`, and every
//! mutation (resolve, cancel, assign, timeout-fire) is exactly one call to
//! the store's CAS transition. That guard is the sole race-arbiter between a
//! human resolving a request and its timer firing at the same instant:
//! whichever caller wins the atomic transition proceeds, the loser observes
//! a conflict with zero side effects.
//!
//! # Transition table
//!
//! | Trigger | Allowed from | Result |
//! |---|---|---|
//! | create | (new) | pending |
//! | assign | pending | assigned |
//! | resolve | pending, assigned | completed + receipt |
//! | cancel | pending, assigned | cancelled |
//! | timeout-fire, fallback=fail | pending | failed |
//! | timeout-fire, fallback=default, usable default | pending | completed + synthetic receipt |
//! | timeout-fire, fallback=default, otherwise | pending | expired |
//! | timeout-fire, fallback=pause | pending | no-op |
//!
//! Timer callbacks have no special privilege: they go through the same
//! CAS-guarded path as human-triggered calls, so a late fire on an
//! already-resolved request is a harmless no-op.

use crate::hub::{NotificationHub, Subscription};
use crate::memory_store::InMemoryRequestStore;
use crate::metrics::{REQUESTS_CREATED, TRANSITIONS, TRANSITION_CONFLICTS};
use crate::scheduler::{Scheduler, TokioScheduler};
use chrono::{DateTime, Utc};
use hxp_core::environment::{Clock, SystemClock};
use hxp_core::error::EngineError;
use hxp_core::evidence::EvidenceHasher;
use hxp_core::request::{
    ActionPayload, CreateRequest, DelegationRule, ExecutionRequest, Priority, Receipt,
    RequestEvent, Status, SYSTEM_IDENTITY,
};
use hxp_core::routing::{RoleRouter, RouteTarget, RouterConfig};
use hxp_core::store::{RequestFilter, RequestStore, StoreError};
use hxp_core::validation;
use hxp_core::Action;
use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// Reason recorded on synthetic fallback-default receipts.
const DEFAULT_FALLBACK_REASON: &str = "Timeout — default option applied";

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Server secret mixed into evidence hashes
    pub evidence_secret: String,
}

impl EngineConfig {
    /// Configuration with the given evidence secret.
    pub fn new(evidence_secret: impl Into<String>) -> Self {
        Self {
            evidence_secret: evidence_secret.into(),
        }
    }
}

/// Response to a creation call.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedRequest {
    /// Id of the stored request
    pub request_id: String,
    /// Always `pending` at creation
    pub status: Status,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Deadline, when a timeout was set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Informational routing target resolved at creation time
    pub routed_to: String,
}

/// Agent-view listing filters; all present fields are AND-combined.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentFilter {
    /// Match a specific agent
    pub agent_id: Option<String>,
    /// Match a specific project
    pub project_id: Option<String>,
    /// Match a specific status
    pub status: Option<Status>,
}

/// Human-view inbox filters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboxFilter {
    /// Statuses to include; defaults to pending + assigned
    pub statuses: Option<Vec<Status>>,
    /// Match a specific priority
    pub priority: Option<Priority>,
    /// Match a specific action kind
    pub action: Option<Action>,
}

/// Human-view inbox: requests sorted by priority rank, then recency.
#[derive(Debug, Clone, Serialize)]
pub struct Inbox {
    /// Matching requests, critical first, newest first within a rank
    pub requests: Vec<ExecutionRequest>,
    /// Number of matching requests
    pub total: usize,
    /// Number of matching requests still pending
    pub unresolved: usize,
}

/// The Execution Request Lifecycle Engine.
///
/// Cheap to clone; clones share the same store, scheduler, hub, and router.
#[derive(Clone)]
pub struct ExecutionEngine {
    store: Arc<dyn RequestStore>,
    scheduler: Arc<dyn Scheduler>,
    hub: Arc<NotificationHub>,
    router: Arc<RoleRouter>,
    clock: Arc<dyn Clock>,
    hasher: EvidenceHasher,
}

impl ExecutionEngine {
    /// Assemble an engine from explicit collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn RequestStore>,
        scheduler: Arc<dyn Scheduler>,
        hub: Arc<NotificationHub>,
        router: Arc<RoleRouter>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            scheduler,
            hub,
            router,
            clock,
            hasher: EvidenceHasher::new(config.evidence_secret),
        }
    }

    /// Engine with the default single-process collaborators: in-memory
    /// store, Tokio scheduler, system clock.
    #[must_use]
    pub fn in_memory(config: EngineConfig, router_config: RouterConfig) -> Self {
        Self::new(
            Arc::new(InMemoryRequestStore::new()),
            Arc::new(TokioScheduler::new()),
            Arc::new(NotificationHub::new()),
            Arc::new(RoleRouter::new(router_config)),
            Arc::new(SystemClock),
            config,
        )
    }

    /// Create an execution request.
    ///
    /// Validates the payload, resolves the informational routing target,
    /// stores the request as `pending`, and arms a one-shot timeout timer
    /// when `timeout_seconds > 0`.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidPayload`] naming the violated constraint
    /// - [`EngineError::Store`] if the backing storage fails
    pub async fn create(&self, input: CreateRequest) -> Result<CreatedRequest, EngineError> {
        validation::validate_payload(&input.payload)?;

        let now = self.clock.now();
        let expires_at = expiry_for(now, input.timeout_seconds);
        let request = ExecutionRequest {
            id: Uuid::new_v4().to_string(),
            role: input.role,
            priority: input.priority,
            timeout_seconds: input.timeout_seconds,
            fallback: input.fallback,
            agent_id: input.agent_id,
            project_id: input.project_id,
            metadata: input.metadata,
            payload: input.payload,
            status: Status::Pending,
            assigned_to: None,
            created_at: now,
            expires_at,
            receipt: None,
        };
        let routed_to = self.router.resolve(&request);

        self.store.create(request.clone()).await?;
        if let Some(deadline) = expires_at {
            self.arm_timer(&request.id, deadline);
        }

        counter!(REQUESTS_CREATED).increment(1);
        tracing::info!(
            request_id = %request.id,
            action = %request.action(),
            agent_id = %request.agent_id,
            routed_to = %routed_to,
            timeout_seconds = request.timeout_seconds,
            "created execution request"
        );

        Ok(CreatedRequest {
            request_id: request.id,
            status: Status::Pending,
            created_at: now,
            expires_at,
            routed_to: routed_to.to_string(),
        })
    }

    /// Fetch a request by id, including its receipt if present.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] for an unknown id.
    pub async fn get(&self, id: &str) -> Result<ExecutionRequest, EngineError> {
        Ok(self.store.get(id).await?)
    }

    /// Agent-view listing, sorted by creation time descending.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] if the backing storage fails.
    pub async fn list(&self, filter: AgentFilter) -> Result<Vec<ExecutionRequest>, EngineError> {
        let mut requests = self
            .store
            .list(RequestFilter {
                agent_id: filter.agent_id,
                project_id: filter.project_id,
                statuses: filter.status.map(|status| vec![status]),
                ..RequestFilter::default()
            })
            .await?;
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }

    /// Human-view inbox, sorted by priority rank ascending (critical first),
    /// then creation time descending.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] if the backing storage fails.
    pub async fn inbox(&self, filter: InboxFilter) -> Result<Inbox, EngineError> {
        let statuses = filter
            .statuses
            .unwrap_or_else(|| vec![Status::Pending, Status::Assigned]);
        let mut requests = self
            .store
            .list(RequestFilter {
                statuses: Some(statuses),
                priority: filter.priority,
                action: filter.action,
                ..RequestFilter::default()
            })
            .await?;
        requests.sort_by(|a, b| {
            a.priority
                .rank()
                .cmp(&b.priority.rank())
                .then_with(|| b.created_at.cmp(&a.created_at))
        });

        let total = requests.len();
        let unresolved = requests
            .iter()
            .filter(|request| request.status == Status::Pending)
            .count();
        Ok(Inbox {
            requests,
            total,
            unresolved,
        })
    }

    /// Claim a pending request for a specific human.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NotFound`] for an unknown id
    /// - [`EngineError::Expired`] if the request already expired
    /// - [`EngineError::Conflict`] if it already left `pending`
    pub async fn assign(
        &self,
        id: &str,
        assignee: &str,
    ) -> Result<ExecutionRequest, EngineError> {
        let assignee_owned = assignee.to_string();
        let updated = self
            .store
            .compare_and_transition(
                id,
                &[Status::Pending],
                Box::new(move |request| {
                    request.status = Status::Assigned;
                    request.assigned_to = Some(assignee_owned);
                }),
            )
            .await
            .map_err(|err| self.map_transition_err(err))?;

        self.committed(id, Status::Assigned, None);
        tracing::info!(request_id = %id, assignee, "request assigned");
        Ok(updated)
    }

    /// Resolve a request with a human-provided result.
    ///
    /// Validates the result against the request's payload, builds the
    /// receipt (including the evidence hash), and commits status and receipt
    /// as one atomic transition out of `pending`/`assigned`.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NotFound`] for an unknown id
    /// - [`EngineError::Expired`] if the request already expired
    /// - [`EngineError::Conflict`] if it already reached another terminal
    ///   status; the stored receipt, if any, is unchanged
    /// - [`EngineError::MissingResult`], [`EngineError::InvalidResult`],
    ///   [`EngineError::ReasonRequired`] per the validation engine; these
    ///   mutate nothing
    pub async fn resolve(
        &self,
        id: &str,
        result: Value,
        reason: Option<String>,
        resolved_by: &str,
    ) -> Result<Receipt, EngineError> {
        let request = self.store.get(id).await?;
        if request.status == Status::Expired {
            return Err(EngineError::Expired);
        }
        validation::validate_result(&request, &result, reason.as_deref())?;

        let completed_at = self.clock.now();
        let receipt = self.build_receipt(&request, result, reason, resolved_by, completed_at);

        let stored = receipt.clone();
        self.store
            .compare_and_transition(
                id,
                &[Status::Pending, Status::Assigned],
                Box::new(move |request| {
                    request.status = Status::Completed;
                    request.receipt = Some(stored);
                }),
            )
            .await
            .map_err(|err| self.map_transition_err(err))?;

        self.committed(id, Status::Completed, Some(&receipt));
        tracing::info!(
            request_id = %id,
            resolved_by,
            duration_seconds = receipt.duration_seconds,
            "request resolved"
        );
        Ok(receipt)
    }

    /// Cancel a request that has not yet resolved.
    ///
    /// Cancellation is explicit-only; the engine never cancels an in-flight
    /// human action on its own.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NotFound`] for an unknown id
    /// - [`EngineError::Expired`] if the request already expired
    /// - [`EngineError::Conflict`] if it already reached another terminal
    ///   status
    pub async fn cancel(&self, id: &str) -> Result<ExecutionRequest, EngineError> {
        let updated = self
            .store
            .compare_and_transition(
                id,
                &[Status::Pending, Status::Assigned],
                Box::new(|request| request.status = Status::Cancelled),
            )
            .await
            .map_err(|err| self.map_transition_err(err))?;

        self.committed(id, Status::Cancelled, None);
        tracing::info!(request_id = %id, "request cancelled");
        Ok(updated)
    }

    /// Timeout-fire trigger, invoked by armed timers.
    ///
    /// Public so scheduler implementations stay decoupled from the engine;
    /// it carries no special privilege and goes through the same CAS guard
    /// as every other trigger.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NotFound`] for an unknown id
    /// - [`EngineError::Conflict`] when the request already left `pending`;
    ///   the expected outcome of a timer losing its race against a human
    pub async fn fire_timeout(&self, id: &str) -> Result<(), EngineError> {
        let request = self.store.get(id).await?;
        match request.fallback {
            // Pause leaves the request pending indefinitely, by design.
            hxp_core::request::Fallback::Pause => {
                tracing::debug!(request_id = %id, "timeout elapsed, pause fallback keeps request pending");
                Ok(())
            }
            hxp_core::request::Fallback::Fail => {
                self.store
                    .compare_and_transition(
                        id,
                        &[Status::Pending],
                        Box::new(|request| request.status = Status::Failed),
                    )
                    .await
                    .map_err(|err| self.map_transition_err(err))?;
                self.committed(id, Status::Failed, None);
                tracing::info!(request_id = %id, reason = "timeout", "request failed");
                Ok(())
            }
            hxp_core::request::Fallback::Default => self.fire_default_fallback(&request).await,
        }
    }

    /// Subscribe to a request's lifecycle events.
    ///
    /// A subscriber connecting after the request already reached a terminal
    /// status receives exactly the terminal snapshot immediately, with the
    /// stored receipt for completed requests.
    ///
    /// The channel is registered before the request is read. A transition
    /// committing during the read therefore publishes into the already-open
    /// channel, and the hub's terminal-frame marker keeps the snapshot and
    /// that publish from both arriving.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] for an unknown id.
    pub async fn subscribe(&self, id: &str) -> Result<Subscription, EngineError> {
        let subscription = self.hub.subscribe(id);
        let request = match self.store.get(id).await {
            Ok(request) => request,
            Err(err) => {
                self.hub.unsubscribe(id, &subscription);
                return Err(err.into());
            }
        };
        if request.is_terminal() {
            let snapshot = RequestEvent {
                event: request.status,
                receipt: request.receipt,
            };
            self.hub.catch_up(id, &subscription, snapshot);
        }
        Ok(subscription)
    }

    /// Append a delegation rule. Rules are ordered and append-only.
    pub fn add_delegation_rule(&self, rule: DelegationRule) {
        tracing::info!(
            action = %rule.action,
            delegate_to = %rule.delegate_to,
            "delegation rule added"
        );
        self.router.add_rule(rule);
    }

    /// The full ordered delegation rule list.
    #[must_use]
    pub fn delegation_rules(&self) -> Vec<DelegationRule> {
        self.router.rules()
    }

    /// Resolve the routing target for an already-stored request.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] for an unknown id.
    pub async fn route(&self, id: &str) -> Result<RouteTarget, EngineError> {
        let request = self.store.get(id).await?;
        Ok(self.router.resolve(&request))
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Default-fallback timeout fire: complete with the payload's default
    /// option when one is applicable, otherwise degrade to `expired`.
    async fn fire_default_fallback(&self, request: &ExecutionRequest) -> Result<(), EngineError> {
        let default_option = match &request.payload {
            ActionPayload::Decide {
                default_option: Some(option),
                ..
            } => Some(option.clone()),
            _ => None,
        };

        if let Some(option) = default_option {
            let completed_at = self.clock.now();
            let receipt = self.build_receipt(
                request,
                Value::String(option),
                Some(DEFAULT_FALLBACK_REASON.to_string()),
                SYSTEM_IDENTITY,
                completed_at,
            );
            let stored = receipt.clone();
            self.store
                .compare_and_transition(
                    &request.id,
                    &[Status::Pending],
                    Box::new(move |request| {
                        request.status = Status::Completed;
                        request.receipt = Some(stored);
                    }),
                )
                .await
                .map_err(|err| self.map_transition_err(err))?;
            self.committed(&request.id, Status::Completed, Some(&receipt));
            tracing::info!(request_id = %request.id, "timeout applied default option");
        } else {
            // Documented degradation: default fallback without a usable
            // default expires the request instead of raising an error.
            self.store
                .compare_and_transition(
                    &request.id,
                    &[Status::Pending],
                    Box::new(|request| request.status = Status::Expired),
                )
                .await
                .map_err(|err| self.map_transition_err(err))?;
            self.committed(&request.id, Status::Expired, None);
            tracing::info!(request_id = %request.id, "request expired, default fallback not applicable");
        }
        Ok(())
    }

    fn build_receipt(
        &self,
        request: &ExecutionRequest,
        result: Value,
        reason: Option<String>,
        completed_by: &str,
        completed_at: DateTime<Utc>,
    ) -> Receipt {
        let evidence_hash = self.hasher.digest(&request.id, &result, completed_at);
        Receipt {
            request_id: request.id.clone(),
            status: Status::Completed,
            result,
            reason,
            completed_by: completed_by.to_string(),
            completed_at,
            duration_seconds: (completed_at - request.created_at).num_seconds(),
            evidence_hash,
        }
    }

    /// Record a committed transition and fan it out. Publication happens
    /// strictly after the commit and its outcome never affects the
    /// transition.
    fn committed(&self, id: &str, status: Status, receipt: Option<&Receipt>) {
        counter!(TRANSITIONS, "status" => status.to_string()).increment(1);
        self.hub.publish(
            id,
            &RequestEvent {
                event: status,
                receipt: receipt.cloned(),
            },
        );
    }

    /// Map store errors from a guarded transition, turning a conflict on an
    /// expired request into the distinct expired error.
    fn map_transition_err(&self, err: StoreError) -> EngineError {
        if matches!(err, StoreError::Conflict { .. }) {
            counter!(TRANSITION_CONFLICTS).increment(1);
        }
        match err {
            StoreError::Conflict {
                current: Status::Expired,
            } => EngineError::Expired,
            other => other.into(),
        }
    }

    fn arm_timer(&self, id: &str, deadline: DateTime<Utc>) {
        let engine = self.clone();
        let request_id = id.to_string();
        self.scheduler.schedule(
            deadline,
            Box::pin(async move {
                if let Err(error) = engine.fire_timeout(&request_id).await {
                    // Expected when a human won the race; the fire is a no-op.
                    tracing::debug!(request_id = %request_id, %error, "timeout fire had no effect");
                }
            }),
        );
    }
}

fn expiry_for(created_at: DateTime<Utc>, timeout_seconds: u64) -> Option<DateTime<Utc>> {
    if timeout_seconds == 0 {
        return None;
    }
    let seconds = i64::try_from(timeout_seconds).unwrap_or(i64::MAX);
    // A deadline outside the representable range saturates; a request
    // created with a timeout always carries one.
    let deadline = chrono::Duration::try_seconds(seconds)
        .and_then(|delta| created_at.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    Some(deadline)
}
