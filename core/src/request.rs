//! Execution request data model.
//!
//! The [`ExecutionRequest`] is the aggregate the whole engine revolves around:
//! an agent's delegation of one bounded action (DECIDE / APPROVE / PROVIDE) to
//! a human, tracked from creation to a terminal status. A completed request
//! owns exactly one [`Receipt`], created atomically with the transition that
//! completed it.
//!
//! # Invariants
//!
//! - `receipt` is `Some` if and only if `status == Status::Completed`
//! - Once a request reaches a terminal status it is immutable forever
//! - `expires_at` is `Some` exactly when `timeout_seconds > 0`
//!
//! Both invariants are enforced by the lifecycle engine in `hxp-runtime`; the
//! types here carry the data, the CAS transition in [`crate::store`] guards
//! the writes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// The kind of bounded human task an agent can delegate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    /// Choose between 2-6 options
    Decide,
    /// Approve or reject an item
    Approve,
    /// Supply a piece of information
    Provide,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decide => write!(f, "DECIDE"),
            Self::Approve => write!(f, "APPROVE"),
            Self::Provide => write!(f, "PROVIDE"),
        }
    }
}

/// How the target human for a request is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The agent's statically configured owner
    #[default]
    Owner,
    /// Routed through the ordered delegation rules
    Delegate,
    /// Any qualified human (selection algorithm deliberately unspecified)
    Pool,
}

/// Request priority, used for inbox ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Background work
    Low,
    /// Default priority
    #[default]
    Normal,
    /// Needs attention soon
    High,
    /// Drop everything
    Critical,
}

impl Priority {
    /// Inbox sort rank: critical first (0), low last (3).
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Critical => 0,
            Self::High => 1,
            Self::Normal => 2,
            Self::Low => 3,
        }
    }
}

/// Policy applied when a request's timeout elapses unresolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fallback {
    /// Leave the request pending indefinitely
    #[default]
    Pause,
    /// Fail the request
    Fail,
    /// Complete with the payload's default option, if one is applicable
    Default,
}

/// Lifecycle status of an execution request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Created, waiting for a human
    Pending,
    /// Claimed by a specific human
    Assigned,
    /// Resolved with a receipt
    Completed,
    /// Timed out without a usable fallback
    Expired,
    /// Explicitly cancelled by its owner
    Cancelled,
    /// Timed out with `fallback = fail`
    Failed,
}

impl Status {
    /// Whether this status permits no further transitions.
    ///
    /// `Expired` is terminal from the caller's point of view: resolve and
    /// cancel are rejected on it. The one exception, the atomic
    /// default-fallback rewrite to `Completed`, happens inside the same
    /// timeout-fire transition and is never observable as two steps.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Expired | Self::Cancelled | Self::Failed
        )
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Assigned => write!(f, "assigned"),
            Self::Completed => write!(f, "completed"),
            Self::Expired => write!(f, "expired"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Input kind hint for PROVIDE requests.
///
/// The hint is carried to the human UI; the engine performs no type coercion
/// of submitted results against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    /// Free-form text
    #[default]
    Text,
    /// Numeric value
    Number,
    /// URL
    Url,
    /// Email address
    Email,
    /// File upload
    File,
    /// Selection from a UI-provided list
    Selection,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Action-specific payload, tagged by the action kind.
///
/// The request's action is derived from the payload variant, so the two can
/// never disagree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionPayload {
    /// Ask a human to choose between options.
    Decide {
        /// The decision to be made
        question: String,
        /// 2-6 choices
        options: Vec<String>,
        /// Optional background info, at most 500 characters
        #[serde(default, skip_serializing_if = "Option::is_none")]
        context: Option<String>,
        /// Option applied on timeout when `fallback = default`
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default_option: Option<String>,
    },
    /// Ask a human to approve or reject something.
    Approve {
        /// What needs approval
        item: String,
        /// Structured data about the item; shape is not inspected further
        #[serde(default = "empty_object")]
        details: Value,
        /// Why approval is needed
        #[serde(default, skip_serializing_if = "Option::is_none")]
        context: Option<String>,
        /// When true, rejecting requires a non-empty reason
        #[serde(default)]
        reject_requires_reason: bool,
    },
    /// Ask a human to supply information.
    Provide {
        /// What information is needed
        prompt: String,
        /// Input kind hint for the UI
        #[serde(default)]
        input_type: InputType,
        /// Why this information is needed
        #[serde(default, skip_serializing_if = "Option::is_none")]
        context: Option<String>,
        /// UI placeholder text
        #[serde(default, skip_serializing_if = "Option::is_none")]
        placeholder: Option<String>,
        /// Free-form constraint object. Stored verbatim; the engine does not
        /// enforce it against submitted results.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        validation: Option<Value>,
    },
}

impl ActionPayload {
    /// The action kind this payload belongs to.
    #[must_use]
    pub const fn action(&self) -> Action {
        match self {
            Self::Decide { .. } => Action::Decide,
            Self::Approve { .. } => Action::Approve,
            Self::Provide { .. } => Action::Provide,
        }
    }
}

/// Receipt produced when a request completes.
///
/// Owned 1:1 by its request, created at resolution time inside the same
/// atomic transition that set `status = completed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    /// Back-reference to the owning request
    pub request_id: String,
    /// Mirror of the owning request's terminal status
    pub status: Status,
    /// The human's answer: an option string for DECIDE, `"approved"` /
    /// `"rejected"` for APPROVE, the provided value for PROVIDE
    pub result: Value,
    /// Rejection reason or fallback narration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Human identity, or the literal `"system"` for fallback-default
    /// completions
    pub completed_by: String,
    /// When the request was resolved
    pub completed_at: DateTime<Utc>,
    /// Whole seconds between creation and completion
    pub duration_seconds: i64,
    /// Shared-secret SHA-256 digest over the receipt fields (tamper evidence,
    /// not a public signature)
    pub evidence_hash: String,
}

impl Receipt {
    /// For APPROVE receipts: whether the human approved.
    #[must_use]
    pub fn is_approved(&self) -> bool {
        self.result.as_str() == Some("approved")
    }

    /// For APPROVE receipts: whether the human rejected.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        self.result.as_str() == Some("rejected")
    }
}

/// Identity completing fallback-default receipts.
pub const SYSTEM_IDENTITY: &str = "system";

/// A request for one bounded human action, tracked from creation to a
/// terminal resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Opaque unique id (UUIDv4)
    pub id: String,
    /// How the target human is determined
    pub role: Role,
    /// Inbox ordering priority
    pub priority: Priority,
    /// Seconds until timeout; 0 means no timeout
    pub timeout_seconds: u64,
    /// Policy applied when the timeout elapses unresolved
    pub fallback: Fallback,
    /// The agent that created the request
    pub agent_id: String,
    /// Optional project scope, used by delegation rules
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Free-form string metadata; values are matched against delegation-rule
    /// tags
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
    /// Action-specific payload
    pub payload: ActionPayload,
    /// Current lifecycle status
    pub status: Status,
    /// Human who claimed the request, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// `created_at + timeout_seconds` when a timeout is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Present exactly when `status == completed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt: Option<Receipt>,
}

impl ExecutionRequest {
    /// The action kind, derived from the payload.
    #[must_use]
    pub const fn action(&self) -> Action {
        self.payload.action()
    }

    /// Whether the request has reached a terminal status.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Input for creating an execution request.
///
/// Defaults mirror the protocol SDK: `role = owner`, `priority = normal`,
/// `fallback = pause`, no timeout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRequest {
    /// How the target human is determined
    #[serde(default)]
    pub role: Role,
    /// Inbox ordering priority
    #[serde(default)]
    pub priority: Priority,
    /// Seconds until timeout; 0 means no timeout
    #[serde(default)]
    pub timeout_seconds: u64,
    /// Policy applied when the timeout elapses unresolved
    #[serde(default)]
    pub fallback: Fallback,
    /// The agent creating the request
    pub agent_id: String,
    /// Optional project scope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Free-form string metadata
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
    /// Action-specific payload (determines the action kind)
    #[serde(flatten)]
    pub payload: ActionPayload,
}

/// An ordered delegation rule: the first rule matching a request's action and
/// tag/project routes it to `delegate_to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationRule {
    /// Action kind this rule applies to
    pub action: Action,
    /// Matches when any metadata value on the request equals this tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Matches when the request carries the same project id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Human identity to route to
    pub delegate_to: String,
}

/// Lifecycle event frame fanned out to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEvent {
    /// The status the request transitioned to
    pub event: Status,
    /// The receipt, for completed transitions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt: Option<Receipt>,
}
