//! # HXP Core
//!
//! Domain layer for the Human Execution Protocol (HXP) lifecycle engine.
//!
//! HXP lets autonomous agents delegate a bounded action to a human and resume
//! once a verifiable receipt exists. This crate holds everything that is pure
//! domain logic, independent of any runtime:
//!
//! - **Data model**: [`request::ExecutionRequest`], [`request::Receipt`], and
//!   the action/role/priority/fallback/status vocabulary
//! - **Validation engine**: payload-shape checks at creation and result-shape
//!   checks at resolution ([`validation`])
//! - **Evidence hasher**: shared-secret SHA-256 digest over receipt fields
//!   ([`evidence`])
//! - **Role router**: static ownership plus ordered delegation rules
//!   ([`routing`])
//! - **Storage port**: the abstract [`store::RequestStore`] with its
//!   compare-and-transition primitive, the sole arbiter of mutation races
//! - **Environment traits**: [`environment::Clock`] for injectable time
//!
//! The imperative shell (state machine, scheduler, notification hub, in-memory
//! store) lives in the `hxp-runtime` crate.
//!
//! ## Architecture Principles
//!
//! - Functional core, imperative shell
//! - Every mutation funnels through one CAS-guarded transition
//! - Explicit dependency injection via traits (`Clock`, `RequestStore`)
//! - Dyn-compatible async ports (`Pin<Box<dyn Future>>` rather than `async fn`)

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};

pub mod environment;
pub mod error;
pub mod evidence;
pub mod request;
pub mod routing;
pub mod store;
pub mod validation;

pub use error::EngineError;
pub use evidence::EvidenceHasher;
pub use request::{
    Action, ActionPayload, CreateRequest, DelegationRule, ExecutionRequest, Fallback, InputType,
    Priority, Receipt, RequestEvent, Role, Status,
};
pub use routing::{RoleRouter, RouteTarget, RouterConfig};
pub use store::{RequestFilter, RequestStore, StoreError};
