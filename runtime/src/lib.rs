//! # HXP Runtime
//!
//! Runtime implementation for the HXP Execution Request Lifecycle Engine.
//!
//! This crate provides the imperative shell around the `hxp-core` domain
//! layer:
//!
//! - **[`ExecutionEngine`]**: the lifecycle state machine; the only writer
//!   of request status and receipts, with every mutation going through the
//!   store's CAS transition
//! - **[`memory_store::InMemoryRequestStore`]**: the default single-process
//!   store implementation
//! - **[`scheduler::TokioScheduler`]**: one-shot deferred timeout firing
//! - **[`hub::NotificationHub`]**: best-effort pub/sub fan-out of lifecycle
//!   events to per-request subscribers
//! - **[`metrics`]**: Prometheus metric registration and exporter
//!
//! ## Example
//!
//! ```no_run
//! use hxp_core::{ActionPayload, CreateRequest, RouterConfig};
//! use hxp_runtime::{EngineConfig, ExecutionEngine};
//!
//! # async fn example() -> Result<(), hxp_core::EngineError> {
//! let engine = ExecutionEngine::in_memory(
//!     EngineConfig::new("server-secret"),
//!     RouterConfig::with_default_owner("owner@example.com"),
//! );
//!
//! let created = engine
//!     .create(CreateRequest {
//!         role: hxp_core::Role::Owner,
//!         priority: hxp_core::Priority::Normal,
//!         timeout_seconds: 0,
//!         fallback: hxp_core::Fallback::Pause,
//!         agent_id: "build-agent".to_string(),
//!         project_id: None,
//!         metadata: std::collections::HashMap::new(),
//!         payload: ActionPayload::Decide {
//!             question: "Approve $99/mo plan?".to_string(),
//!             options: vec!["Approve".to_string(), "Deny".to_string()],
//!             context: None,
//!             default_option: None,
//!         },
//!     })
//!     .await?;
//!
//! let receipt = engine
//!     .resolve(&created.request_id, serde_json::json!("Approve"), None, "owner@example.com")
//!     .await?;
//! assert_eq!(receipt.result, serde_json::json!("Approve"));
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod hub;
pub mod memory_store;
pub mod metrics;
pub mod scheduler;

pub use engine::{
    AgentFilter, CreatedRequest, EngineConfig, ExecutionEngine, Inbox, InboxFilter,
};
pub use hub::{NotificationHub, Subscription};
pub use memory_store::InMemoryRequestStore;
pub use scheduler::{Scheduler, TimerHandle, TokioScheduler};
