//! # HXP Testing
//!
//! Testing utilities and helpers for the HXP lifecycle engine.
//!
//! This crate provides:
//! - Mock implementations of environment traits (fixed and manually
//!   steppable clocks)
//! - Builders for creation inputs, so tests state only what they care about
//!
//! ## Example
//!
//! ```
//! use hxp_testing::builders::decide;
//!
//! let input = decide("Approve $99/mo?", &["Approve", "Deny"])
//!     .timeout(30, hxp_core::Fallback::Fail)
//!     .build();
//! assert_eq!(input.timeout_seconds, 30);
//! ```

/// Mock implementations for testing.
pub mod mocks {
    use chrono::{DateTime, Duration, Utc};
    use hxp_core::environment::Clock;
    use std::sync::{Mutex, PoisonError};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use hxp_testing::mocks::FixedClock;
    /// use hxp_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Manually steppable clock for tests that need time to pass without
    /// sleeping.
    #[derive(Debug)]
    pub struct ManualClock {
        time: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        /// Create a manual clock starting at the given time
        #[must_use]
        pub const fn new(start: DateTime<Utc>) -> Self {
            Self {
                time: Mutex::new(start),
            }
        }

        /// Advance the clock by whole seconds
        pub fn advance_seconds(&self, seconds: i64) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time += Duration::seconds(seconds);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Builders for creation inputs.
pub mod builders {
    use hxp_core::request::{
        ActionPayload, CreateRequest, Fallback, InputType, Priority, Role,
    };
    use std::collections::HashMap;

    /// Fluent builder around [`CreateRequest`].
    #[derive(Debug, Clone)]
    pub struct CreateRequestBuilder {
        input: CreateRequest,
    }

    impl CreateRequestBuilder {
        /// Start from a payload with SDK defaults for everything else.
        #[must_use]
        pub fn new(payload: ActionPayload) -> Self {
            Self {
                input: CreateRequest {
                    role: Role::Owner,
                    priority: Priority::Normal,
                    timeout_seconds: 0,
                    fallback: Fallback::Pause,
                    agent_id: "test-agent".to_string(),
                    project_id: None,
                    metadata: HashMap::new(),
                    payload,
                },
            }
        }

        /// Set the requesting agent.
        #[must_use]
        pub fn agent(mut self, agent_id: impl Into<String>) -> Self {
            self.input.agent_id = agent_id.into();
            self
        }

        /// Set the routing role.
        #[must_use]
        pub fn role(mut self, role: Role) -> Self {
            self.input.role = role;
            self
        }

        /// Set the priority.
        #[must_use]
        pub fn priority(mut self, priority: Priority) -> Self {
            self.input.priority = priority;
            self
        }

        /// Set the project scope.
        #[must_use]
        pub fn project(mut self, project_id: impl Into<String>) -> Self {
            self.input.project_id = Some(project_id.into());
            self
        }

        /// Add a metadata entry.
        #[must_use]
        pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
            self.input.metadata.insert(key.into(), value.into());
            self
        }

        /// Set a timeout and the fallback applied when it elapses.
        #[must_use]
        pub fn timeout(mut self, seconds: u64, fallback: Fallback) -> Self {
            self.input.timeout_seconds = seconds;
            self.input.fallback = fallback;
            self
        }

        /// Finish the builder.
        #[must_use]
        pub fn build(self) -> CreateRequest {
            self.input
        }
    }

    /// DECIDE input with the given question and options.
    #[must_use]
    pub fn decide(question: &str, options: &[&str]) -> CreateRequestBuilder {
        CreateRequestBuilder::new(ActionPayload::Decide {
            question: question.to_string(),
            options: options.iter().map(ToString::to_string).collect(),
            context: None,
            default_option: None,
        })
    }

    /// DECIDE input with a default option for fallback tests.
    #[must_use]
    pub fn decide_with_default(
        question: &str,
        options: &[&str],
        default_option: &str,
    ) -> CreateRequestBuilder {
        CreateRequestBuilder::new(ActionPayload::Decide {
            question: question.to_string(),
            options: options.iter().map(ToString::to_string).collect(),
            context: None,
            default_option: Some(default_option.to_string()),
        })
    }

    /// APPROVE input with the given item and details.
    #[must_use]
    pub fn approve(
        item: &str,
        details: serde_json::Value,
        reject_requires_reason: bool,
    ) -> CreateRequestBuilder {
        CreateRequestBuilder::new(ActionPayload::Approve {
            item: item.to_string(),
            details,
            context: None,
            reject_requires_reason,
        })
    }

    /// PROVIDE input with the given prompt.
    #[must_use]
    pub fn provide(prompt: &str, input_type: InputType) -> CreateRequestBuilder {
        CreateRequestBuilder::new(ActionPayload::Provide {
            prompt: prompt.to_string(),
            input_type,
            context: None,
            placeholder: None,
            validation: None,
        })
    }
}

/// Install a compact tracing subscriber for test output.
///
/// Safe to call from every test; only the first call installs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}
