//! Role router: resolve which human should receive a request.
//!
//! Routing input is static ownership (per-agent owners plus a default) and
//! an ordered, append-only list of [`DelegationRule`]s. Rule order is match
//! priority: the first rule whose action matches the request's action and
//! whose tag or project matches the request wins.
//!
//! `role = pool` routing has no selection algorithm; it resolves to the
//! explicit [`RouteTarget::Pool`] placeholder.

use crate::request::{DelegationRule, ExecutionRequest};
use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Where a request should be routed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteTarget {
    /// A concrete human identity
    Human(String),
    /// Any qualified human; concrete selection is deferred future work
    Pool,
}

impl fmt::Display for RouteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Human(identity) => write!(f, "{identity}"),
            Self::Pool => write!(f, "pool"),
        }
    }
}

/// Static ownership configuration for the router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Owner identity used when an agent has no specific owner configured
    pub default_owner: String,
    /// Per-agent owner identities
    pub owners: HashMap<String, String>,
}

impl RouterConfig {
    /// Configuration with only a default owner.
    #[must_use]
    pub fn with_default_owner(owner: impl Into<String>) -> Self {
        Self {
            default_owner: owner.into(),
            owners: HashMap::new(),
        }
    }

    /// Register a specific owner for an agent.
    #[must_use]
    pub fn with_owner(mut self, agent_id: impl Into<String>, owner: impl Into<String>) -> Self {
        self.owners.insert(agent_id.into(), owner.into());
        self
    }
}

/// Resolves the target human (or pool) for a request.
///
/// Delegation rules are held as explicit ordered state inside the router,
/// append-only through [`add_rule`](Self::add_rule).
#[derive(Debug)]
pub struct RoleRouter {
    config: RouterConfig,
    rules: RwLock<Vec<DelegationRule>>,
}

impl RoleRouter {
    /// Create a router with the given ownership configuration and no rules.
    #[must_use]
    pub fn new(config: RouterConfig) -> Self {
        Self {
            config,
            rules: RwLock::new(Vec::new()),
        }
    }

    /// Append a delegation rule. Rules cannot be reordered or removed.
    pub fn add_rule(&self, rule: DelegationRule) {
        self.write_rules().push(rule);
    }

    /// The full ordered rule list.
    #[must_use]
    pub fn rules(&self) -> Vec<DelegationRule> {
        self.read_rules().clone()
    }

    /// Resolve the routing target for a request.
    #[must_use]
    pub fn resolve(&self, request: &ExecutionRequest) -> RouteTarget {
        match request.role {
            crate::request::Role::Owner => RouteTarget::Human(self.owner_for(&request.agent_id)),
            crate::request::Role::Delegate => {
                let rules = self.read_rules();
                let matched = rules
                    .iter()
                    .find(|rule| rule_matches(rule, request))
                    .map(|rule| rule.delegate_to.clone());
                // No matching rule falls back to the owner.
                RouteTarget::Human(
                    matched.unwrap_or_else(|| self.owner_for(&request.agent_id)),
                )
            }
            crate::request::Role::Pool => RouteTarget::Pool,
        }
    }

    fn owner_for(&self, agent_id: &str) -> String {
        self.config
            .owners
            .get(agent_id)
            .cloned()
            .unwrap_or_else(|| self.config.default_owner.clone())
    }

    fn read_rules(&self) -> RwLockReadGuard<'_, Vec<DelegationRule>> {
        self.rules.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_rules(&self) -> RwLockWriteGuard<'_, Vec<DelegationRule>> {
        self.rules.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A rule matches when its action equals the request's action and either its
/// tag appears among the request's metadata values or its project id equals
/// the request's project id.
fn rule_matches(rule: &DelegationRule, request: &ExecutionRequest) -> bool {
    if rule.action != request.action() {
        return false;
    }
    let tag_match = rule
        .tag
        .as_ref()
        .is_some_and(|tag| request.metadata.values().any(|value| value == tag));
    let project_match = rule.project_id.is_some() && rule.project_id == request.project_id;
    tag_match || project_match
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

    use super::*;
    use crate::request::{
        Action, ActionPayload, ExecutionRequest, Fallback, Priority, Role, Status,
    };
    use chrono::Utc;
    use std::collections::HashMap;

    fn request(role: Role, project_id: Option<&str>, tags: &[&str]) -> ExecutionRequest {
        let mut metadata = HashMap::new();
        for (index, tag) in tags.iter().enumerate() {
            metadata.insert(format!("tag{index}"), (*tag).to_string());
        }
        ExecutionRequest {
            id: "r-1".to_string(),
            role,
            priority: Priority::Normal,
            timeout_seconds: 0,
            fallback: Fallback::Pause,
            agent_id: "agent-1".to_string(),
            project_id: project_id.map(ToString::to_string),
            metadata,
            payload: ActionPayload::Approve {
                item: "Deploy".to_string(),
                details: serde_json::json!({}),
                context: None,
                reject_requires_reason: false,
            },
            status: Status::Pending,
            assigned_to: None,
            created_at: Utc::now(),
            expires_at: None,
            receipt: None,
        }
    }

    fn rule(action: Action, tag: Option<&str>, project_id: Option<&str>, to: &str) -> DelegationRule {
        DelegationRule {
            action,
            tag: tag.map(ToString::to_string),
            project_id: project_id.map(ToString::to_string),
            delegate_to: to.to_string(),
        }
    }

    #[test]
    fn owner_role_routes_to_configured_owner() {
        let router = RoleRouter::new(
            RouterConfig::with_default_owner("fallback@example.com")
                .with_owner("agent-1", "alice@example.com"),
        );
        assert_eq!(
            router.resolve(&request(Role::Owner, None, &[])),
            RouteTarget::Human("alice@example.com".to_string())
        );
    }

    #[test]
    fn unknown_agent_routes_to_default_owner() {
        let router = RoleRouter::new(RouterConfig::with_default_owner("fallback@example.com"));
        assert_eq!(
            router.resolve(&request(Role::Owner, None, &[])),
            RouteTarget::Human("fallback@example.com".to_string())
        );
    }

    #[test]
    fn first_matching_rule_wins() {
        let router = RoleRouter::new(RouterConfig::with_default_owner("owner@example.com"));
        router.add_rule(rule(Action::Approve, Some("deploys"), None, "first@example.com"));
        router.add_rule(rule(Action::Approve, Some("deploys"), None, "second@example.com"));

        assert_eq!(
            router.resolve(&request(Role::Delegate, None, &["deploys"])),
            RouteTarget::Human("first@example.com".to_string())
        );
    }

    #[test]
    fn rule_matches_on_project_when_tag_does_not() {
        let router = RoleRouter::new(RouterConfig::with_default_owner("owner@example.com"));
        router.add_rule(rule(
            Action::Approve,
            Some("unrelated"),
            Some("proj-1"),
            "delegate@example.com",
        ));

        assert_eq!(
            router.resolve(&request(Role::Delegate, Some("proj-1"), &[])),
            RouteTarget::Human("delegate@example.com".to_string())
        );
    }

    #[test]
    fn wrong_action_rules_are_skipped() {
        let router = RoleRouter::new(RouterConfig::with_default_owner("owner@example.com"));
        router.add_rule(rule(Action::Decide, Some("deploys"), None, "decider@example.com"));

        assert_eq!(
            router.resolve(&request(Role::Delegate, None, &["deploys"])),
            RouteTarget::Human("owner@example.com".to_string())
        );
    }

    #[test]
    fn no_match_falls_back_to_owner() {
        let router = RoleRouter::new(RouterConfig::with_default_owner("owner@example.com"));
        assert_eq!(
            router.resolve(&request(Role::Delegate, None, &["deploys"])),
            RouteTarget::Human("owner@example.com".to_string())
        );
    }

    #[test]
    fn pool_role_is_an_unresolved_placeholder() {
        let router = RoleRouter::new(RouterConfig::with_default_owner("owner@example.com"));
        assert_eq!(router.resolve(&request(Role::Pool, None, &[])), RouteTarget::Pool);
    }

    #[test]
    fn rules_are_append_only_and_ordered() {
        let router = RoleRouter::new(RouterConfig::with_default_owner("owner@example.com"));
        router.add_rule(rule(Action::Approve, Some("a"), None, "one@example.com"));
        router.add_rule(rule(Action::Decide, Some("b"), None, "two@example.com"));
        let rules = router.rules();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].delegate_to, "one@example.com");
        assert_eq!(rules[1].delegate_to, "two@example.com");
    }
}
