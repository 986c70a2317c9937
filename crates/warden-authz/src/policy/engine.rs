//! Policy evaluation engine
//!
//! Rule-ordered, first-match-wins evaluation: roles in the order declared on
//! the user, each role's policies in declared order, and the
//! `(resource, action)` cross-product within a policy. An unsatisfied
//! condition is a terminal deny, not a keep-looking. Every path returns a
//! Decision.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::store::{PolicyStore, Snapshot, TenantPolicies};
use super::{AccessRequest, Decision, Effect, RelationGraph};
use crate::error::Result;

/// A subject resolved through the identity directory
#[derive(Debug, Clone)]
pub struct DirectoryUser {
    /// Username inside the tenant
    pub username: String,
    /// Roles in evaluation order
    pub roles: Vec<String>,
}

/// The slice of the identity directory the engine consumes: resolve a
/// subject inside a tenant to a user with roles.
#[async_trait]
pub trait SubjectDirectory: Send + Sync {
    /// Resolve `subject` within `tenant`; `Ok(None)` when unknown.
    async fn lookup(&self, tenant: &str, subject: &str) -> Result<Option<DirectoryUser>>;
}

/// Deterministic hook computing advice for deny decisions from their context
pub type RemediationFn = dyn Fn(&BTreeMap<String, String>) -> Option<String> + Send + Sync;

/// Policy evaluation engine over a store snapshot
pub struct PolicyEngine {
    store: Arc<PolicyStore>,
    directory: Option<Arc<dyn SubjectDirectory>>,
    remediation: Option<Box<RemediationFn>>,
}

impl PolicyEngine {
    /// Create an engine over the given store
    pub fn new(store: Arc<PolicyStore>) -> Self {
        Self {
            store,
            directory: None,
            remediation: None,
        }
    }

    /// Attach an identity directory consulted when a subject is not in the
    /// store and the request names a tenant
    pub fn with_directory(mut self, directory: Arc<dyn SubjectDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Attach a remediation hook filling `advice` on deny decisions that
    /// carry none
    pub fn with_remediation<F>(mut self, hook: F) -> Self
    where
        F: Fn(&BTreeMap<String, String>) -> Option<String> + Send + Sync + 'static,
    {
        self.remediation = Some(Box::new(hook));
        self
    }

    /// Evaluate an access request to a Decision.
    ///
    /// The tenant is taken from `environment["tenantID"]`, defaulting to
    /// `"default"`. When the direct subject reaches no policy, delegation
    /// expands through `user:*` graph successors and the first delegate whose
    /// evaluation cites a policy decides.
    pub async fn evaluate(&self, request: &AccessRequest) -> Decision {
        let snapshot = self.store.snapshot();
        let tenant_id = request
            .environment
            .get("tenantID")
            .cloned()
            .unwrap_or_else(|| "default".to_string());

        let mut context = BTreeMap::new();
        context.insert("subject".to_string(), request.subject.clone());
        context.insert("resource".to_string(), request.resource.clone());
        context.insert("action".to_string(), request.action.clone());

        let mut trace = Vec::new();
        let mut decision = self
            .evaluate_subject(&snapshot, &tenant_id, &request.subject, request, &mut trace)
            .await;

        if decision.policy_id.is_none() {
            if let Some(delegated) = self
                .evaluate_delegates(&snapshot, &tenant_id, request, &mut trace)
                .await
            {
                decision = delegated;
            }
        }

        decision.context = context;
        decision.trace = trace;

        if !decision.allow && decision.advice.is_none() {
            if let Some(hook) = &self.remediation {
                decision.advice = hook(&decision.context);
            }
        }

        debug!(
            subject = %request.subject,
            resource = %request.resource,
            action = %request.action,
            allow = decision.allow,
            reason = %decision.reason,
            "evaluated access request"
        );
        decision
    }

    /// Retry the evaluation for each `user:*` successor of the subject, in
    /// BFS order. The first delegate reaching a terminal decision wins.
    async fn evaluate_delegates(
        &self,
        snapshot: &Snapshot,
        tenant_id: &str,
        request: &AccessRequest,
        trace: &mut Vec<String>,
    ) -> Option<Decision> {
        let graph = &snapshot.tenant(tenant_id)?.graph;
        if graph.is_empty() {
            return None;
        }

        for node in graph.reachable_users(&format!("user:{}", request.subject)) {
            let delegate = node.trim_start_matches("user:").to_string();
            let mut attempt = self
                .evaluate_subject(snapshot, tenant_id, &delegate, request, trace)
                .await;
            if attempt.policy_id.is_some() {
                attempt.delegator = Some(delegate);
                return Some(attempt);
            }
        }
        None
    }

    /// Walk one subject's roles and policies. Terminal outcomes cite a
    /// policy id; `user not found` and `no matching policy` do not.
    async fn evaluate_subject(
        &self,
        snapshot: &Snapshot,
        tenant_id: &str,
        subject: &str,
        request: &AccessRequest,
        trace: &mut Vec<String>,
    ) -> Decision {
        let tenant = snapshot.tenant(tenant_id);

        let roles = match tenant.and_then(|t| t.users.get(subject)) {
            Some(user) => user.roles.clone(),
            None => match self.directory_roles(tenant_id, subject, request).await {
                Some(roles) => roles,
                None => {
                    trace.push("user not found".to_string());
                    return Decision::unmatched("user not found");
                }
            },
        };

        let Some(tenant) = tenant else {
            trace.push("no matching policy".to_string());
            return Decision::unmatched("no matching policy");
        };

        for role_name in &roles {
            let Some(role) = tenant.roles.get(role_name) else {
                continue;
            };
            for policy_id in &role.policies {
                let Some(policy) = tenant.policies.get(policy_id) else {
                    continue;
                };

                if !policy.subjects.is_empty()
                    && !policy.subjects.iter().any(|s| s.role == *role_name)
                {
                    trace.push(format!("policy {} skipped: subject mismatch", policy.id));
                    continue;
                }

                if !matches_request(policy, request, tenant) {
                    trace.push(format!("policy {} did not match", policy.id));
                    continue;
                }

                if !conditions_hold(&policy.conditions, request)
                    || !conditions_hold(&policy.when, request)
                {
                    trace.push(format!(
                        "policy {} failed: conditions not satisfied",
                        policy.id
                    ));
                    return Decision {
                        allow: false,
                        policy_id: Some(policy.id.clone()),
                        reason: "conditions not satisfied".to_string(),
                        advice: policy.advice.clone(),
                        ..Decision::unmatched("")
                    };
                }

                return match policy.effect {
                    Effect::Allow => {
                        trace.push(format!("policy {} matched: allow", policy.id));
                        Decision {
                            allow: true,
                            policy_id: Some(policy.id.clone()),
                            reason: "allowed by policy".to_string(),
                            ..Decision::unmatched("")
                        }
                    }
                    Effect::Deny => {
                        trace.push(format!("policy {} matched: deny", policy.id));
                        Decision {
                            allow: false,
                            policy_id: Some(policy.id.clone()),
                            reason: "denied by policy".to_string(),
                            advice: policy.advice.clone(),
                            ..Decision::unmatched("")
                        }
                    }
                };
            }
        }

        trace.push("no matching policy".to_string());
        Decision::unmatched("no matching policy")
    }

    /// Consult the directory for a subject missing from the store. Only done
    /// when the request names a tenant explicitly; the resolved user is
    /// treated as in-store for this request only.
    async fn directory_roles(
        &self,
        tenant_id: &str,
        subject: &str,
        request: &AccessRequest,
    ) -> Option<Vec<String>> {
        if !request.environment.contains_key("tenantID") {
            return None;
        }
        let directory = self.directory.as_ref()?;
        match directory.lookup(tenant_id, subject).await {
            Ok(Some(user)) => Some(user.roles),
            Ok(None) => None,
            Err(err) => {
                debug!(error = %err, tenant = %tenant_id, subject = %subject, "directory lookup failed");
                None
            }
        }
    }
}

/// Whether any `(resource, action)` pair of the policy matches the request.
fn matches_request(
    policy: &super::Policy,
    request: &AccessRequest,
    tenant: &TenantPolicies,
) -> bool {
    policy.resource.iter().any(|res_term| {
        resource_matches(res_term, &request.resource, &tenant.graph)
            && policy
                .action
                .iter()
                .any(|act_term| act_term == "*" || act_term == &request.action)
    })
}

/// A resource term matches on `"*"` or literal equality; otherwise the
/// relation graph may connect `group:<term>` to `resource:<request>`.
fn resource_matches(term: &str, resource: &str, graph: &RelationGraph) -> bool {
    if term == "*" || term == resource {
        return true;
    }
    graph.path_exists(&format!("group:{term}"), &format!("resource:{resource}"))
}

/// Conjunctive equality predicates over the request environment.
fn conditions_hold(predicates: &BTreeMap<String, String>, request: &AccessRequest) -> bool {
    predicates
        .iter()
        .all(|(key, want)| request.environment.get(key) == Some(want))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::policy::AccessRequest;

    const POLICIES: &str = r#"
tenants:
  default:
    roles:
      admin:
        policies: ["p-deny-secrets", "p-allow-files"]
      auditor:
        policies: ["p-audit"]
      gated:
        policies: ["p-gated"]
    policies:
      - id: p-allow-files
        effect: allow
        resource: ["file1", "file2"]
        action: ["read", "write"]
      - id: p-deny-secrets
        effect: deny
        resource: ["vault"]
        action: ["*"]
        advice: "request vault access through your manager"
      - id: p-audit
        effect: allow
        subjects: [{ role: admin }]
        resource: ["*"]
        action: ["audit"]
      - id: p-gated
        effect: allow
        resource: ["file1"]
        action: ["read"]
        conditions: { env: prod }
    users:
      - username: user1
        roles: [admin]
      - username: user2
        roles: [auditor]
      - username: gateduser
        roles: [gated]
    graph:
      - { from: "user:intern", to: "user:user1" }
      - { from: "user:looper", to: "user:looper" }
      - { from: "group:reports", to: "resource:report42" }
"#;

    fn engine() -> PolicyEngine {
        PolicyEngine::new(Arc::new(PolicyStore::from_yaml(POLICIES).expect("store")))
    }

    fn request(subject: &str, resource: &str, action: &str) -> AccessRequest {
        AccessRequest {
            subject: subject.to_string(),
            resource: resource.to_string(),
            action: action.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_allow_by_policy() {
        let decision = engine().evaluate(&request("user1", "file1", "read")).await;

        assert!(decision.allow);
        assert_eq!(decision.policy_id.as_deref(), Some("p-allow-files"));
        assert_eq!(decision.reason, "allowed by policy");
        assert_eq!(decision.context["subject"], "user1");
        assert!(decision
            .trace
            .contains(&"policy p-allow-files matched: allow".to_string()));
    }

    #[tokio::test]
    async fn test_deny_by_policy_with_advice() {
        let decision = engine().evaluate(&request("user1", "vault", "read")).await;

        assert!(!decision.allow);
        assert_eq!(decision.policy_id.as_deref(), Some("p-deny-secrets"));
        assert_eq!(decision.reason, "denied by policy");
        assert_eq!(
            decision.advice.as_deref(),
            Some("request vault access through your manager")
        );
    }

    #[tokio::test]
    async fn test_deny_beats_allow_when_declared_earlier() {
        // p-deny-secrets is listed before p-allow-files on the admin role;
        // a wildcard action deny on vault wins even though no allow follows.
        let decision = engine().evaluate(&request("user1", "vault", "write")).await;
        assert!(!decision.allow);
        assert_eq!(decision.policy_id.as_deref(), Some("p-deny-secrets"));
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let decision = engine().evaluate(&request("ghost", "file1", "read")).await;

        assert!(!decision.allow);
        assert_eq!(decision.reason, "user not found");
        assert!(decision.policy_id.is_none());
        assert_eq!(decision.trace, vec!["user not found"]);
    }

    #[tokio::test]
    async fn test_no_matching_policy() {
        let decision = engine().evaluate(&request("user1", "file9", "read")).await;

        assert!(!decision.allow);
        assert_eq!(decision.reason, "no matching policy");
        assert!(decision.policy_id.is_none());
        assert_eq!(*decision.trace.last().unwrap(), "no matching policy");
    }

    #[tokio::test]
    async fn test_subject_mismatch_skips_policy() {
        // user2 carries p-audit, but the policy is scoped to role admin.
        let decision = engine().evaluate(&request("user2", "file1", "audit")).await;

        assert!(!decision.allow);
        assert!(decision
            .trace
            .contains(&"policy p-audit skipped: subject mismatch".to_string()));
        assert_eq!(decision.reason, "no matching policy");
    }

    #[tokio::test]
    async fn test_condition_failure_is_terminal() {
        let mut req = request("gateduser", "file1", "read");
        req.environment
            .insert("env".to_string(), "dev".to_string());

        let decision = engine().evaluate(&req).await;

        assert!(!decision.allow);
        assert_eq!(decision.policy_id.as_deref(), Some("p-gated"));
        assert_eq!(decision.reason, "conditions not satisfied");
        assert!(decision
            .trace
            .contains(&"policy p-gated failed: conditions not satisfied".to_string()));
    }

    #[tokio::test]
    async fn test_condition_satisfied_allows() {
        let mut req = request("gateduser", "file1", "read");
        req.environment
            .insert("env".to_string(), "prod".to_string());

        let decision = engine().evaluate(&req).await;
        assert!(decision.allow);
        assert_eq!(decision.policy_id.as_deref(), Some("p-gated"));
    }

    #[tokio::test]
    async fn test_when_predicates_are_second_conjunctive_group() {
        let yaml = r#"
tenants:
  default:
    roles:
      ops:
        policies: ["p-hours"]
    policies:
      - id: p-hours
        effect: allow
        resource: ["console"]
        action: ["open"]
        conditions: { env: prod }
        when: { hours: business }
    users:
      - username: op1
        roles: [ops]
"#;
        let engine = PolicyEngine::new(Arc::new(PolicyStore::from_yaml(yaml).unwrap()));

        let mut req = request("op1", "console", "open");
        req.environment.insert("env".to_string(), "prod".to_string());
        req.environment
            .insert("hours".to_string(), "after-hours".to_string());

        let decision = engine.evaluate(&req).await;
        assert!(!decision.allow);
        assert_eq!(decision.reason, "conditions not satisfied");

        req.environment
            .insert("hours".to_string(), "business".to_string());
        assert!(engine.evaluate(&req).await.allow);
    }

    #[tokio::test]
    async fn test_group_resource_match() {
        let yaml = r#"
tenants:
  default:
    roles:
      analyst:
        policies: ["p-reports"]
    policies:
      - id: p-reports
        effect: allow
        resource: ["reports"]
        action: ["read"]
    users:
      - username: ana
        roles: [analyst]
    graph:
      - { from: "group:reports", to: "resource:report42" }
"#;
        let engine = PolicyEngine::new(Arc::new(PolicyStore::from_yaml(yaml).unwrap()));

        let decision = engine.evaluate(&request("ana", "report42", "read")).await;
        assert!(decision.allow);
        assert_eq!(decision.policy_id.as_deref(), Some("p-reports"));

        let decision = engine.evaluate(&request("ana", "report99", "read")).await;
        assert!(!decision.allow);
    }

    #[tokio::test]
    async fn test_delegation_reaches_successor_policies() {
        // intern is not a store user, but user:intern -> user:user1.
        let decision = engine().evaluate(&request("intern", "file1", "read")).await;

        assert!(decision.allow);
        assert_eq!(decision.policy_id.as_deref(), Some("p-allow-files"));
        assert_eq!(decision.delegator.as_deref(), Some("user1"));
        // Context still describes the original subject.
        assert_eq!(decision.context["subject"], "intern");
    }

    #[tokio::test]
    async fn test_delegation_cycle_terminates() {
        let decision = engine().evaluate(&request("looper", "file1", "read")).await;

        assert!(!decision.allow);
        assert!(decision.delegator.is_none());
        assert_eq!(decision.reason, "user not found");
    }

    #[tokio::test]
    async fn test_tenant_scoping_from_environment() {
        let yaml = r#"
tenants:
  default:
    roles:
      admin:
        policies: ["p1"]
    policies:
      - id: p1
        effect: allow
        resource: ["*"]
        action: ["*"]
    users:
      - username: root
        roles: [admin]
  acme:
    roles: {}
    users: []
"#;
        let engine = PolicyEngine::new(Arc::new(PolicyStore::from_yaml(yaml).unwrap()));

        assert!(engine.evaluate(&request("root", "file1", "read")).await.allow);

        let mut req = request("root", "file1", "read");
        req.environment
            .insert("tenantID".to_string(), "acme".to_string());
        let decision = engine.evaluate(&req).await;
        assert!(!decision.allow);
        assert_eq!(decision.reason, "user not found");
    }

    #[tokio::test]
    async fn test_directory_fallback_resolves_subject() {
        struct StaticDirectory;

        #[async_trait]
        impl SubjectDirectory for StaticDirectory {
            async fn lookup(
                &self,
                tenant: &str,
                subject: &str,
            ) -> crate::error::Result<Option<DirectoryUser>> {
                if tenant == "default" && subject == "remote-user" {
                    Ok(Some(DirectoryUser {
                        username: "remote-user".to_string(),
                        roles: vec!["admin".to_string()],
                    }))
                } else {
                    Ok(None)
                }
            }
        }

        let engine = engine().with_directory(Arc::new(StaticDirectory));

        // Without an explicit tenant, the directory is not consulted.
        let decision = engine
            .evaluate(&request("remote-user", "file1", "read"))
            .await;
        assert_eq!(decision.reason, "user not found");

        let mut req = request("remote-user", "file1", "read");
        req.environment
            .insert("tenantID".to_string(), "default".to_string());
        let decision = engine.evaluate(&req).await;
        assert!(decision.allow);
        assert_eq!(decision.policy_id.as_deref(), Some("p-allow-files"));
    }

    #[tokio::test]
    async fn test_directory_errors_degrade_to_user_not_found() {
        struct FailingDirectory;

        #[async_trait]
        impl SubjectDirectory for FailingDirectory {
            async fn lookup(
                &self,
                _tenant: &str,
                _subject: &str,
            ) -> crate::error::Result<Option<DirectoryUser>> {
                Err(Error::transport("http://directory", "connection refused"))
            }
        }

        let engine = engine().with_directory(Arc::new(FailingDirectory));
        let mut req = request("remote-user", "file1", "read");
        req.environment
            .insert("tenantID".to_string(), "default".to_string());

        let decision = engine.evaluate(&req).await;
        assert!(!decision.allow);
        assert_eq!(decision.reason, "user not found");
    }

    #[tokio::test]
    async fn test_remediation_hook_fills_missing_advice() {
        let engine = engine().with_remediation(|ctx| {
            Some(format!(
                "ask an admin for {} on {}",
                ctx["action"], ctx["resource"]
            ))
        });

        // Deny with policy advice keeps the policy's advice.
        let decision = engine.evaluate(&request("user1", "vault", "read")).await;
        assert_eq!(
            decision.advice.as_deref(),
            Some("request vault access through your manager")
        );

        // Deny without policy advice gets the hook's.
        let decision = engine.evaluate(&request("user1", "file9", "read")).await;
        assert_eq!(
            decision.advice.as_deref(),
            Some("ask an admin for read on file9")
        );

        // Allow never carries remediation.
        let decision = engine.evaluate(&request("user1", "file1", "read")).await;
        assert!(decision.advice.is_none());
    }

    #[tokio::test]
    async fn test_determinism() {
        let engine = engine();
        let mut req = request("gateduser", "file1", "read");
        req.environment
            .insert("env".to_string(), "dev".to_string());

        let first = engine.evaluate(&req).await;
        let second = engine.evaluate(&req).await;
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}
