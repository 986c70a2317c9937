//! Policy model, store, and evaluation
//!
//! The model is tenant-partitioned: each tenant carries named roles (bundles
//! of permissions plus an ordered policy list), ordered rule documents,
//! user→role assignments, and a relation graph used for delegation and group
//! resources.

mod engine;
mod graph;
mod store;

pub use engine::{DirectoryUser, PolicyEngine, RemediationFn, SubjectDirectory};
pub use graph::{Edge, RelationGraph};
pub use store::{PolicyStore, Snapshot, TenantPolicies};

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// An opaque permission string in `<resource-kind>:<action>` form,
/// e.g. `"user:create"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(String);

impl Permission {
    /// Create a permission from any string-like value
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// The permission as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Permission {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Whether a matched policy grants or refuses access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    /// Grant access
    Allow,
    /// Refuse access
    Deny,
}

/// Role scoping entry on a policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicySubject {
    /// Role the policy applies to
    pub role: String,
}

/// An ordered authorization rule
///
/// `resource` and `action` terms are `"*"` or literals; the engine iterates
/// their cross-product. `conditions` and `when` are conjunctive equality
/// predicates over the request environment; `when` conveys temporal gating
/// and runs after `conditions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    /// Unique id within the tenant
    pub id: String,
    /// Free-text description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Allow or deny on full match
    pub effect: Effect,
    /// Optional role scoping; empty applies to any role
    #[serde(default)]
    pub subjects: Vec<PolicySubject>,
    /// Resource patterns
    #[serde(default)]
    pub resource: Vec<String>,
    /// Action patterns
    #[serde(default)]
    pub action: Vec<String>,
    /// Environment predicates; any failure is a terminal deny
    #[serde(default)]
    pub conditions: BTreeMap<String, String>,
    /// Temporal/environmental predicates, second conjunctive group
    #[serde(default)]
    pub when: BTreeMap<String, String>,
    /// Returned to the caller on deny
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advice: Option<String>,
}

/// A named permission bundle within a tenant
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Role {
    /// Permissions granted by the role
    #[serde(default)]
    pub permissions: Vec<Permission>,
    /// Policy ids evaluated for the role, in declared order
    #[serde(default)]
    pub policies: Vec<String>,
}

/// A user→roles assignment within a tenant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserEntry {
    /// Subject / username
    pub username: String,
    /// Roles in evaluation order
    #[serde(default)]
    pub roles: Vec<String>,
}

/// An access request to evaluate
#[derive(Debug, Clone, Default)]
pub struct AccessRequest {
    /// Subject asking for access
    pub subject: String,
    /// Resource being accessed
    pub resource: String,
    /// Action on the resource
    pub action: String,
    /// Environment facts consulted by `conditions`/`when`; `tenantID`
    /// selects the tenant
    pub environment: BTreeMap<String, String>,
    /// Caller consent marker, carried for predicate use
    pub consent: Option<String>,
}

/// The totalized result of an evaluation
///
/// Every evaluation produces a Decision; when nothing matches the default is
/// `allow=false, reason="no matching policy"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Whether access is granted
    pub allow: bool,
    /// Id of the policy that decided, when one matched
    #[serde(rename = "policyID", skip_serializing_if = "Option::is_none")]
    pub policy_id: Option<String>,
    /// Human-readable outcome
    pub reason: String,
    /// Dimensions used in matching
    pub context: BTreeMap<String, String>,
    /// Ordered record of considered policies
    pub trace: Vec<String>,
    /// Subject whose policies satisfied the request, when delegated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delegator: Option<String>,
    /// Advice from the matched policy or the remediation hook
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advice: Option<String>,
}

impl Decision {
    /// The default deny when no policy matches
    pub(crate) fn unmatched(reason: impl Into<String>) -> Self {
        Self {
            allow: false,
            policy_id: None,
            reason: reason.into(),
            context: BTreeMap::new(),
            trace: Vec::new(),
            delegator: None,
            advice: None,
        }
    }
}
