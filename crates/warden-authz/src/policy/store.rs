//! Tenant-scoped policy store
//!
//! Parses the declarative snapshot file and serves lookups from an immutable
//! snapshot. A refresh parses the whole file first and then swaps the
//! snapshot; readers clone the `Arc` and never observe a partial view.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Deserialize;
use tracing::info;

use super::{Edge, Permission, Policy, RelationGraph, Role, UserEntry};
use crate::error::{Error, Result};

/// Raw file shape before indexing
#[derive(Debug, Default, Deserialize)]
struct SnapshotDoc {
    #[serde(default)]
    tenants: HashMap<String, TenantDoc>,
}

#[derive(Debug, Default, Deserialize)]
struct TenantDoc {
    #[serde(default)]
    roles: HashMap<String, Role>,
    #[serde(default)]
    policies: Vec<Policy>,
    #[serde(default)]
    users: Vec<UserEntry>,
    #[serde(default)]
    graph: Vec<Edge>,
}

/// Everything loaded for one tenant
#[derive(Debug, Clone, Default)]
pub struct TenantPolicies {
    /// Roles by name
    pub roles: HashMap<String, Role>,
    /// Policies by id
    pub policies: HashMap<String, Policy>,
    /// Users by username
    pub users: HashMap<String, UserEntry>,
    /// Delegation / group-resource relations
    pub graph: RelationGraph,
}

/// An immutable view of every tenant's rules
#[derive(Debug, Default)]
pub struct Snapshot {
    tenants: HashMap<String, TenantPolicies>,
}

impl Snapshot {
    /// Parse a snapshot from YAML, validating policy-id uniqueness per tenant
    pub fn parse(yaml: &str) -> Result<Self> {
        let doc: SnapshotDoc =
            serde_yaml::from_str(yaml).map_err(|e| Error::config(format!("policy file: {e}")))?;

        let mut tenants = HashMap::new();
        for (name, tenant) in doc.tenants {
            let mut policies = HashMap::new();
            for policy in tenant.policies {
                if policies.insert(policy.id.clone(), policy).is_some() {
                    return Err(Error::config(format!(
                        "tenant {name}: duplicate policy id"
                    )));
                }
            }
            let users = tenant
                .users
                .into_iter()
                .map(|u| (u.username.clone(), u))
                .collect();
            tenants.insert(
                name,
                TenantPolicies {
                    roles: tenant.roles,
                    policies,
                    users,
                    graph: RelationGraph::from_edges(&tenant.graph),
                },
            );
        }
        Ok(Self { tenants })
    }

    /// Look up a tenant partition
    pub fn tenant(&self, name: &str) -> Option<&TenantPolicies> {
        self.tenants.get(name)
    }

    /// Number of tenants in the snapshot
    pub fn tenant_count(&self) -> usize {
        self.tenants.len()
    }
}

/// Atomically refreshable policy store
pub struct PolicyStore {
    snapshot: RwLock<Arc<Snapshot>>,
}

impl PolicyStore {
    /// Load a store from a snapshot file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let snapshot = read_snapshot(path.as_ref())?;
        Ok(Self {
            snapshot: RwLock::new(Arc::new(snapshot)),
        })
    }

    /// Build a store from inline YAML
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(Self {
            snapshot: RwLock::new(Arc::new(Snapshot::parse(yaml)?)),
        })
    }

    /// Re-read the snapshot file and swap it in.
    ///
    /// Parsing happens before the swap: a broken file leaves the current
    /// snapshot in place.
    pub fn refresh(&self, path: impl AsRef<Path>) -> Result<()> {
        let snapshot = read_snapshot(path.as_ref())?;
        let tenants = snapshot.tenant_count();
        *self.snapshot.write() = Arc::new(snapshot);
        info!(path = %path.as_ref().display(), tenants, "policy snapshot reloaded");
        Ok(())
    }

    /// The current snapshot; holders keep a consistent view across refreshes
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.read().clone()
    }

    /// Permissions of a role, as an owned copy
    pub fn role_permissions(&self, tenant: &str, role: &str) -> Result<Vec<Permission>> {
        let snapshot = self.snapshot();
        let t = snapshot
            .tenant(tenant)
            .ok_or_else(|| Error::not_found(format!("tenant {tenant}")))?;
        let r = t
            .roles
            .get(role)
            .ok_or_else(|| Error::not_found(format!("role {tenant}/{role}")))?;
        Ok(r.permissions.clone())
    }

    /// A policy by id
    pub fn policy(&self, tenant: &str, id: &str) -> Result<Policy> {
        let snapshot = self.snapshot();
        snapshot
            .tenant(tenant)
            .and_then(|t| t.policies.get(id))
            .cloned()
            .ok_or_else(|| Error::not_found(format!("policy {tenant}/{id}")))
    }

    /// A role by name
    pub fn role(&self, tenant: &str, name: &str) -> Result<Role> {
        let snapshot = self.snapshot();
        snapshot
            .tenant(tenant)
            .and_then(|t| t.roles.get(name))
            .cloned()
            .ok_or_else(|| Error::not_found(format!("role {tenant}/{name}")))
    }

    /// A user entry by subject
    pub fn user(&self, tenant: &str, subject: &str) -> Result<UserEntry> {
        let snapshot = self.snapshot();
        snapshot
            .tenant(tenant)
            .and_then(|t| t.users.get(subject))
            .cloned()
            .ok_or_else(|| Error::not_found(format!("user {tenant}/{subject}")))
    }
}

fn read_snapshot(path: &Path) -> Result<Snapshot> {
    let yaml = std::fs::read_to_string(path)
        .map_err(|e| Error::config(format!("read {}: {e}", path.display())))?;
    Snapshot::parse(&yaml)
}
