//! RBAC fast-path permission cache
//!
//! Memoizes the effective permission set per `(tenant, role-set)` with a TTL.
//! The set is the union of each role's permissions, so holding a broader role
//! can only add rights. Entries expire by TTL only; a store refresh does not
//! invalidate them.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::error::Error;
use crate::policy::{Permission, PolicyStore};
use crate::principal::Principal;

/// TTL applied when the caller supplies a zero duration
const DEFAULT_TTL: Duration = Duration::from_secs(60);

struct CacheEntry {
    perms: HashSet<Permission>,
    expires: Instant,
}

/// Role-based access check with a TTL'd permission-set cache
pub struct Rbac {
    store: Arc<PolicyStore>,
    ttl: Duration,
    cache: Mutex<HashMap<String, CacheEntry>>,
}

impl Rbac {
    /// Create an authorizer over the store. A zero `ttl` selects the 60 s
    /// default.
    pub fn new(store: Arc<PolicyStore>, ttl: Duration) -> Self {
        let ttl = if ttl.is_zero() { DEFAULT_TTL } else { ttl };
        Self {
            store,
            ttl,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Check whether the principal holds the permission.
    ///
    /// Default deny: unknown tenants and roles contribute nothing rather than
    /// failing the check.
    pub fn is_allowed(&self, principal: &Principal, permission: &Permission) -> bool {
        let tenant = principal.tenant_or_default();
        if principal.roles.is_empty() {
            return false;
        }

        let mut roles = principal.roles.clone();
        roles.sort();
        let key = cache_key(tenant, &roles);

        {
            let cache = self.cache.lock();
            if let Some(entry) = cache.get(&key) {
                if entry.expires > Instant::now() {
                    return entry.perms.contains(permission);
                }
            }
        }

        let mut perms = HashSet::new();
        for role in &roles {
            match self.store.role_permissions(tenant, role) {
                Ok(ps) => perms.extend(ps),
                Err(Error::NotFound { .. }) => continue,
                Err(_) => continue,
            }
        }

        let allowed = perms.contains(permission);
        self.cache.lock().insert(
            key,
            CacheEntry {
                perms,
                expires: Instant::now() + self.ttl,
            },
        );
        allowed
    }
}

/// `tenant + ":" + hex(sha256(sorted roles joined with ","))`, identical for
/// every permutation of the same role set.
fn cache_key(tenant: &str, sorted_roles: &[String]) -> String {
    let digest = Sha256::digest(sorted_roles.join(",").as_bytes());
    format!("{tenant}:{}", hex::encode(digest))
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLICY: &str = r#"
tenants:
  default:
    roles:
      admin:
        permissions: ["user:list", "user:create", "policy:read"]
      viewer:
        permissions: ["user:list"]
  acme:
    roles:
      admin:
        permissions: ["user:list"]
"#;

    fn principal(tenant: &str, roles: &[&str]) -> Principal {
        Principal {
            subject: "s".to_string(),
            username: "u".to_string(),
            tenant: tenant.to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            ..Default::default()
        }
    }

    fn rbac(ttl: Duration) -> Rbac {
        Rbac::new(
            Arc::new(PolicyStore::from_yaml(POLICY).expect("store")),
            ttl,
        )
    }

    #[test]
    fn test_admin_allow_viewer_deny() {
        let rbac = rbac(Duration::from_secs(60));

        assert!(rbac.is_allowed(&principal("", &["admin"]), &Permission::from("user:create")));
        assert!(!rbac.is_allowed(&principal("", &["viewer"]), &Permission::from("user:create")));
    }

    #[test]
    fn test_multi_role_union() {
        let rbac = rbac(Duration::from_secs(60));
        let p = principal("", &["viewer", "admin"]);

        assert!(rbac.is_allowed(&p, &Permission::from("policy:read")));
    }

    #[test]
    fn test_tenant_scoping() {
        let rbac = rbac(Duration::from_secs(60));

        assert!(rbac.is_allowed(&principal("", &["admin"]), &Permission::from("user:create")));
        assert!(!rbac.is_allowed(
            &principal("acme", &["admin"]),
            &Permission::from("user:create")
        ));
    }

    #[test]
    fn test_role_order_independence() {
        let rbac = rbac(Duration::from_secs(60));
        let forward = principal("", &["admin", "viewer"]);
        let backward = principal("", &["viewer", "admin"]);

        assert_eq!(
            cache_key("default", &{
                let mut r = forward.roles.clone();
                r.sort();
                r
            }),
            cache_key("default", &{
                let mut r = backward.roles.clone();
                r.sort();
                r
            })
        );
        assert_eq!(
            rbac.is_allowed(&forward, &Permission::from("policy:read")),
            rbac.is_allowed(&backward, &Permission::from("policy:read"))
        );
        // Both permutations share one cache entry.
        assert_eq!(rbac.cache.lock().len(), 1);
    }

    #[test]
    fn test_empty_roles_deny() {
        let rbac = rbac(Duration::from_secs(60));
        assert!(!rbac.is_allowed(&principal("", &[]), &Permission::from("user:list")));
    }

    #[test]
    fn test_unknown_role_and_tenant_not_fatal() {
        let rbac = rbac(Duration::from_secs(60));

        assert!(!rbac.is_allowed(&principal("", &["bogus"]), &Permission::from("user:list")));
        assert!(!rbac.is_allowed(
            &principal("nowhere", &["admin"]),
            &Permission::from("user:list")
        ));
        // A known role still contributes next to an unknown one.
        assert!(rbac.is_allowed(
            &principal("", &["bogus", "viewer"]),
            &Permission::from("user:list")
        ));
    }

    #[test]
    fn test_ttl_expiry_picks_up_store_changes() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        file.write_all(POLICY.as_bytes()).expect("write");
        let store = Arc::new(PolicyStore::load(file.path()).expect("store"));
        let rbac = Rbac::new(store.clone(), Duration::from_millis(20));
        let p = principal("", &["admin"]);
        let perm = Permission::from("user:create");

        assert!(rbac.is_allowed(&p, &perm));

        // Remove the permission and refresh; the cached entry still answers.
        let updated = POLICY.replace("\"user:create\", ", "");
        std::fs::write(file.path(), &updated).expect("rewrite");
        store.refresh(file.path()).expect("refresh");
        assert!(rbac.is_allowed(&p, &perm));

        // After expiry the recomputed set reflects the refresh.
        std::thread::sleep(Duration::from_millis(30));
        assert!(!rbac.is_allowed(&p, &perm));
    }

    #[test]
    fn test_zero_ttl_defaults() {
        let rbac = rbac(Duration::ZERO);
        assert_eq!(rbac.ttl, DEFAULT_TTL);
    }
}
