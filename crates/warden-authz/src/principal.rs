//! Authenticated principal

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The authenticated caller after claim mapping.
///
/// Built once per request by the token verifier and immutable afterwards.
/// `roles` are already normalized: trimmed, lowercased, prefix-stripped,
/// deduplicated, and sorted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Principal {
    /// Stable subject identifier (non-empty)
    pub subject: String,
    /// Display username (non-empty)
    pub username: String,
    /// Tenant identifier; empty means the `"default"` tenant
    pub tenant: String,
    /// Issuer that signed the token
    pub issuer: String,
    /// Normalized role names
    pub roles: Vec<String>,
    /// Additional string attributes carried from the token
    pub attributes: BTreeMap<String, String>,
}

impl Principal {
    /// Tenant to use for store lookups, falling back to `"default"`.
    pub fn tenant_or_default(&self) -> &str {
        if self.tenant.is_empty() {
            "default"
        } else {
            &self.tenant
        }
    }
}

/// Normalize a single role name: trim, lowercase, strip `prefix`
/// (case-insensitive) when present.
///
/// Stripping is idempotent: once the prefix is gone the input no longer
/// starts with it.
pub fn normalize_role(raw: &str, prefix: &str) -> String {
    let role = raw.trim().to_lowercase();
    if prefix.is_empty() {
        return role;
    }
    let prefix = prefix.to_lowercase();
    match role.strip_prefix(&prefix) {
        Some(rest) => rest.to_string(),
        None => role,
    }
}
