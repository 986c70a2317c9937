//! Identity directory backends for Warden
//!
//! A [`Directory`] resolves and manages users inside a tenant. Two backends
//! ship: [`LocalDirectory`] (in-memory with optional YAML persistence) and
//! [`KeycloakDirectory`] (Keycloak Admin REST API).

pub mod keycloak;
pub mod local;

pub use keycloak::KeycloakDirectory;
pub use local::LocalDirectory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A directory user scoped to a tenant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Username inside the tenant
    pub username: String,
    /// Assigned roles
    #[serde(default)]
    pub roles: Vec<String>,
    /// Owning tenant; not persisted, derived from the lookup scope
    #[serde(rename = "tenantID", default, skip_serializing)]
    pub tenant_id: String,
}

/// Directory error types
#[derive(Debug, Error)]
pub enum Error {
    /// User does not exist in the tenant
    #[error("user not found: {0}")]
    NotFound(String),

    /// User already exists in the tenant
    #[error("user exists: {0}")]
    AlreadyExists(String),

    /// Backend request failed
    #[error("directory backend error: {0}")]
    Backend(String),
}

/// Result type for directory operations
pub type Result<T> = std::result::Result<T, Error>;

/// User and role-assignment operations scoped by tenant
#[async_trait]
pub trait Directory: Send + Sync {
    /// Fetch a user by username
    async fn get(&self, tenant_id: &str, username: &str) -> Result<User>;

    /// List all users in a tenant
    async fn list(&self, tenant_id: &str) -> Result<Vec<User>>;

    /// Create a user with the given roles
    async fn create(&self, tenant_id: &str, username: &str, roles: Vec<String>) -> Result<User>;

    /// Replace the roles of an existing user
    async fn assign_roles(&self, tenant_id: &str, username: &str, roles: Vec<String>)
        -> Result<()>;

    /// Remove a user from the tenant
    async fn delete(&self, tenant_id: &str, username: &str) -> Result<()>;

    /// Whether the user holds any of the given roles
    async fn has_role(&self, tenant_id: &str, username: &str, roles: &[String]) -> bool {
        match self.get(tenant_id, username).await {
            Ok(user) => roles.iter().any(|r| user.roles.contains(r)),
            Err(_) => false,
        }
    }
}
