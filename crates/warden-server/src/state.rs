//! Shared application state
//!
//! One explicit state object passed to every handler; nothing lives in
//! process-wide globals except the metrics recorder the `metrics` facade
//! requires.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use metrics_exporter_prometheus::PrometheusHandle;
use warden_authz::policy::{DirectoryUser, SubjectDirectory};
use warden_authz::{PolicyEngine, PolicyStore, Rbac, TokenVerifier};
use warden_directory::Directory;

/// Shared state for handlers
#[derive(Clone)]
pub struct AppState {
    /// Bearer-token verifier
    pub verifier: Arc<TokenVerifier>,
    /// Policy snapshot store
    pub store: Arc<PolicyStore>,
    /// Decision engine
    pub engine: Arc<PolicyEngine>,
    /// RBAC permission cache guarding the management routes
    pub rbac: Arc<Rbac>,
    /// Identity directory backend
    pub directory: Arc<dyn Directory>,
    /// Prometheus render handle
    pub metrics: PrometheusHandle,
    /// Policy file path, re-read on reload
    pub policy_file: PathBuf,
}

/// Adapter exposing a [`Directory`] to the engine as the narrow
/// subject-resolution seam it consumes.
pub struct DirectoryResolver {
    directory: Arc<dyn Directory>,
}

impl DirectoryResolver {
    /// Wrap a directory backend
    pub fn new(directory: Arc<dyn Directory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl SubjectDirectory for DirectoryResolver {
    async fn lookup(
        &self,
        tenant: &str,
        subject: &str,
    ) -> warden_authz::Result<Option<DirectoryUser>> {
        match self.directory.get(tenant, subject).await {
            Ok(user) => Ok(Some(DirectoryUser {
                username: user.username,
                roles: user.roles,
            })),
            Err(warden_directory::Error::NotFound(_)) => Ok(None),
            Err(err) => Err(warden_authz::Error::transport(
                format!("directory/{tenant}"),
                err.to_string(),
            )),
        }
    }
}
