//! Warden authorization service
//!
//! Wires the token verifier, policy store, engine, RBAC cache, and identity
//! directory into the HTTP gateway.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use warden_authz::{KeySetCache, PolicyEngine, PolicyStore, ProviderConfig, Rbac, TokenVerifier};
use warden_directory::{Directory, KeycloakDirectory, LocalDirectory};
use warden_server::config::IdentityBackend;
use warden_server::{metrics, routes, AppState, Config, DirectoryResolver, Error, Result};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = Config::from_env()?;
    let metrics_handle = metrics::install_recorder();

    let store = Arc::new(PolicyStore::load(&config.policy_file)?);
    info!(path = %config.policy_file.display(), "loaded policy snapshot");

    let mut providers = Vec::with_capacity(config.issuers.len());
    for issuer in &config.issuers {
        let jwks = match &issuer.jwks_url {
            Some(url) => KeySetCache::new(url.clone(), config.jwks_refresh_interval).await?,
            None => KeySetCache::discover(&issuer.issuer, config.jwks_refresh_interval).await?,
        };
        info!(issuer = %issuer.issuer, keys = jwks.len(), "configured issuer");
        providers.push(ProviderConfig {
            issuer: issuer.issuer.clone(),
            audience: issuer.audience.clone(),
            jwks,
        });
    }
    let verifier = Arc::new(TokenVerifier::new(providers, config.claim_mappings()));

    let directory: Arc<dyn Directory> = match config.identity_backend {
        IdentityBackend::Local => Arc::new(LocalDirectory::new(config.local_users_persist)),
        IdentityBackend::Keycloak => {
            let kc = config
                .keycloak
                .as_ref()
                .ok_or_else(|| Error::Config("keycloak settings missing".to_string()))?;
            Arc::new(KeycloakDirectory::new(
                &kc.base_url,
                &kc.client_id,
                &kc.client_secret,
            ))
        }
    };

    let engine = Arc::new(
        PolicyEngine::new(store.clone())
            .with_directory(Arc::new(DirectoryResolver::new(directory.clone()))),
    );
    let rbac = Arc::new(Rbac::new(store.clone(), Duration::from_secs(60)));

    let state = AppState {
        verifier,
        store,
        engine,
        rbac,
        directory,
        metrics: metrics_handle,
        policy_file: config.policy_file.clone(),
    };

    let app = routes::router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    info!(port = config.port, "starting warden server");

    axum::serve(listener, app.into_make_service())
        .await
        .map_err(|e| Error::Internal(format!("server error: {e}")))?;

    Ok(())
}
