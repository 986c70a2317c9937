//! Environment-driven configuration

use std::path::PathBuf;
use std::time::Duration;

use warden_authz::ClaimMappings;

use crate::error::{Error, Result};

/// Default JWKS refresh interval (5 minutes)
const DEFAULT_JWKS_REFRESH: Duration = Duration::from_secs(300);

/// One trusted issuer from `OIDC_ISSUERS` / `OIDC_AUDIENCES`
#[derive(Debug, Clone)]
pub struct IssuerSettings {
    /// Issuer URL, matched exactly against `iss`
    pub issuer: String,
    /// Expected audience; empty disables the audience check
    pub audience: String,
    /// Explicit JWKS URL; discovery is used when absent
    pub jwks_url: Option<String>,
}

/// Which identity directory backend to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityBackend {
    /// In-memory, optionally file-persisted
    Local,
    /// Keycloak Admin REST API
    Keycloak,
}

/// Keycloak connection settings
#[derive(Debug, Clone)]
pub struct KeycloakSettings {
    /// Base URL of the Keycloak server
    pub base_url: String,
    /// Admin client id
    pub client_id: String,
    /// Admin client secret
    pub client_secret: String,
}

/// Gateway configuration, read once at startup
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen port (`PORT`, required)
    pub port: u16,
    /// Trusted issuers, positionally paired with audiences
    pub issuers: Vec<IssuerSettings>,
    /// Claim holding the tenant id (`OIDC_TENANT_CLAIM`)
    pub tenant_claim: String,
    /// Claim holding the subject (`OIDC_SUBJECT_CLAIM`)
    pub subject_claim: String,
    /// Claim holding the username (`OIDC_USERNAME_CLAIM`)
    pub username_claim: String,
    /// Dotted role claim paths (`OIDC_ROLE_CLAIMS`)
    pub role_claims: Vec<String>,
    /// Prefix stripped from roles (`OIDC_ROLE_STRIP_PREFIX`)
    pub role_strip_prefix: String,
    /// JWKS refresh interval (`OIDC_JWKS_REFRESH_INTERVAL`)
    pub jwks_refresh_interval: Duration,
    /// Policy snapshot path (`POLICY_FILE`, required)
    pub policy_file: PathBuf,
    /// Identity backend selection (`IDENTITY_BACKEND`)
    pub identity_backend: IdentityBackend,
    /// Persist local users to `configs/<tenantID>/users.yaml`
    pub local_users_persist: bool,
    /// Keycloak settings, required when the backend is `keycloak`
    pub keycloak: Option<KeycloakSettings>,
}

impl Config {
    /// Read configuration from the environment
    pub fn from_env() -> Result<Self> {
        let port = required("PORT")?
            .parse::<u16>()
            .map_err(|_| Error::Config("PORT must be a port number".to_string()))?;

        let issuers = parse_issuers(
            &optional("OIDC_ISSUERS"),
            &optional("OIDC_AUDIENCES"),
            &optional("OIDC_JWKS_URLS"),
        );

        let jwks_refresh_interval = match std::env::var("OIDC_JWKS_REFRESH_INTERVAL") {
            Ok(raw) => parse_duration(&raw).ok_or_else(|| {
                Error::Config(format!("invalid OIDC_JWKS_REFRESH_INTERVAL: {raw}"))
            })?,
            Err(_) => DEFAULT_JWKS_REFRESH,
        };

        let identity_backend = match optional("IDENTITY_BACKEND").as_str() {
            "" | "local" => IdentityBackend::Local,
            "keycloak" => IdentityBackend::Keycloak,
            other => {
                return Err(Error::Config(format!("unknown identity backend: {other}")));
            }
        };

        let keycloak = if identity_backend == IdentityBackend::Keycloak {
            Some(KeycloakSettings {
                base_url: required("KEYCLOAK_BASE_URL")?,
                client_id: required("KEYCLOAK_CLIENT_ID")?,
                client_secret: required("KEYCLOAK_CLIENT_SECRET")?,
            })
        } else {
            None
        };

        Ok(Self {
            port,
            issuers,
            tenant_claim: default_var("OIDC_TENANT_CLAIM", "tenantID"),
            subject_claim: default_var("OIDC_SUBJECT_CLAIM", "sub"),
            username_claim: default_var("OIDC_USERNAME_CLAIM", "preferred_username"),
            role_claims: split_csv(&default_var(
                "OIDC_ROLE_CLAIMS",
                "roles,realm_access.roles",
            )),
            role_strip_prefix: optional("OIDC_ROLE_STRIP_PREFIX"),
            jwks_refresh_interval,
            policy_file: PathBuf::from(required("POLICY_FILE")?),
            identity_backend,
            local_users_persist: optional("LOCAL_USERS_PERSIST") == "true",
            keycloak,
        })
    }

    /// Claim mappings for the token verifier
    pub fn claim_mappings(&self) -> ClaimMappings {
        ClaimMappings {
            subject: self.subject_claim.clone(),
            username: self.username_claim.clone(),
            tenant: self.tenant_claim.clone(),
            roles: self.role_claims.clone(),
            strip_prefix: self.role_strip_prefix.clone(),
        }
    }
}

fn required(key: &str) -> Result<String> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::Config(format!("{key} environment variable is not set")))
}

fn optional(key: &str) -> String {
    std::env::var(key).unwrap_or_default()
}

fn default_var(key: &str, default: &str) -> String {
    let value = optional(key);
    if value.is_empty() {
        default.to_string()
    } else {
        value
    }
}

fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Pair issuers with audiences (and optional JWKS URLs) positionally.
fn parse_issuers(issuers: &str, audiences: &str, jwks_urls: &str) -> Vec<IssuerSettings> {
    let audiences: Vec<&str> = audiences.split(',').map(str::trim).collect();
    let jwks: Vec<&str> = jwks_urls.split(',').map(str::trim).collect();

    issuers
        .split(',')
        .map(str::trim)
        .enumerate()
        .filter(|(_, iss)| !iss.is_empty())
        .map(|(i, iss)| IssuerSettings {
            issuer: iss.to_string(),
            audience: audiences.get(i).copied().unwrap_or("").to_string(),
            jwks_url: jwks
                .get(i)
                .copied()
                .filter(|u| !u.is_empty())
                .map(String::from),
        })
        .collect()
}

/// Parse a Go-style duration: a number with an optional `ms`, `s`, `m`, or
/// `h` suffix. A bare number is seconds.
fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let (value, unit) = match raw.find(|c: char| c.is_ascii_alphabetic()) {
        Some(idx) => raw.split_at(idx),
        None => (raw, "s"),
    };
    let value: u64 = value.parse().ok()?;
    match unit {
        "ms" => Some(Duration::from_millis(value)),
        "s" => Some(Duration::from_secs(value)),
        "m" => Some(Duration::from_secs(value * 60)),
        "h" => Some(Duration::from_secs(value * 3600)),
        _ => None,
    }
}
