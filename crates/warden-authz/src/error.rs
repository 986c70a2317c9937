//! Error types for the authorization core

use thiserror::Error;

/// Authorization core error types
#[derive(Debug, Error)]
pub enum Error {
    /// Token failed signature, issuer, audience, expiry, or structural checks
    #[error("invalid token: {message}")]
    InvalidToken {
        /// What check failed
        message: String,
    },

    /// No signing key for the token's `kid`, even after a forced refresh
    #[error("signing key not found: {kid}")]
    KeyNotFound {
        /// Key ID from the token header
        kid: String,
    },

    /// Token verified but a required claim is missing or empty
    #[error("claim mapping failed: {message}")]
    ClaimMapping {
        /// Which claim could not be mapped
        message: String,
    },

    /// Token verified but the tenant claim is absent
    #[error("missing tenant claim: {claim}")]
    MissingTenant {
        /// Configured tenant claim name
        claim: String,
    },

    /// Tenant, role, policy, or user does not exist in the store
    #[error("not found: {what}")]
    NotFound {
        /// What was looked up
        what: String,
    },

    /// JWKS endpoint or discovery document could not be fetched
    #[error("transport error for {url}: {message}")]
    Transport {
        /// Endpoint that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Configuration error
    #[error("configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },
}

impl Error {
    /// Create an invalid-token error
    pub fn invalid_token(msg: impl Into<String>) -> Self {
        Self::InvalidToken {
            message: msg.into(),
        }
    }

    /// Create a key-not-found error
    pub fn key_not_found(kid: impl Into<String>) -> Self {
        Self::KeyNotFound { kid: kid.into() }
    }

    /// Create a claim-mapping error
    pub fn claim_mapping(msg: impl Into<String>) -> Self {
        Self::ClaimMapping {
            message: msg.into(),
        }
    }

    /// Create a missing-tenant error
    pub fn missing_tenant(claim: impl Into<String>) -> Self {
        Self::MissingTenant {
            claim: claim.into(),
        }
    }

    /// Create a not-found error
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Create a transport error
    pub fn transport(url: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Transport {
            url: url.into(),
            message: msg.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Check if this error means the caller is unauthenticated (401)
    /// as opposed to lacking a claim the deployment requires (403)
    /// or an upstream failure (5xx).
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Error::InvalidToken { .. } | Error::KeyNotFound { .. } | Error::ClaimMapping { .. }
        )
    }
}

/// Result type for authorization core operations
pub type Result<T> = std::result::Result<T, Error>;
