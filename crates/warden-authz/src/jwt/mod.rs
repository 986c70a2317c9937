//! Bearer-token authentication
//!
//! [`jwks`] caches signing keys per issuer; [`verifier`] validates tokens
//! against the configured providers and maps claims to a [`crate::Principal`].

pub mod jwks;
pub mod verifier;

pub use jwks::{KeyEntry, KeySetCache};
pub use verifier::{ClaimMappings, ProviderConfig, TokenInfo, TokenVerifier};

#[cfg(test)]
pub(crate) mod testutil;
