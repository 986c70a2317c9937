//! Authorization core for Warden
//!
//! The decision pipeline: bearer tokens are verified against cached issuer
//! key sets and mapped to a [`Principal`]; the [`policy::PolicyEngine`]
//! evaluates access requests against the tenant-scoped [`policy::PolicyStore`]
//! to a totalized [`policy::Decision`]; [`rbac::Rbac`] answers plain
//! permission checks from a TTL'd cache.
//!
//! The HTTP surface and the identity directory backends live in their own
//! crates; the engine sees the directory only through
//! [`policy::SubjectDirectory`].

pub mod error;
pub mod jwt;
pub mod policy;
pub mod principal;
pub mod rbac;

pub use error::{Error, Result};
pub use jwt::{ClaimMappings, KeySetCache, ProviderConfig, TokenInfo, TokenVerifier};
pub use policy::{
    AccessRequest, Decision, DirectoryUser, Effect, Permission, Policy, PolicyEngine, PolicyStore,
    SubjectDirectory,
};
pub use principal::Principal;
pub use rbac::Rbac;
