//! Token verification and claim mapping
//!
//! Validates bearer tokens against the configured providers and maps the
//! verified claims to a [`Principal`]. Provider selection uses the unverified
//! `iss`/`aud` claims; everything else is checked only after the signature
//! verifies under a cached key. The verification algorithm always comes from
//! the key entry, not from the token header.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{decode, decode_header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::debug;

use crate::error::{Error, Result};
use crate::jwt::KeySetCache;
use crate::principal::{normalize_role, Principal};

/// Tolerated clock skew on `exp` and `nbf`, in seconds
const LEEWAY_SECS: u64 = 60;

/// Audience claim in either scalar or list form
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Audience {
    /// Single audience
    Single(String),
    /// Multiple audiences
    Multiple(Vec<String>),
}

impl Audience {
    /// Check if the audience contains a specific value
    pub fn contains(&self, aud: &str) -> bool {
        match self {
            Audience::Single(s) => s == aud,
            Audience::Multiple(v) => v.iter().any(|a| a == aud),
        }
    }

    fn from_claims(value: Option<&Value>) -> Option<Self> {
        match value {
            Some(Value::String(s)) => Some(Audience::Single(s.clone())),
            Some(Value::Array(items)) => Some(Audience::Multiple(
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect(),
            )),
            _ => None,
        }
    }
}

/// One trusted `(issuer, audience, key set)` tuple
#[derive(Clone)]
pub struct ProviderConfig {
    /// Expected `iss` claim, matched exactly
    pub issuer: String,
    /// Expected audience; empty disables the audience check
    pub audience: String,
    /// Key-set cache for the issuer's JWKS endpoint
    pub jwks: Arc<KeySetCache>,
}

/// Claim paths used to build a [`Principal`]
///
/// Paths are dotted (`realm_access.roles`) and descend the claims tree one
/// object level at a time. Role claims accept a scalar string or a list of
/// strings.
#[derive(Debug, Clone)]
pub struct ClaimMappings {
    /// Claim holding the stable subject id
    pub subject: String,
    /// Claim holding the display username
    pub username: String,
    /// Claim holding the tenant id
    pub tenant: String,
    /// Claims holding role names; all paths are merged
    pub roles: Vec<String>,
    /// Prefix stripped from each role, case-insensitively
    pub strip_prefix: String,
}

impl Default for ClaimMappings {
    fn default() -> Self {
        Self {
            subject: "sub".to_string(),
            username: "preferred_username".to_string(),
            tenant: "tenantID".to_string(),
            roles: vec!["roles".to_string(), "realm_access.roles".to_string()],
            strip_prefix: String::new(),
        }
    }
}

/// A verified token with its claims tree
#[derive(Debug, Clone)]
pub struct TokenInfo {
    /// The raw compact token
    pub raw: String,
    /// Verified issuer
    pub issuer: String,
    /// Audience the token was accepted for
    pub audience: String,
    /// Full verified claims
    pub claims: Value,
}

/// Bearer-token verifier over one or more providers
pub struct TokenVerifier {
    providers: Vec<ProviderConfig>,
    mappings: ClaimMappings,
}

impl TokenVerifier {
    /// Create a verifier over the given providers
    pub fn new(providers: Vec<ProviderConfig>, mappings: ClaimMappings) -> Self {
        Self {
            providers,
            mappings,
        }
    }

    /// Claim mappings in effect
    pub fn mappings(&self) -> &ClaimMappings {
        &self.mappings
    }

    /// Verify a raw bearer token.
    ///
    /// Checks, in order: token structure and `kid` presence, key resolution
    /// (one forced refresh on miss), signature under the key entry's
    /// algorithm, issuer, audience, `exp`/`nbf` with ±60 s leeway, and
    /// presence of the tenant claim.
    pub async fn verify(&self, raw: &str) -> Result<TokenInfo> {
        let header =
            decode_header(raw).map_err(|e| Error::invalid_token(format!("malformed header: {e}")))?;
        let kid = header
            .kid
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::invalid_token("missing kid"))?;

        let unverified = decode_unverified_claims(raw)?;
        let issuer = unverified
            .get("iss")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::invalid_token("missing issuer claim"))?;
        let audience = Audience::from_claims(unverified.get("aud"));

        let provider = self
            .providers
            .iter()
            .find(|p| {
                p.issuer == issuer
                    && (p.audience.is_empty()
                        || audience.as_ref().is_some_and(|a| a.contains(&p.audience)))
            })
            .ok_or_else(|| Error::invalid_token("unknown issuer"))?;

        let entry = provider.jwks.key(&kid).await?;

        let mut validation = Validation::new(entry.algorithm);
        validation.leeway = LEEWAY_SECS;
        validation.validate_nbf = true;
        validation.set_issuer(&[provider.issuer.as_str()]);
        if provider.audience.is_empty() {
            validation.validate_aud = false;
        } else {
            validation.set_audience(&[provider.audience.as_str()]);
        }

        let data = decode::<Value>(raw, &entry.key, &validation)
            .map_err(|e| Error::invalid_token(e.to_string()))?;
        let claims = data.claims;

        if claim_value(&claims, &self.mappings.tenant).is_none() {
            return Err(Error::missing_tenant(&self.mappings.tenant));
        }

        debug!(issuer = %provider.issuer, kid = %kid, "verified token");

        let accepted_audience = match &audience {
            Some(Audience::Single(s)) => s.clone(),
            Some(Audience::Multiple(_)) => provider.audience.clone(),
            None => String::new(),
        };

        Ok(TokenInfo {
            raw: raw.to_string(),
            issuer: provider.issuer.clone(),
            audience: accepted_audience,
            claims,
        })
    }

    /// Map verified claims to a [`Principal`].
    ///
    /// Empty mapped `subject` or `username` fails with a claim-mapping error.
    /// Roles from all configured paths are trimmed, lowercased, stripped of
    /// the configured prefix, deduplicated, and sorted.
    pub fn principal_from_claims(&self, info: &TokenInfo) -> Result<Principal> {
        let subject = claim_string(&info.claims, &self.mappings.subject)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::claim_mapping(format!("missing {}", self.mappings.subject)))?;
        let username = claim_string(&info.claims, &self.mappings.username)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::claim_mapping(format!("missing {}", self.mappings.username)))?;
        let tenant = claim_string(&info.claims, &self.mappings.tenant).unwrap_or_default();

        let mut roles = BTreeSet::new();
        for path in &self.mappings.roles {
            let Some(value) = claim_value(&info.claims, path) else {
                continue;
            };
            for raw in string_list(value) {
                let role = normalize_role(&raw, &self.mappings.strip_prefix);
                if !role.is_empty() {
                    roles.insert(role);
                }
            }
        }

        Ok(Principal {
            subject,
            username,
            tenant,
            issuer: info.issuer.clone(),
            roles: roles.into_iter().collect(),
            attributes: Default::default(),
        })
    }
}

/// Decode the payload segment without verifying the signature.
///
/// Used only to select the provider; every claim is re-read from the
/// verified decode.
fn decode_unverified_claims(raw: &str) -> Result<Value> {
    let payload = raw
        .split('.')
        .nth(1)
        .ok_or_else(|| Error::invalid_token("malformed token"))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| Error::invalid_token("malformed payload encoding"))?;
    serde_json::from_slice(&bytes).map_err(|_| Error::invalid_token("malformed payload"))
}

/// Descend a dotted claim path one object level at a time.
fn claim_value<'a>(claims: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = claims;
    for part in path.split('.') {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

fn claim_string(claims: &Value, path: &str) -> Option<String> {
    claim_value(claims, path)
        .and_then(Value::as_str)
        .map(String::from)
}

/// Accept a scalar string or list-of-strings claim value.
fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect(),
        _ => Vec::new(),
    }
}
