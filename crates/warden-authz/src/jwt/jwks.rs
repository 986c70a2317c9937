//! JWKS key-set caching
//!
//! Fetches and caches signing keys from issuer endpoints with periodic
//! refresh and on-demand refresh when a `kid` lookup misses.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use jsonwebtoken::jwk::{Jwk, JwkSet, KeyAlgorithm};
use jsonwebtoken::{Algorithm, DecodingKey};
use parking_lot::RwLock;
use rand::Rng;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Timeout for JWKS and discovery fetches
const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// A cached signing key resolved from the key set
#[derive(Clone)]
pub struct KeyEntry {
    /// Key ID
    pub kid: String,
    /// Decoded public key
    pub key: DecodingKey,
    /// Algorithm the key signs with; signature verification uses this,
    /// never the algorithm declared in the token header
    pub algorithm: Algorithm,
}

impl std::fmt::Debug for KeyEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyEntry")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

/// OIDC discovery document (only the field we need)
#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    jwks_uri: String,
}

/// Key-set cache for one issuer endpoint
///
/// Construction performs one synchronous refresh and starts a background
/// task that refreshes every `interval + rand(0, interval/10)`; the jitter
/// spreads fetches across replicas. Background failures keep the previous
/// snapshot. A `kid` miss triggers one forced refresh before giving up, which
/// bounds per-request latency while still picking up key rotation.
pub struct KeySetCache {
    jwks_url: String,
    client: reqwest::Client,
    keys: RwLock<Arc<HashMap<String, KeyEntry>>>,
    interval: Duration,
}

impl KeySetCache {
    /// Create a cache for a JWKS endpoint and start the refresh task.
    pub async fn new(jwks_url: impl Into<String>, interval: Duration) -> Result<Arc<Self>> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("failed to create HTTP client: {e}")))?;

        let cache = Arc::new(Self {
            jwks_url: jwks_url.into(),
            client,
            keys: RwLock::new(Arc::new(HashMap::new())),
            interval,
        });

        cache.refresh().await?;
        cache.spawn_refresh();
        Ok(cache)
    }

    /// Create a cache by resolving the JWKS endpoint through OIDC discovery.
    pub async fn discover(issuer: &str, interval: Duration) -> Result<Arc<Self>> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("failed to create HTTP client: {e}")))?;

        let discovery_url = format!(
            "{}/.well-known/openid-configuration",
            issuer.trim_end_matches('/')
        );
        let doc: DiscoveryDocument = client
            .get(&discovery_url)
            .send()
            .await
            .map_err(|e| Error::transport(&discovery_url, format!("request failed: {e}")))?
            .json()
            .await
            .map_err(|e| Error::transport(&discovery_url, format!("invalid JSON: {e}")))?;

        Self::new(doc.jwks_uri, interval).await
    }

    /// Resolve a key by `kid`.
    ///
    /// A miss triggers one forced refresh; failures of that refresh surface
    /// to the caller as transport errors.
    pub async fn key(&self, kid: &str) -> Result<KeyEntry> {
        if let Some(entry) = self.snapshot().get(kid) {
            return Ok(entry.clone());
        }

        debug!(kid = %kid, jwks_url = %self.jwks_url, "key miss, forcing refresh");
        self.refresh().await?;

        self.snapshot()
            .get(kid)
            .cloned()
            .ok_or_else(|| Error::key_not_found(kid))
    }

    /// Fetch the key set and atomically swap the snapshot.
    ///
    /// Readers see either the old or the new map in full, never a mix.
    pub async fn refresh(&self) -> Result<()> {
        let response = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| Error::transport(&self.jwks_url, format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::transport(
                &self.jwks_url,
                format!("HTTP {}", response.status()),
            ));
        }

        let jwks: JwkSet = response
            .json()
            .await
            .map_err(|e| Error::transport(&self.jwks_url, format!("invalid JSON: {e}")))?;

        let mut keys = HashMap::new();
        for jwk in &jwks.keys {
            let Some(kid) = jwk.common.key_id.clone().filter(|k| !k.is_empty()) else {
                continue;
            };
            match key_entry(kid.clone(), jwk) {
                Some(entry) => {
                    keys.insert(kid, entry);
                }
                None => {
                    warn!(kid = %kid, "skipping unusable JWK");
                }
            }
        }

        info!(
            jwks_url = %self.jwks_url,
            key_count = keys.len(),
            "refreshed key set"
        );

        *self.keys.write() = Arc::new(keys);
        Ok(())
    }

    /// Number of keys in the current snapshot.
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    /// Check whether the current snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    fn snapshot(&self) -> Arc<HashMap<String, KeyEntry>> {
        self.keys.read().clone()
    }

    fn spawn_refresh(self: &Arc<Self>) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let interval = self.interval;
        tokio::spawn(async move {
            loop {
                let sleep = {
                    let max_jitter_ms = (interval.as_millis() / 10) as u64;
                    let jitter = rand::thread_rng().gen_range(0..=max_jitter_ms);
                    interval + Duration::from_millis(jitter)
                };
                tokio::time::sleep(sleep).await;

                match weak.upgrade() {
                    Some(cache) => {
                        if let Err(err) = cache.refresh().await {
                            // Keep the previous snapshot on failure.
                            warn!(error = %err, "background key refresh failed");
                        }
                    }
                    None => return,
                }
            }
        });
    }
}

/// Build a cache entry from a JWK, resolving the verification algorithm from
/// the key itself. Keys without a usable algorithm default to RS256; keys
/// jsonwebtoken cannot decode (or encryption-only algorithms) are skipped.
fn key_entry(kid: String, jwk: &Jwk) -> Option<KeyEntry> {
    let algorithm = match jwk.common.key_algorithm {
        Some(alg) => signature_algorithm(alg)?,
        None => Algorithm::RS256,
    };
    let key = DecodingKey::from_jwk(jwk).ok()?;
    Some(KeyEntry {
        kid,
        key,
        algorithm,
    })
}

fn signature_algorithm(alg: KeyAlgorithm) -> Option<Algorithm> {
    match alg {
        KeyAlgorithm::RS256 => Some(Algorithm::RS256),
        KeyAlgorithm::RS384 => Some(Algorithm::RS384),
        KeyAlgorithm::RS512 => Some(Algorithm::RS512),
        KeyAlgorithm::ES256 => Some(Algorithm::ES256),
        KeyAlgorithm::ES384 => Some(Algorithm::ES384),
        KeyAlgorithm::PS256 => Some(Algorithm::PS256),
        KeyAlgorithm::PS384 => Some(Algorithm::PS384),
        KeyAlgorithm::PS512 => Some(Algorithm::PS512),
        KeyAlgorithm::EdDSA => Some(Algorithm::EdDSA),
        _ => None,
    }
}
