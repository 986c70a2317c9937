//! Shared JWT test fixtures: RSA keys, JWKS stub server, token minting.

use std::sync::{Arc, Mutex};

use axum::routing::get;
use axum::{Json, Router};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde_json::{json, Value};

/// A generated RSA signing key with its public JWK form.
pub struct TestKey {
    pub kid: String,
    pub private_pem: String,
    pub jwk: Value,
}

impl TestKey {
    pub fn generate(kid: &str) -> Self {
        let key = RsaPrivateKey::new(&mut rand::thread_rng(), 2048).expect("generate rsa key");
        let public = RsaPublicKey::from(&key);
        let private_pem = key
            .to_pkcs1_pem(Default::default())
            .expect("encode pem")
            .to_string();

        let n = URL_SAFE_NO_PAD.encode(public.n().to_bytes_be());
        let e = URL_SAFE_NO_PAD.encode(public.e().to_bytes_be());
        let jwk = json!({
            "kty": "RSA",
            "kid": kid,
            "alg": "RS256",
            "use": "sig",
            "n": n,
            "e": e,
        });

        Self {
            kid: kid.to_string(),
            private_pem,
            jwk,
        }
    }

    /// Mint an RS256 token with this key's `kid` in the header.
    pub fn sign(&self, claims: &Value) -> String {
        let mut header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256);
        header.kid = Some(self.kid.clone());
        jsonwebtoken::encode(
            &header,
            claims,
            &jsonwebtoken::EncodingKey::from_rsa_pem(self.private_pem.as_bytes())
                .expect("encoding key"),
        )
        .expect("sign token")
    }
}

/// Build a JWKS document from the given keys.
pub fn jwks_value(keys: &[&TestKey]) -> Value {
    json!({ "keys": keys.iter().map(|k| k.jwk.clone()).collect::<Vec<_>>() })
}

/// Serve a mutable JWKS document on an ephemeral port.
///
/// Returns the JWKS URL and a handle through which tests rotate the key set.
/// The stub also answers OIDC discovery so `KeySetCache::discover` works
/// against it.
pub async fn spawn_jwks_server(initial: Value) -> (String, Arc<Mutex<Value>>) {
    let state = Arc::new(Mutex::new(initial));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    let base = format!("http://{addr}");

    let jwks_url = format!("{base}/jwks");
    let discovery = json!({ "issuer": base, "jwks_uri": jwks_url });

    let app = Router::new()
        .route(
            "/jwks",
            get({
                let state = state.clone();
                move || {
                    let state = state.clone();
                    async move {
                        let doc = state.lock().unwrap().clone();
                        Json(doc)
                    }
                }
            }),
        )
        .route(
            "/.well-known/openid-configuration",
            get(move || {
                let discovery = discovery.clone();
                async move { Json(discovery) }
            }),
        );

    tokio::spawn(async move {
        let _ = axum::serve(listener, app.into_make_service()).await;
    });

    (jwks_url, state)
}
