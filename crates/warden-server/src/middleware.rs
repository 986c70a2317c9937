//! Request middleware: bearer authentication and latency tracking

use std::time::Instant;

use axum::extract::{MatchedPath, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

use crate::error::{Error, Result};
use crate::state::AppState;

/// Extract the bearer token from the Authorization header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Strict bearer authentication.
///
/// Verifies the token, maps claims to a principal, and stores it on the
/// request. Verification failures are 401; a token without the required
/// tenant claim is 403. There is no unverified fallback.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let token = bearer_token(request.headers())
        .ok_or_else(|| Error::Unauthorized("missing bearer token".to_string()))?;

    let info = state.verifier.verify(token).await?;
    let principal = state.verifier.principal_from_claims(&info)?;

    debug!(
        subject = %principal.subject,
        tenant = %principal.tenant_or_default(),
        "authenticated request"
    );

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

/// Record per-route request latency into the Prometheus histogram.
pub async fn track_latency(request: Request, next: Next) -> Response {
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let start = Instant::now();
    let response = next.run(request).await;

    metrics::histogram!("http_request_duration_seconds", "path" => path)
        .record(start.elapsed().as_secs_f64());
    response
}
