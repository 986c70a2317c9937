//! Route assembly

pub mod authorize;
pub mod policies;
pub mod users;

use axum::extract::State;
use axum::routing::{get, post};
use axum::Router;

use crate::middleware::{require_auth, track_latency};
use crate::state::AppState;

/// Build the gateway router.
///
/// `/authorize` and `/healthz` are public (the credential in the authorize
/// body identifies the subject); everything else requires a bearer token.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/users", get(users::list).post(users::create))
        .route(
            "/users/{username}",
            get(users::get_user).delete(users::delete_user),
        )
        .route("/users/{username}/roles", post(users::assign_roles))
        .route("/policies/reload", post(policies::reload))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    Router::new()
        .route("/authorize", post(authorize::authorize))
        .route("/healthz", get(|| async { "ok" }))
        .merge(protected)
        .layer(axum::middleware::from_fn(track_latency))
        .with_state(state)
}

/// Prometheus text exposition
async fn metrics_handler(State(state): State<AppState>) -> String {
    state.metrics.render()
}
