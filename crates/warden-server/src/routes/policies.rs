//! Policy snapshot reload

use axum::extract::State;
use axum::{Extension, Json};
use tracing::info;
use warden_authz::{Permission, Principal};

use crate::error::{Error, Result};
use crate::state::AppState;

/// `POST /policies/reload`: re-read the policy file and swap the snapshot.
///
/// In-flight evaluations keep the snapshot they started with; a parse error
/// leaves the current snapshot serving.
pub async fn reload(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<serde_json::Value>> {
    if !state
        .rbac
        .is_allowed(&principal, &Permission::from("policy:reload"))
    {
        return Err(Error::Forbidden(
            "missing permission policy:reload".to_string(),
        ));
    }

    state.store.refresh(&state.policy_file)?;
    info!(subject = %principal.subject, "policy snapshot reloaded");
    Ok(Json(serde_json::json!({ "status": "reloaded" })))
}
