//! Tenant-scoped user management
//!
//! Every route derives its tenant from the authenticated principal and is
//! gated by an RBAC permission check.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;
use warden_authz::{Permission, Principal};
use warden_directory::User;

use crate::error::{Error, Result};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    /// Username to create
    pub username: String,
    /// Initial roles
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssignRolesRequest {
    /// Replacement role set
    pub roles: Vec<String>,
}

fn require_permission(state: &AppState, principal: &Principal, permission: &str) -> Result<()> {
    if state
        .rbac
        .is_allowed(principal, &Permission::from(permission))
    {
        Ok(())
    } else {
        Err(Error::Forbidden(format!("missing permission {permission}")))
    }
}

/// `GET /users`
pub async fn list(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<User>>> {
    require_permission(&state, &principal, "user:list")?;
    let users = state.directory.list(principal.tenant_or_default()).await?;
    Ok(Json(users))
}

/// `GET /users/{username}`
pub async fn get_user(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(username): Path<String>,
) -> Result<Json<User>> {
    require_permission(&state, &principal, "user:list")?;
    let user = state
        .directory
        .get(principal.tenant_or_default(), &username)
        .await?;
    Ok(Json(user))
}

/// `POST /users`
pub async fn create(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>)> {
    require_permission(&state, &principal, "user:create")?;
    if body.username.is_empty() {
        return Err(Error::BadRequest("username is required".to_string()));
    }
    let user = state
        .directory
        .create(principal.tenant_or_default(), &body.username, body.roles)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// `POST /users/{username}/roles`
pub async fn assign_roles(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(username): Path<String>,
    Json(body): Json<AssignRolesRequest>,
) -> Result<StatusCode> {
    require_permission(&state, &principal, "user:update")?;
    state
        .directory
        .assign_roles(principal.tenant_or_default(), &username, body.roles)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /users/{username}`
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(username): Path<String>,
) -> Result<StatusCode> {
    require_permission(&state, &principal, "user:delete")?;
    state
        .directory
        .delete(principal.tenant_or_default(), &username)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
