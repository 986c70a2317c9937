//! Keycloak Admin REST directory
//!
//! Tenants map to Keycloak realms. An admin access token is fetched lazily
//! with the client-credentials grant and reused until a request fails.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::debug;

use crate::{Directory, Error, Result, User};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Directory backed by Keycloak's Admin REST API
pub struct KeycloakDirectory {
    base_url: String,
    client_id: String,
    client_secret: String,
    client: reqwest::Client,
    token: Mutex<Option<String>>,
}

impl KeycloakDirectory {
    /// Create a directory against a Keycloak server
    pub fn new(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            client: reqwest::Client::new(),
            token: Mutex::new(None),
        }
    }

    async fn access_token(&self, realm: &str) -> Result<String> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref() {
            return Ok(token.clone());
        }

        let url = format!(
            "{}/realms/{}/protocol/openid-connect/token",
            self.base_url, realm
        );
        debug!(url = %url, "fetching keycloak admin token");

        let response = self
            .client
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::Backend(format!("token request: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::Backend(format!(
                "token request: HTTP {}",
                response.status()
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::Backend(format!("token response: {e}")))?;
        if token.access_token.is_empty() {
            return Err(Error::Backend("no access token".to_string()));
        }

        *guard = Some(token.access_token.clone());
        Ok(token.access_token)
    }

    async fn request(
        &self,
        realm: &str,
        method: reqwest::Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<reqwest::Response> {
        let token = self.access_token(realm).await?;
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.client.request(method, &url).bearer_auth(token);
        if let Some(body) = body {
            req = req.json(&body);
        }
        req.send()
            .await
            .map_err(|e| Error::Backend(format!("{url}: {e}")))
    }

    fn check(
        response: &reqwest::Response,
        what: &str,
        username: &str,
    ) -> Result<()> {
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::NotFound(username.to_string()));
        }
        if status == reqwest::StatusCode::CONFLICT {
            return Err(Error::AlreadyExists(username.to_string()));
        }
        if !status.is_success() {
            return Err(Error::Backend(format!("{what}: HTTP {status}")));
        }
        Ok(())
    }
}

#[async_trait]
impl Directory for KeycloakDirectory {
    async fn get(&self, tenant_id: &str, username: &str) -> Result<User> {
        let response = self
            .request(
                tenant_id,
                reqwest::Method::GET,
                &format!("/admin/realms/{tenant_id}/users/{username}"),
                None,
            )
            .await?;
        Self::check(&response, "get user", username)?;

        let mut user: User = response
            .json()
            .await
            .map_err(|e| Error::Backend(format!("get user: {e}")))?;
        user.tenant_id = tenant_id.to_string();
        Ok(user)
    }

    async fn list(&self, tenant_id: &str) -> Result<Vec<User>> {
        let response = self
            .request(
                tenant_id,
                reqwest::Method::GET,
                &format!("/admin/realms/{tenant_id}/users"),
                None,
            )
            .await?;
        Self::check(&response, "list users", "")?;

        let mut users: Vec<User> = response
            .json()
            .await
            .map_err(|e| Error::Backend(format!("list users: {e}")))?;
        for user in &mut users {
            user.tenant_id = tenant_id.to_string();
        }
        Ok(users)
    }

    async fn create(&self, tenant_id: &str, username: &str, roles: Vec<String>) -> Result<User> {
        let response = self
            .request(
                tenant_id,
                reqwest::Method::POST,
                &format!("/admin/realms/{tenant_id}/users"),
                Some(json!({ "username": username, "roles": roles })),
            )
            .await?;
        Self::check(&response, "create user", username)?;

        let mut user: User = response
            .json()
            .await
            .map_err(|e| Error::Backend(format!("create user: {e}")))?;
        user.tenant_id = tenant_id.to_string();
        Ok(user)
    }

    async fn assign_roles(
        &self,
        tenant_id: &str,
        username: &str,
        roles: Vec<String>,
    ) -> Result<()> {
        let response = self
            .request(
                tenant_id,
                reqwest::Method::POST,
                &format!("/admin/realms/{tenant_id}/users/{username}/roles"),
                Some(json!(roles)),
            )
            .await?;
        Self::check(&response, "assign roles", username)
    }

    async fn delete(&self, tenant_id: &str, username: &str) -> Result<()> {
        let response = self
            .request(
                tenant_id,
                reqwest::Method::DELETE,
                &format!("/admin/realms/{tenant_id}/users/{username}"),
                None,
            )
            .await?;
        Self::check(&response, "delete user", username)
    }
}
