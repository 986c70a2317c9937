//! Local file-backed directory
//!
//! Users live in memory per tenant, optionally persisted to
//! `configs/<tenantID>/users.yaml`. Each tenant's file is loaded lazily on
//! first access.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::warn;

use crate::{Directory, Error, Result, User};

/// On-disk wrapper shape for a tenant's users file
#[derive(Debug, Default, Serialize, Deserialize)]
struct UsersFile {
    #[serde(default)]
    users: Vec<User>,
}

#[derive(Default)]
struct State {
    users: HashMap<String, Vec<User>>,
    loaded: HashMap<String, bool>,
}

/// In-memory directory with optional YAML persistence
pub struct LocalDirectory {
    state: RwLock<State>,
    base_dir: PathBuf,
    persist: bool,
}

impl LocalDirectory {
    /// Create a directory. With `persist`, users are stored under
    /// `configs/<tenantID>/users.yaml` relative to the working directory.
    pub fn new(persist: bool) -> Self {
        Self::with_base_dir("configs", persist)
    }

    /// Create a directory persisting under the given base directory
    pub fn with_base_dir(base_dir: impl Into<PathBuf>, persist: bool) -> Self {
        Self {
            state: RwLock::new(State::default()),
            base_dir: base_dir.into(),
            persist,
        }
    }

    fn file_path(&self, tenant_id: &str) -> PathBuf {
        self.base_dir.join(tenant_id).join("users.yaml")
    }

    fn load(&self, state: &mut State, tenant_id: &str) {
        if !self.persist || state.loaded.get(tenant_id).copied().unwrap_or(false) {
            return;
        }
        state.loaded.insert(tenant_id.to_string(), true);

        let path = self.file_path(tenant_id);
        let Ok(data) = std::fs::read_to_string(&path) else {
            return;
        };
        match serde_yaml::from_str::<UsersFile>(&data) {
            Ok(mut file) => {
                for user in &mut file.users {
                    user.tenant_id = tenant_id.to_string();
                }
                state.users.insert(tenant_id.to_string(), file.users);
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping unreadable users file");
            }
        }
    }

    fn save(&self, state: &State, tenant_id: &str) {
        if !self.persist {
            return;
        }
        let path = self.file_path(tenant_id);
        if let Some(dir) = path.parent() {
            if let Err(err) = std::fs::create_dir_all(dir) {
                warn!(path = %path.display(), error = %err, "failed to create users dir");
                return;
            }
        }
        let file = UsersFile {
            users: state.users.get(tenant_id).cloned().unwrap_or_default(),
        };
        match serde_yaml::to_string(&file) {
            Ok(data) => {
                if let Err(err) = std::fs::write(&path, data) {
                    warn!(path = %path.display(), error = %err, "failed to persist users");
                }
            }
            Err(err) => warn!(error = %err, "failed to serialize users"),
        }
    }

    /// Persistence base directory
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

#[async_trait]
impl Directory for LocalDirectory {
    async fn get(&self, tenant_id: &str, username: &str) -> Result<User> {
        let mut state = self.state.write().await;
        self.load(&mut state, tenant_id);
        state
            .users
            .get(tenant_id)
            .and_then(|users| users.iter().find(|u| u.username == username))
            .cloned()
            .ok_or_else(|| Error::NotFound(username.to_string()))
    }

    async fn list(&self, tenant_id: &str) -> Result<Vec<User>> {
        let mut state = self.state.write().await;
        self.load(&mut state, tenant_id);
        Ok(state.users.get(tenant_id).cloned().unwrap_or_default())
    }

    async fn create(&self, tenant_id: &str, username: &str, roles: Vec<String>) -> Result<User> {
        let mut state = self.state.write().await;
        self.load(&mut state, tenant_id);

        let users = state.users.entry(tenant_id.to_string()).or_default();
        if users.iter().any(|u| u.username == username) {
            return Err(Error::AlreadyExists(username.to_string()));
        }
        let user = User {
            username: username.to_string(),
            roles,
            tenant_id: tenant_id.to_string(),
        };
        users.push(user.clone());
        self.save(&state, tenant_id);
        Ok(user)
    }

    async fn assign_roles(
        &self,
        tenant_id: &str,
        username: &str,
        roles: Vec<String>,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        self.load(&mut state, tenant_id);

        let users = state
            .users
            .get_mut(tenant_id)
            .ok_or_else(|| Error::NotFound(username.to_string()))?;
        let user = users
            .iter_mut()
            .find(|u| u.username == username)
            .ok_or_else(|| Error::NotFound(username.to_string()))?;
        user.roles = roles;
        self.save(&state, tenant_id);
        Ok(())
    }

    async fn delete(&self, tenant_id: &str, username: &str) -> Result<()> {
        let mut state = self.state.write().await;
        self.load(&mut state, tenant_id);

        let users = state
            .users
            .get_mut(tenant_id)
            .ok_or_else(|| Error::NotFound(username.to_string()))?;
        let before = users.len();
        users.retain(|u| u.username != username);
        if users.len() == before {
            return Err(Error::NotFound(username.to_string()));
        }
        self.save(&state, tenant_id);
        Ok(())
    }
}
