//! Session/auth state derived from the locally persisted token and role.
//!
//! The session never validates the token; the API does that by rejecting
//! requests. It only gates front-end affordances (login vs. profile, admin
//! entries) and supplies the bearer token to the gateway client per request.

use std::sync::{Arc, PoisonError, RwLock};

use secrecy::{ExposeSecret, SecretString};
use tracing::{info, warn};

use tshop_core::Role;

use crate::storage::{KeyValueStore, keys};

/// Snapshot of what the front end may show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionState {
    pub is_logged_in: bool,
    pub is_admin: bool,
}

#[derive(Default)]
struct Credentials {
    token: Option<SecretString>,
    role: Option<Role>,
}

impl Credentials {
    fn state(&self) -> SessionState {
        SessionState {
            is_logged_in: self.token.is_some(),
            is_admin: self.role.as_ref().is_some_and(Role::is_admin),
        }
    }
}

/// Owner of the persisted `token` and `role` keys.
pub struct SessionStore {
    storage: Arc<dyn KeyValueStore>,
    credentials: RwLock<Credentials>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("state", &self.state())
            .field("token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Read token and role once from `storage`.
    ///
    /// Unreadable or blank values are treated as absent.
    #[must_use]
    pub fn initialize_from_storage(storage: Arc<dyn KeyValueStore>) -> Self {
        let token = read_non_blank(storage.as_ref(), keys::TOKEN).map(SecretString::from);
        let role = read_non_blank(storage.as_ref(), keys::ROLE).map(Role::new);
        let credentials = Credentials { token, role };

        let state = credentials.state();
        info!(
            logged_in = state.is_logged_in,
            admin = state.is_admin,
            "Session initialized from storage"
        );

        Self {
            storage,
            credentials: RwLock::new(credentials),
        }
    }

    /// Current session snapshot.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.credentials
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .state()
    }

    /// The bearer token to attach to the next request, if logged in.
    #[must_use]
    pub fn token(&self) -> Option<SecretString> {
        self.credentials
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .token
            .clone()
    }

    /// The role the API issued at login.
    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.credentials
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .role
            .clone()
    }

    /// Persist freshly issued credentials and update the state.
    ///
    /// Storage failures are logged; the in-memory session is still updated so
    /// the current process stays logged in.
    pub fn on_login_success(&self, token: SecretString, role: Option<Role>) -> SessionState {
        if let Err(e) = self.storage.set(keys::TOKEN, token.expose_secret()) {
            warn!(error = %e, "Failed to persist session token");
        }
        let role_result = match &role {
            Some(role) => self.storage.set(keys::ROLE, role.as_str()),
            None => self.storage.remove(keys::ROLE),
        };
        if let Err(e) = role_result {
            warn!(error = %e, "Failed to persist session role");
        }

        let mut credentials = self
            .credentials
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *credentials = Credentials {
            token: Some(token),
            role,
        };
        let state = credentials.state();
        info!(admin = state.is_admin, "Logged in");
        state
    }

    /// Erase persisted credentials and reset the state.
    pub fn on_logout(&self) {
        self.clear();
        info!("Logged out");
    }

    /// Clear the session because the API rejected `rejected`.
    ///
    /// Nothing happens unless `rejected` is still the current token, so a
    /// late 401 from before a fresh login leaves the new session alone.
    /// Returns `true` if the session was cleared.
    pub fn expire(&self, rejected: &SecretString) -> bool {
        let mut credentials = self
            .credentials
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let is_current = credentials
            .token
            .as_ref()
            .is_some_and(|token| token.expose_secret() == rejected.expose_secret());
        if !is_current {
            return false;
        }

        self.erase_persisted();
        *credentials = Credentials::default();
        warn!("Session expired: API rejected the bearer token");
        true
    }

    fn erase_persisted(&self) {
        for key in [keys::TOKEN, keys::ROLE] {
            if let Err(e) = self.storage.remove(key) {
                warn!(key, error = %e, "Failed to erase session value");
            }
        }
    }

    fn clear(&self) {
        self.erase_persisted();
        *self
            .credentials
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Credentials::default();
    }
}

fn read_non_blank(storage: &dyn KeyValueStore, key: &str) -> Option<String> {
    match storage.get(key) {
        Ok(value) => value.filter(|v| !v.trim().is_empty()),
        Err(e) => {
            warn!(key, error = %e, "Failed to read session value");
            None
        }
    }
}
