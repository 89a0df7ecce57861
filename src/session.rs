//! Session lifecycle: login, logout, restore on startup, and invalidation on 401.
//!
//! `SessionContext` is the single source of truth for whether a user is
//! logged in. It is created once at startup and shared (via `Rc`) with the
//! API client, which calls [`SessionContext::on_unauthorized`] whenever the
//! backend rejects the bearer token.
//!
//! State machine: `Unauthenticated -> (login) -> Authenticated ->
//! (logout | 401) -> Unauthenticated`. There is no refresh.

use crate::api::ApiClient;
use crate::error::{ApiError, ApiResult};
use crate::model::{Session, User};
use crate::storage::{KeyValueStore, TOKEN_KEY, USER_KEY};
use std::cell::{Cell, RefCell};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Authenticated,
}

pub struct SessionContext {
    store: Box<dyn KeyValueStore>,
    current: RefCell<Option<Session>>,
    expired: Cell<bool>,
}

impl SessionContext {
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        Self {
            store,
            current: RefCell::new(None),
            expired: Cell::new(false),
        }
    }

    /// Rebuild the session from durable storage without asking the server.
    /// A stale token is only discovered by the next API call.
    pub fn restore(&self) -> Option<Session> {
        let token = self.store.get(TOKEN_KEY);
        let user = self.store.get(USER_KEY);
        let (token, user) = match (token, user) {
            (Some(t), Some(u)) if !t.is_empty() => (t, u),
            _ => {
                *self.current.borrow_mut() = None;
                return None;
            }
        };

        let user: User = match serde_json::from_str(&user) {
            Ok(user) => user,
            Err(e) => {
                tracing::warn!("stored user is unreadable, discarding session: {}", e);
                self.clear_storage();
                *self.current.borrow_mut() = None;
                return None;
            }
        };

        let session = Session { token, user };
        tracing::debug!(user = %session.user.id, "session restored");
        *self.current.borrow_mut() = Some(session.clone());
        Some(session)
    }

    /// Persist a fresh session and mark the context authenticated. If
    /// storage fails the context keeps whatever session it had before.
    pub fn establish(&self, session: Session) -> ApiResult<()> {
        let user = serde_json::to_string(&session.user)
            .map_err(|e| ApiError::Storage(e.to_string()))?;
        self.store
            .set_all(&[(TOKEN_KEY, session.token.as_str()), (USER_KEY, user.as_str())])
            .map_err(|e| {
                tracing::warn!("failed to persist session: {:#}", e);
                ApiError::Storage(format!("{:#}", e))
            })?;
        self.expired.set(false);
        *self.current.borrow_mut() = Some(session);
        Ok(())
    }

    /// Forget the session everywhere. Always succeeds.
    pub fn logout(&self) {
        self.clear_storage();
        *self.current.borrow_mut() = None;
    }

    /// Called by the API client when any authenticated request gets a 401
    pub fn on_unauthorized(&self) {
        if self.current.borrow().is_some() {
            tracing::warn!("backend rejected the session token, logging out");
        }
        self.logout();
        self.expired.set(true);
    }

    /// True once a 401 has ended the session, until the next login
    pub fn was_expired(&self) -> bool {
        self.expired.get()
    }

    pub fn state(&self) -> AuthState {
        if self.current.borrow().is_some() {
            AuthState::Authenticated
        } else {
            AuthState::Unauthenticated
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.state() == AuthState::Authenticated
    }

    pub fn current(&self) -> Option<Session> {
        self.current.borrow().clone()
    }

    pub fn user(&self) -> Option<User> {
        self.current.borrow().as_ref().map(|s| s.user.clone())
    }

    /// Bearer token for the next request, read from durable storage
    pub fn bearer(&self) -> Option<String> {
        if self.current.borrow().is_none() {
            return None;
        }
        self.store
            .get(TOKEN_KEY)
            .filter(|t| !t.is_empty())
            .or_else(|| self.current.borrow().as_ref().map(|s| s.token.clone()))
    }

    fn clear_storage(&self) {
        for key in [TOKEN_KEY, USER_KEY] {
            if let Err(e) = self.store.remove(key) {
                tracing::warn!("failed to clear {} from storage: {:#}", key, e);
            }
        }
    }
}

pub const LOGIN_FAILED: &str = "Login failed. Please check your credentials.";

/// Exchange credentials for a session. On failure the existing session,
/// if any, is left untouched.
pub fn login(api: &ApiClient, email: &str, password: &str) -> ApiResult<Session> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(ApiError::validation(
            "email",
            "Email and password are required",
        ));
    }

    let response = api.login(email.trim(), password)?;
    let session = Session {
        token: response.token,
        user: response.user,
    };
    api.session().establish(session.clone())?;
    tracing::info!(user = %session.user.id, role = session.user.role.as_str(), "logged in");
    Ok(session)
}
