use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use crate::api::ApiClient;
use crate::auth::token::TokenStore;
use crate::error::{ClientError, ClientResult};
use crate::models::User;
use crate::sequence::RequestSeq;

/// What views read to render auth-dependent UI.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub user: Option<User>,
    pub loading: bool,
}

#[derive(Debug, Default)]
struct SessionState {
    user: Option<User>,
    in_flight: usize,
}

/// Holds who is logged in. Every mutation goes through the store's own
/// methods; subscribers are told about each change.
#[derive(Debug)]
pub struct SessionStore {
    api: ApiClient,
    tokens: TokenStore,
    state: Mutex<SessionState>,
    // bumped by every call; a session check applies only if still the latest
    seq: RequestSeq,
    // bumped by login/logout only
    epoch: RequestSeq,
    changes: watch::Sender<SessionSnapshot>,
}

impl SessionStore {
    /// Restores a persisted token, if any. The user stays unknown until
    /// `check_session` runs.
    pub fn new(api: ApiClient, tokens: TokenStore) -> Self {
        match tokens.load() {
            Ok(Some(token)) => api.set_token(Some(token)),
            Ok(None) => {}
            Err(e) => tracing::warn!("Could not read saved session token: {e}"),
        }
        let (changes, _) = watch::channel(SessionSnapshot::default());
        Self {
            api,
            tokens,
            state: Mutex::new(SessionState::default()),
            seq: RequestSeq::new(),
            epoch: RequestSeq::new(),
            changes,
        }
    }

    pub fn user(&self) -> Option<User> {
        self.lock().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock().user.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.lock().in_flight > 0
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.lock();
        SessionSnapshot {
            user: state.user.clone(),
            loading: state.in_flight > 0,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.changes.subscribe()
    }

    /// Resolves the current user from the stored token. Any failure leaves
    /// the session anonymous; this never errors.
    pub async fn check_session(&self) -> Option<User> {
        let ticket = self.seq.next();
        let _loading = self.start_loading();

        let result = self.api.check_session().await;

        if !self.seq.is_latest(ticket) {
            tracing::debug!("Discarding stale session check #{ticket}");
            return self.user();
        }

        match result {
            Ok(user) => {
                tracing::debug!("Session valid for {}", user.email);
                self.set_user(Some(user));
            }
            Err(e) => {
                tracing::debug!("Session check failed: {e}");
                if e.is_auth() {
                    self.forget_token();
                }
                self.set_user(None);
            }
        }
        self.user()
    }

    pub async fn login(&self, email: &str, password: &str) -> ClientResult<User> {
        // a failed login leaves any pending session check alone
        let epoch = self.epoch.next();
        let _loading = self.start_loading();

        let response = match self.api.login(email, password).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Login error: {e}");
                return Err(e);
            }
        };

        if !self.epoch.is_latest(epoch) {
            tracing::debug!("Login for {email} superseded by a later login/logout");
            if let Some(token) = response.token {
                if let Err(e) = self.api.logout(Some(&token)).await {
                    tracing::warn!("Could not revoke superseded session: {e}");
                }
            }
            return Err(ClientError::Auth("Login superseded".to_string()));
        }

        // checks issued before this token existed are now stale
        self.seq.next();
        if let Some(token) = response.token {
            if let Err(e) = self.tokens.save(&token) {
                tracing::warn!("Could not persist session token: {e}");
            }
            self.api.set_token(Some(token));
        }
        tracing::info!("Logged in as {}", response.user.username);
        self.set_user(Some(response.user.clone()));
        Ok(response.user)
    }

    /// Local state is cleared before the remote call, so the outcome of
    /// that call never matters to the caller.
    pub async fn logout(&self) {
        self.epoch.next();
        self.seq.next();

        let token = self.api.token();
        self.forget_token();
        self.set_user(None);
        tracing::info!("Logged out");

        if let Err(e) = self.api.logout(token.as_deref()).await {
            tracing::warn!("Logout error: {e}");
        }
    }

    /// Creates an account. Does not log in.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> ClientResult<()> {
        if username.trim().is_empty() || email.trim().is_empty() || password.is_empty() {
            return Err(ClientError::Validation(
                "Missing username, email, or password".to_string(),
            ));
        }
        self.api.register(username.trim(), email.trim(), password).await?;
        tracing::info!("Registered {username}");
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_user(&self, user: Option<User>) {
        self.lock().user = user;
        self.publish();
    }

    fn forget_token(&self) {
        self.api.set_token(None);
        if let Err(e) = self.tokens.clear() {
            tracing::warn!("Could not remove saved session token: {e}");
        }
    }

    fn publish(&self) {
        self.changes.send_replace(self.snapshot());
    }

    fn start_loading(&self) -> LoadingGuard<'_> {
        self.lock().in_flight += 1;
        self.publish();
        LoadingGuard { store: self }
    }
}

/// Keeps `loading` set while a call is in flight, including when the
/// calling future is dropped half way.
struct LoadingGuard<'a> {
    store: &'a SessionStore,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        {
            let mut state = self.store.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
        }
        self.store.publish();
    }
}
