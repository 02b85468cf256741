//! Session store: authentication lifecycle and the current user's profile
//!
//! The persisted credential is the source of truth; `user` is re-derived from it
//! through `/users/me` on startup.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::lifecycle::{Lifecycle, StateCell};
use super::types::{AuthResponse, LoginCredentials, ProfileUpdate, User, UserRegistration};
use crate::auth::CredentialStore;
use crate::transport::{self, Transport, TransportError};

pub const LOGIN_FALLBACK_MESSAGE: &str = "登录失败，请检查您的凭据";
pub const REGISTRATION_FALLBACK_MESSAGE: &str = "注册失败，请稍后再试";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AuthPhase {
    #[default]
    Anonymous,
    Authenticating,
    Authenticated,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionState {
    pub user: Option<User>,
    pub phase: AuthPhase,
    pub login_error: Option<String>,
    pub registration_error: Option<String>,
    pub is_loading: bool,
}

impl SessionState {
    pub fn is_logged_in(&self) -> bool {
        self.user.is_some()
    }
}

impl Lifecycle for SessionState {
    fn set_loading(&mut self, loading: bool) {
        self.is_loading = loading;
    }
}

/// Login and registration share one flow; they differ in endpoint and error slot
#[derive(Clone, Copy, Debug)]
enum AuthFlow {
    Login,
    Register,
}

impl AuthFlow {
    fn name(self) -> &'static str {
        match self {
            AuthFlow::Login => "login",
            AuthFlow::Register => "register",
        }
    }

    fn path(self) -> &'static str {
        match self {
            AuthFlow::Login => "/login",
            AuthFlow::Register => "/register",
        }
    }

    fn fallback_message(self) -> &'static str {
        match self {
            AuthFlow::Login => LOGIN_FALLBACK_MESSAGE,
            AuthFlow::Register => REGISTRATION_FALLBACK_MESSAGE,
        }
    }

    fn error_slot(self, state: &mut SessionState) -> &mut Option<String> {
        match self {
            AuthFlow::Login => &mut state.login_error,
            AuthFlow::Register => &mut state.registration_error,
        }
    }
}

/// Handle to the session store; clones share the same state
#[derive(Clone)]
pub struct SessionStore {
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialStore>,
    state: StateCell<SessionState>,
}

impl SessionStore {
    pub fn new(transport: Arc<dyn Transport>, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            transport,
            credentials,
            state: StateCell::new(SessionState::default()),
        }
    }

    /// Start verifying a persisted credential in the background.
    ///
    /// Returns `None` when there is nothing to verify. Must be called from within a
    /// tokio runtime.
    pub fn bootstrap(&self) -> Option<JoinHandle<()>> {
        self.persisted_token()?;
        tracing::info!("Persisted credential found, verifying session");
        let store = self.clone();
        Some(tokio::spawn(async move {
            store.check_auth().await;
        }))
    }

    pub fn state(&self) -> SessionState {
        self.state.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn user(&self) -> Option<User> {
        self.state.read(|s| s.user.clone())
    }

    pub fn is_logged_in(&self) -> bool {
        self.state.read(SessionState::is_logged_in)
    }

    pub fn phase(&self) -> AuthPhase {
        self.state.read(|s| s.phase)
    }

    pub fn is_loading(&self) -> bool {
        self.state.read(|s| s.is_loading)
    }

    pub fn login_error(&self) -> Option<String> {
        self.state.read(|s| s.login_error.clone())
    }

    pub fn registration_error(&self) -> Option<String> {
        self.state.read(|s| s.registration_error.clone())
    }

    fn persisted_token(&self) -> Option<String> {
        match self.credentials.load() {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(error = %e, "Could not read persisted credential");
                None
            }
        }
    }

    fn erase_credential(&self) {
        if let Err(e) = self.credentials.erase() {
            tracing::warn!(error = %e, "Could not erase persisted credential");
        }
    }

    /// Re-derive the user from the persisted credential.
    ///
    /// Without a credential this does nothing. A rejected credential is erased and
    /// the session falls back to anonymous.
    pub async fn check_auth(&self) {
        // Nothing persisted: stay anonymous without touching the state
        if self.persisted_token().is_none() {
            return;
        }

        let busy = self.state.begin("check_auth", |s| s.phase = AuthPhase::Authenticating);

        match transport::get_json::<User>(self.transport.as_ref(), "/users/me").await {
            Ok(user) => {
                tracing::info!(user_id = %user.id, "Session restored");
                busy.commit(|s| {
                    s.user = Some(user);
                    s.phase = AuthPhase::Authenticated;
                });
            }
            Err(e) => {
                // Any failure invalidates the credential, not only 401
                self.erase_credential();
                busy.fail(&e, |s| {
                    s.user = None;
                    s.phase = AuthPhase::Anonymous;
                });
            }
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> bool {
        let credentials = LoginCredentials {
            email: email.to_string(),
            password: password.to_string(),
        };
        self.authenticate(AuthFlow::Login, &credentials).await
    }

    /// Create an account; success logs the new user in.
    pub async fn register(&self, registration: &UserRegistration) -> bool {
        self.authenticate(AuthFlow::Register, registration).await
    }

    async fn authenticate<B: serde::Serialize + Sync>(&self, flow: AuthFlow, body: &B) -> bool {
        let prior = self.phase();
        let busy = self.state.begin(flow.name(), |s| {
            *flow.error_slot(s) = None;
            s.phase = AuthPhase::Authenticating;
        });

        // The user is only set once the credential is persisted
        let outcome = match transport::post_json::<_, AuthResponse>(self.transport.as_ref(), flow.path(), body).await {
            Ok(response) => match self.credentials.store(&response.token) {
                Ok(()) => Ok(response.user),
                Err(e) => {
                    tracing::warn!(error = %e, "Could not persist credential");
                    Err(flow.fallback_message().to_string())
                }
            },
            Err(e) => {
                tracing::debug!(flow = flow.name(), error = %e, "Authentication rejected");
                Err(auth_error_message(flow, &e))
            }
        };

        match outcome {
            Ok(user) => {
                tracing::info!(user_id = %user.id, flow = flow.name(), "Authenticated");
                busy.commit(|s| {
                    s.user = Some(user);
                    s.phase = AuthPhase::Authenticated;
                });
                true
            }
            Err(message) => {
                busy.fail(&message, |s| {
                    *flow.error_slot(s) = Some(message.clone());
                    s.phase = prior;
                });
                false
            }
        }
    }

    /// Drop the session. Never fails.
    pub fn logout(&self) {
        self.erase_credential();
        self.state.update(|s| {
            s.user = None;
            s.phase = AuthPhase::Anonymous;
        });
        tracing::info!("Logged out");
    }

    /// Send a partial profile and replace the local user with the server's copy.
    ///
    /// Failures leave `user` unchanged and record no message.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> bool {
        let busy = self.state.begin("update_profile", |_| {});

        match transport::put_json::<_, User>(self.transport.as_ref(), "/users/update", update).await {
            Ok(user) => {
                busy.commit(|s| s.user = Some(user));
                true
            }
            Err(e) => {
                busy.fail(&e, |_| {});
                false
            }
        }
    }
}

fn auth_error_message(flow: AuthFlow, error: &TransportError) -> String {
    error
        .server_message()
        .unwrap_or(flow.fallback_message())
        .to_string()
}
