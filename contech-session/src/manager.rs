//! Session Manager - owner of the authentication state machine
//!
//! Orchestrates the token store and the identity client. State changes are
//! published through a `watch` channel; a committed change is visible to every
//! receiver before the operation that made it returns, and intermediate steps
//! (token saved, user fetch in flight) are never published.
//!
//! Each state-changing operation takes a new generation. A completion whose
//! generation is no longer current is discarded without touching state or
//! token, so the most recently started operation wins.

use contech_core::{log_operation_start, ProfileUpdate, SessionState, SignUpMetadata, UserRecord};
use contech_identity::{
    Credentials, IdentityClient, IdentityError, IdentityResult, RegisterRequest, TokenStore,
};
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::guard::SessionWatcher;
use crate::{SessionError, SessionResult};

pub struct SessionManager {
    token_store: Arc<dyn TokenStore>,
    identity: Arc<dyn IdentityClient>,
    state: watch::Sender<SessionState>,
    generation: AtomicU64,
}

impl SessionManager {
    /// Create a manager in the `Unresolved` state. Call [`resolve`](Self::resolve)
    /// once at startup.
    pub fn new(token_store: Arc<dyn TokenStore>, identity: Arc<dyn IdentityClient>) -> Self {
        let (state, _) = watch::channel(SessionState::Unresolved);
        Self {
            token_store,
            identity,
            state,
            generation: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn current_user(&self) -> Option<UserRecord> {
        self.state.borrow().user().cloned()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn watcher(&self) -> SessionWatcher {
        SessionWatcher::new(self.subscribe())
    }

    /// Turn the stored token, if any, into a session.
    ///
    /// No token means `Anonymous` without a network call. A token the identity
    /// service does not accept is cleared. Failures are never reported to the
    /// caller; the returned state is the one in effect afterwards.
    pub async fn resolve(&self) -> SessionState {
        let generation = self.begin();

        let Some(token) = self.load_token() else {
            debug!("No stored token, session is anonymous");
            self.commit(generation, SessionState::Anonymous, false);
            return self.state();
        };

        let fetched =
            guarded(self.identity.fetch_current_user(&token), "Failed to load user").await;

        match fetched {
            Ok(user) => {
                info!(user_id = user.id, role = %user.role(), "Session resolved");
                self.commit(generation, SessionState::Authenticated(user), false);
            }
            Err(e) => {
                if e.is_transient() {
                    warn!(error = %e, "Identity service unavailable, dropping stored token");
                } else {
                    info!(error = %e, "Stored token rejected, dropping it");
                }
                self.commit(generation, SessionState::Anonymous, true);
            }
        }

        self.state()
    }

    /// Sign in with email and password.
    ///
    /// On failure the state and the stored token are left as they were. On
    /// success the new token is stored and resolved; the resolved user is
    /// returned, `None` if resolution did not produce one.
    pub async fn sign_in(&self, email: &str, password: &str) -> SessionResult<Option<UserRecord>> {
        log_operation_start!("sign_in");

        let credentials = Credentials::new(email, password);
        let login = guarded(self.identity.login(&credentials), "Login failed")
            .await
            .map_err(|e| {
                debug!(email = %email, error = %e, "Login rejected");
                SessionError::from(e)
            })?;

        self.establish(&login.token).await
    }

    /// Create an account and sign in with it. Role and names come from
    /// `metadata`.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: SignUpMetadata,
    ) -> SessionResult<Option<UserRecord>> {
        log_operation_start!("sign_up", role = ?metadata.role);

        let requested_role = metadata.role;
        let request = RegisterRequest::new(Credentials::new(email, password), metadata);
        let registered = guarded(self.identity.register(&request), "Registration failed")
            .await
            .map_err(|e| {
                debug!(email = %email, error = %e, "Registration rejected");
                SessionError::from(e)
            })?;

        if requested_role.is_some() && registered.role != requested_role {
            warn!(
                requested = ?requested_role,
                granted = ?registered.role,
                "Identity service assigned a different role"
            );
        }
        debug!(user_id = registered.user_id, "Account registered");

        self.establish(&registered.token).await
    }

    /// Drop the session locally. No network call, never fails.
    pub fn sign_out(&self) {
        let generation = self.begin();
        self.clear_token_quietly();
        self.commit(generation, SessionState::Anonymous, false);
        info!("Signed out");
    }

    /// Update the signed-in user's profile and publish the updated record.
    /// Fails with `NotAuthenticated` if the session changed while the update was
    /// in flight; the server may still have applied it.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> SessionResult<UserRecord> {
        let current = self.current_user().ok_or(SessionError::NotAuthenticated)?;
        if update.is_empty() {
            return Ok(current);
        }
        let token = self.load_token().ok_or(SessionError::NotAuthenticated)?;

        let generation = self.begin();
        let user = guarded(
            self.identity.update_current_user(&token, update),
            "Failed to update profile",
        )
        .await?;

        if !self.commit(generation, SessionState::Authenticated(user.clone()), false) {
            return Err(SessionError::NotAuthenticated);
        }
        Ok(user)
    }

    /// Store a freshly issued token and resolve it
    async fn establish(&self, token: &str) -> SessionResult<Option<UserRecord>> {
        // Supersede any in-flight resolve before the token changes underneath it
        self.begin();
        self.token_store.save(token).map_err(|e| {
            e.log();
            SessionError::Storage(e)
        })?;

        let state = self.resolve().await;
        Ok(state.user().cloned())
    }

    fn begin(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Publish `next` if `generation` is still current. The token is cleared
    /// under the same check when `clear_token` is set.
    fn commit(&self, generation: u64, next: SessionState, clear_token: bool) -> bool {
        let mut applied = false;

        self.state.send_if_modified(|current| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            applied = true;

            if clear_token {
                self.clear_token_quietly();
            }
            if *current == next {
                return false;
            }

            debug!(from = %current, to = %next, "Session state changed");
            *current = next;
            true
        });

        if !applied {
            debug!(generation = generation, "Discarding stale session update");
        }
        applied
    }

    fn load_token(&self) -> Option<String> {
        match self.token_store.load() {
            Ok(token) => token,
            Err(e) => {
                e.log();
                warn!("Token store unreadable, treating session as anonymous");
                None
            }
        }
    }

    fn clear_token_quietly(&self) {
        if let Err(e) = self.token_store.clear() {
            e.log();
        }
    }
}

/// Run an identity call, turning a panic inside it into an error
async fn guarded<T, F>(future: F, fallback: &str) -> IdentityResult<T>
where
    F: Future<Output = IdentityResult<T>>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => result,
        Err(_) => {
            error!(operation = fallback, "Identity client panicked");
            Err(IdentityError::internal(fallback))
        }
    }
}
