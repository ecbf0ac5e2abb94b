//! Contech Session - authentication state for the marketplace front end
//!
//! The [`SessionManager`] owns the session state machine
//! (`Unresolved → Anonymous ⇄ Authenticated`) and is the only error boundary
//! between the identity service and the rest of the application. Consumers
//! observe state through a [`SessionWatcher`] and decide navigation with the
//! [`router`] and [`guard`] helpers.

pub mod guard;
pub mod manager;
pub mod router;

pub use contech_core::SessionState;
pub use guard::{evaluate, RouteDecision, SessionWatcher};
pub use manager::SessionManager;
pub use router::{area_for, landing_route, landing_route_for, post_auth_route};

use contech_core::ContechError;
use contech_identity::IdentityError;

/// Error returned to sign-in/sign-up/profile callers
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("{0}")]
    Identity(#[from] IdentityError),

    #[error("Could not store credentials: {0}")]
    Storage(#[from] ContechError),

    #[error("Not signed in")]
    NotAuthenticated,
}

pub type SessionResult<T> = Result<T, SessionError>;

impl SessionError {
    /// Message to render inline next to the form
    pub fn message(&self) -> String {
        match self {
            SessionError::Identity(e) => e.message().to_string(),
            other => other.to_string(),
        }
    }
}
