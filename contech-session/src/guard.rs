//! Session consumers - gating rendering and navigation on session state
//!
//! Consumers only read state; token handling stays inside the session manager.

use contech_core::SessionState;
use tokio::sync::watch;

use crate::router::{self, area_for, landing_route, normalize_path};

/// What a consumer should do for a location given the current session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    /// Resolution still pending: show a loading indicator, do not redirect
    Loading,
    Render,
    Redirect(&'static str),
}

/// Decide how `location` should be handled in `state`.
///
/// - `Unresolved` always suspends.
/// - Authenticated users are sent to their landing route from the login,
///   register and generic dashboard pages, and from any role area that is not
///   theirs.
/// - Anonymous visitors of a role area are sent to the login page.
pub fn evaluate(state: &SessionState, location: &str) -> RouteDecision {
    let user = match state {
        SessionState::Unresolved => return RouteDecision::Loading,
        SessionState::Anonymous => {
            return match area_for(location) {
                Some(_) => RouteDecision::Redirect(router::LOGIN),
                None => RouteDecision::Render,
            };
        }
        SessionState::Authenticated(user) => user,
    };

    let landing = landing_route(Some(user.role()));
    let path = normalize_path(location);
    if path == router::LOGIN || path == router::REGISTER || path == router::GENERIC_DASHBOARD {
        return RouteDecision::Redirect(landing);
    }

    match area_for(path) {
        Some(area) if area != user.role() => RouteDecision::Redirect(landing),
        _ => RouteDecision::Render,
    }
}

/// Read-only handle on the session state
#[derive(Clone)]
pub struct SessionWatcher {
    receiver: watch::Receiver<SessionState>,
}

impl SessionWatcher {
    pub fn new(receiver: watch::Receiver<SessionState>) -> Self {
        Self { receiver }
    }

    pub fn current(&self) -> SessionState {
        self.receiver.borrow().clone()
    }

    /// Wait until the initial resolution has finished
    pub async fn settled(&mut self) -> SessionState {
        let settled = self
            .receiver
            .wait_for(SessionState::is_resolved)
            .await
            .map(|state| state.clone());
        settled.unwrap_or_else(|_| self.current())
    }

    /// Wait for the next committed transition. `None` once the manager is gone.
    pub async fn changed(&mut self) -> Option<SessionState> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }

    pub fn decide(&self, location: &str) -> RouteDecision {
        evaluate(&self.receiver.borrow(), location)
    }
}
