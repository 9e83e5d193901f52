//! Navigation guard

use tracing::debug;

use crate::session::SessionState;

/// Message shown when navigation is blocked for lack of a session.
pub const SIGN_IN_REQUIRED_MESSAGE: &str = "Please sign-in to access this resource";

/// Blocking, user-facing notification (an alert dialog in a browser shell).
pub trait Notifier {
    fn alert(&self, message: &str);
}

impl<F: Fn(&str)> Notifier for F {
    fn alert(&self, message: &str) {
        self(message)
    }
}

/// Everything the guard is allowed to look at when deciding.
#[derive(Clone, Copy)]
pub struct NavigationContext<'a> {
    pub session: &'a SessionState,
}

impl<'a> NavigationContext<'a> {
    pub fn new(session: &'a SessionState) -> Self {
        Self { session }
    }
}

/// Single global gate: signed in means every route is open.
pub struct SessionGuard<N> {
    notifier: N,
}

impl<N: Notifier> SessionGuard<N> {
    pub fn new(notifier: N) -> Self {
        Self { notifier }
    }

    /// Decide whether navigation to `target` may be committed.
    ///
    /// Reads the session on every call. The target does not influence the
    /// outcome; it is only logged.
    pub fn can_enter(&self, ctx: &NavigationContext<'_>, target: &str) -> bool {
        if ctx.session.is_logged_in() {
            debug!(target, "navigation allowed");
            return true;
        }
        debug!(target, "navigation blocked, no session");
        self.notifier.alert(SIGN_IN_REQUIRED_MESSAGE);
        false
    }
}
