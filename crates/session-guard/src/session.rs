//! Session state with synchronous, ordered change notification
//!
//! Two states: `LoggedOut` (initial) and `LoggedIn`. A login while already
//! logged in, or a logout while logged out, changes nothing and notifies
//! nobody. Subscribers are keyed by a monotonically increasing
//! `SubscriptionId`, so iterating the map delivers in subscription order.
//!
//! The new state is committed before any subscriber runs, and the lock is
//! released first, so a subscriber may read the session (or subscribe,
//! unsubscribe) from inside its callback.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// The signed-in user, as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    LoggedOut,
    LoggedIn(SessionUser),
}

/// Event delivered to subscribers on every state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionTransition {
    LoggedIn(SessionUser),
    LoggedOut,
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

type Observer = Arc<dyn Fn(&SessionTransition) + Send + Sync>;

struct Inner {
    status: SessionStatus,
    next_id: u64,
    observers: BTreeMap<SubscriptionId, Observer>,
}

pub struct SessionState {
    inner: Mutex<Inner>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                status: SessionStatus::LoggedOut,
                next_id: 0,
                observers: BTreeMap::new(),
            }),
        }
    }

    // A panicking observer never runs under the lock, so a poisoned mutex
    // still holds consistent data.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_logged_in(&self) -> bool {
        matches!(self.lock().status, SessionStatus::LoggedIn(_))
    }

    /// Snapshot of the current state.
    pub fn status(&self) -> SessionStatus {
        self.lock().status.clone()
    }

    pub fn user(&self) -> Option<SessionUser> {
        match &self.lock().status {
            SessionStatus::LoggedIn(user) => Some(user.clone()),
            SessionStatus::LoggedOut => None,
        }
    }

    /// Register an observer. It sees every later transition, never past ones.
    pub fn subscribe<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&SessionTransition) + Send + Sync + 'static,
    {
        let mut inner = self.lock();
        let id = SubscriptionId(inner.next_id);
        inner.next_id += 1;
        inner.observers.insert(id, Arc::new(observer));
        debug!(subscription = id.0, "session observer subscribed");
        id
    }

    /// Returns false when the id was not (or no longer) subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.lock().observers.remove(&id).is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().observers.len()
    }

    /// `LoggedOut -> LoggedIn`. Returns whether a transition happened.
    pub fn log_in(&self, user: SessionUser) -> bool {
        let observers = {
            let mut inner = self.lock();
            if matches!(inner.status, SessionStatus::LoggedIn(_)) {
                debug!("login confirmed while already logged in, ignoring");
                return false;
            }
            inner.status = SessionStatus::LoggedIn(user.clone());
            snapshot(&inner)
        };

        info!(user_id = %user.id, "session logged in");
        notify(&observers, &SessionTransition::LoggedIn(user));
        true
    }

    /// `LoggedIn -> LoggedOut`. Returns whether a transition happened.
    pub fn log_out(&self) -> bool {
        let observers = {
            let mut inner = self.lock();
            if inner.status == SessionStatus::LoggedOut {
                return false;
            }
            inner.status = SessionStatus::LoggedOut;
            snapshot(&inner)
        };

        info!("session logged out");
        notify(&observers, &SessionTransition::LoggedOut);
        true
    }
}

fn snapshot(inner: &Inner) -> Vec<Observer> {
    inner.observers.values().cloned().collect()
}

fn notify(observers: &[Observer], transition: &SessionTransition) {
    for observer in observers {
        observer(transition);
    }
}
