//! Route table consulted before a view mounts

use std::collections::HashMap;

use crate::guard::{NavigationContext, Notifier, SessionGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    /// Entry goes through the session guard
    Protected,
}

/// Result of a navigation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Entered(String),
    /// The guard refused; `redirect_to` is the login route, if one is registered.
    Blocked { redirect_to: Option<String> },
    NotFound,
}

#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: HashMap<String, Access>,
    login_route: Option<String>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn public(mut self, path: impl Into<String>) -> Self {
        self.routes.insert(normalize(&path.into()), Access::Public);
        self
    }

    pub fn protected(mut self, path: impl Into<String>) -> Self {
        self.routes.insert(normalize(&path.into()), Access::Protected);
        self
    }

    /// Register the public route unauthenticated users are sent to.
    pub fn login(mut self, path: impl Into<String>) -> Self {
        let path = normalize(&path.into());
        self.routes.insert(path.clone(), Access::Public);
        self.login_route = Some(path);
        self
    }

    pub fn access(&self, path: &str) -> Option<Access> {
        self.routes.get(&normalize(path)).copied()
    }

    /// Resolve `path` and, for protected routes, ask the guard first.
    pub fn navigate<N: Notifier>(
        &self,
        guard: &SessionGuard<N>,
        ctx: &NavigationContext<'_>,
        path: &str,
    ) -> Navigation {
        let path = normalize(path);
        match self.routes.get(&path) {
            None => Navigation::NotFound,
            Some(Access::Public) => Navigation::Entered(path),
            Some(Access::Protected) => {
                if guard.can_enter(ctx, &path) {
                    Navigation::Entered(path)
                } else {
                    Navigation::Blocked {
                        redirect_to: self.login_route.clone(),
                    }
                }
            }
        }
    }
}

/// Leading slash, no trailing slash, query and fragment dropped.
fn normalize(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let trimmed = path.trim_matches('/');
    format!("/{trimmed}")
}
