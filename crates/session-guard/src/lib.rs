//! Client-side session state and navigation guard
//!
//! `SessionState` is the single source of truth for whether the user agent
//! is signed in. It is flipped by the delegated-login completion handler and
//! by explicit logout, and publishes each transition to its subscribers.
//! `SessionGuard` reads it, through an explicit `NavigationContext`, right
//! before a navigation to a protected route is committed.

pub mod guard;
pub mod routes;
pub mod session;

pub use guard::{NavigationContext, Notifier, SessionGuard, SIGN_IN_REQUIRED_MESSAGE};
pub use routes::{Access, Navigation, RouteTable};
pub use session::{SessionState, SessionStatus, SessionTransition, SessionUser, SubscriptionId};
