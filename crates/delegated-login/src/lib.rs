//! Delegated login through an external OAuth identity provider
//!
//! The provider is reached only through a browser redirect, its callback,
//! and one code-for-identity exchange. No server memory spans the legs of
//! the round trip: the return destination travels inside the signed
//! `state` parameter, which the provider echoes back untouched.
//!
//! Login flow:
//! 1. `OAuthRedirector::begin_login()` signs the return destination into `state`
//!    and builds the provider authorization URL
//! 2. The provider authenticates the user and calls the fixed callback URL
//! 3. `ProviderClient::resolve_identity()` exchanges the code for the user's identity
//! 4. `OAuthRedirector::complete_login()` checks `state`, flips the
//!    `SessionState` and hands back the destination to resume at

pub mod correlation;
pub mod destination;
pub mod error;
pub mod provider;
pub mod redirector;

pub use destination::ReturnDestination;
pub use error::{Error, Result};
pub use provider::{ProviderClient, ProviderConfig, ProviderIdentity};
pub use redirector::{LoginChallenge, OAuthRedirector, ProviderOutcome, ProviderResponse};
