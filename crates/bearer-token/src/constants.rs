//! Token issuance defaults
//!
//! These are the reference values the gateway falls back to when its
//! `[token]` config section leaves a field out. None of them are secrets.

use std::time::Duration;

/// Issuer stamped into every token (`iss`)
pub const DEFAULT_ISSUER: &str = "myapi.com";

/// Audience stamped into every token (`aud`)
pub const DEFAULT_AUDIENCE: &str = "myapi.com";

/// Role claim given to every verified identity
pub const DEFAULT_ROLE: &str = "User";

/// Identity accepted by the default allow-list
pub const DEFAULT_ACCEPTED_USER: &str = "Prerak";

/// Token lifetime: issuance time plus seven days
pub const DEFAULT_VALIDITY: Duration = Duration::from_secs(7 * 24 * 60 * 60);
