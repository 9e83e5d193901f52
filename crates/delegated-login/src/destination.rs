//! Post-login return destination

use std::fmt;

use crate::error::{Error, Result};

/// Local path the user is sent to once the login completes.
///
/// Only same-origin paths are accepted, so the round trip cannot be turned
/// into an open redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnDestination(String);

impl ReturnDestination {
    /// Absent or empty input means the site root.
    pub fn parse(raw: Option<&str>) -> Result<Self> {
        let raw = raw.map(str::trim).unwrap_or_default();
        if raw.is_empty() {
            return Ok(Self::root());
        }
        if !raw.starts_with('/') {
            return Err(Error::InvalidDestination(format!(
                "must be a local path starting with '/', got {raw:?}"
            )));
        }
        if raw.starts_with("//") || raw.starts_with("/\\") {
            return Err(Error::InvalidDestination(format!(
                "protocol-relative destinations are not allowed, got {raw:?}"
            )));
        }
        if raw.chars().any(char::is_control) {
            return Err(Error::InvalidDestination(
                "destination contains control characters".into(),
            ));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn root() -> Self {
        Self("/".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The path component, without query or fragment.
    pub fn path(&self) -> &str {
        self.0.split(['?', '#']).next().unwrap_or("/")
    }
}

impl fmt::Display for ReturnDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
