//! Common types for the session gateway workspace

mod secret;
mod error;

pub use secret::{Secret, resolve_secret};
pub use error::{Error, Result};
