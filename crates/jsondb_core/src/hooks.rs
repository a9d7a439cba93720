//! Caller-installed callbacks.

use crate::document::{default_identifier_factory, IdentifierFactory};
use crate::error::CoreError;
use std::fmt;
use std::sync::Arc;

/// Receives every error returned by a public operation, with the database
/// name. A diagnostics side channel; it cannot change the outcome.
pub type ErrorHandler = Arc<dyn Fn(&str, &CoreError) + Send + Sync>;

/// Returns the default handler, which logs through `tracing`.
#[must_use]
pub fn default_error_handler() -> ErrorHandler {
    Arc::new(|database, error| {
        tracing::error!(database, %error, "operation failed");
    })
}

/// The callbacks a database consults.
#[derive(Clone)]
pub(crate) struct Hooks {
    pub(crate) error_handler: ErrorHandler,
    pub(crate) identifier_factory: IdentifierFactory,
}

impl Default for Hooks {
    fn default() -> Self {
        Self {
            error_handler: default_error_handler(),
            identifier_factory: default_identifier_factory(),
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks").finish_non_exhaustive()
    }
}
