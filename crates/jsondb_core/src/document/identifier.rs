//! Identifier generation.

use super::DocumentId;
use std::sync::Arc;
use uuid::Uuid;

/// Produces identifiers for saved documents that carry none.
///
/// Called with the collection name.
pub type IdentifierFactory = Arc<dyn Fn(&str) -> DocumentId + Send + Sync>;

/// Returns the default factory, which yields random UUID v4 strings.
#[must_use]
pub fn default_identifier_factory() -> IdentifierFactory {
    Arc::new(|_collection| DocumentId::Text(Uuid::new_v4().to_string()))
}
