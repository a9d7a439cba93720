//! Document identity.

mod id;
mod identifier;

pub use id::DocumentId;
pub use identifier::{default_identifier_factory, IdentifierFactory};
