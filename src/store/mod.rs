//! Internal record store.
//!
//! The identity mapping store owns the binding between internal employee IDs
//! and external identifiers; [`MemoryStore`] adds centres and the fact
//! tables on top of it.

mod error;
mod identity;
mod memory;

pub use error::StoreError;
pub use identity::{IdentifierKind, IdentityConflict, IdentityError, IdentityMappingStore};
pub use memory::{FactSnapshot, MemoryStore};
