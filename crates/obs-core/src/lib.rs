//! Shared types for the Obscura transformation crates.

pub mod diagnostics;
pub mod error;
pub mod ident_map;
pub mod level;

pub use error::{Error, Result};
pub use ident_map::{IdentifierEntry, IdentifierMap, ScopeId};
pub use level::Level;
