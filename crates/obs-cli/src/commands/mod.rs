//! Command implementations for the Obscura CLI

pub mod check;
pub mod common;
pub mod encode;
pub mod inspect;
pub mod transform;

pub use check::check_command;
pub use encode::encode_command;
pub use inspect::inspect_command;
pub use transform::transform_command;
