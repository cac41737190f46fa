//! Read side of the migration: the consensus node's block and state stores.

pub mod store;
pub mod types;

pub use store::*;
pub use types::*;
