//! Write side of the migration: the rollup store schema and its writer.

pub mod store;
pub mod types;

pub use store::*;
pub use types::*;
