//! chainport - one-shot migration of a consensus chain's history into a rollup store
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Stores
//! - [`persistence`] - Key-value store abstraction and backends (SQLite, memory)
//! - [`source`] - Read-only block and state stores of the consensus node
//! - [`target`] - Rollup store schema and writer
//!
//! ## Migration
//! - [`transform`] - Pure record mappings from source to target schema
//! - [`migration`] - Height-descending migration driver
//!
//! ## Configuration & Utilities
//! - [`config`] - Node configuration loading
//! - [`error`] - Error types
//! - [`cli`] - CLI utilities

#![forbid(unsafe_code)]

// ============================================================================
// Stores
// ============================================================================
pub mod persistence;
pub mod source;
pub mod target;

// ============================================================================
// Migration
// ============================================================================
pub mod migration;
pub mod transform;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod cli;
pub mod config;
pub mod error;

pub use error::{MigrationError, Result};
pub use migration::{MigrationPhase, MigrationReport, Migrator};
