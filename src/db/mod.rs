//! SQLite persistence layer.
//!
//! This module provides:
//! - Database initialization and schema application
//! - Pragma configuration (WAL, busy timeout)
//! - The repository, split across submodules by source table

pub mod migrations;
pub mod repo;

pub use migrations::init_db;
pub use repo::Repository;
