//! Database Layer
//!
//! This module handles all database interactions using libsql (embedded SQLite):
//!
//! - Database initialization and connection management
//! - The `categories` table and its sibling-group index
//! - Row-level SQL used by the tree services inside their transactions
//! - Tree events broadcast after committed mutations
//!
//! # Architecture
//!
//! One table stores the whole tree as an adjacency list (`parent_id`) with a
//! per-group `position` and two cached counters. Tree rules live in the
//! service layer; this layer only reads and writes rows.

mod database;
mod error;
pub mod events;

pub use database::{DatabaseService, DbInsertCategoryParams};
pub use error::DatabaseError;
pub use events::TreeEvent;
