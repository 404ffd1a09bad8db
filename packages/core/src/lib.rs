//! Canopy Core - Persistent Category Tree
//!
//! This crate maintains a self-referencing category tree inside an embedded
//! libsql database. Every category carries its parent link, a dense 1-based
//! position among its siblings, and cached ancestor/descendant counters that
//! are kept exact across inserts, moves and deletes.
//!
//! # Architecture
//!
//! - **Tree Mutator** ([`TreeService`]): insert / reparent / update / delete,
//!   each executed as one `BEGIN IMMEDIATE` transaction
//! - **Counter Cache** ([`CounterCache`]): incremental maintenance of
//!   `ancestors_count` and `descendants_count`
//! - **Position Manager** ([`PositionManager`]): gap-free sibling ordering and
//!   bulk reordering by container key
//! - **Tree Reader** ([`TreeReader`]): navigation queries filtered through an
//!   explicit [`Visibility`] value
//!
//! # Modules
//!
//! - [`models`] - Category record, update types, visibility and container keys
//! - [`services`] - Tree mutator, reader, counter cache, position manager
//! - [`db`] - libsql database layer and tree events
//! - [`config`] - Runtime configuration

pub mod config;
pub mod db;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use config::CanopyConfig;
pub use db::{DatabaseError, DatabaseService, TreeEvent};
pub use models::*;
pub use services::*;
