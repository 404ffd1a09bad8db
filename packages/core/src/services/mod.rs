//! Tree Services
//!
//! This module contains the tree logic on top of the database layer:
//!
//! - `TreeService` - create, move, update, delete and reorder categories
//! - `TreeReader` - visibility-filtered reads and the nested outline
//! - `CounterCache` - cached ancestor/descendant counts
//! - `PositionManager` - dense 1-based sibling positions
//!
//! Mutations run one storage transaction each; the counter and position
//! helpers only ever run inside those transactions.

pub mod counter_cache;
pub mod error;
pub mod outline;
pub mod positions;
pub mod tree_reader;
pub mod tree_service;

pub use counter_cache::{CounterCache, CounterMismatch};
pub use error::TreeError;
pub use outline::OutlineEntry;
pub use positions::PositionManager;
pub use tree_reader::TreeReader;
pub use tree_service::TreeService;
