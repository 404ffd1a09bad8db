//! Data Models
//!
//! This module contains the data structures used throughout Canopy:
//!
//! - `Category` - One node of the tree with its cached counters
//! - `NewCategory` / `CategoryUpdate` - Mutation inputs
//! - `Visibility` - Hidden-set filter passed to tree reads
//! - `ContainerKey` - Sibling group identifiers used by reordering

mod category;
mod container_key;
mod visibility;

pub use category::{
    id_from_json, parse_parent_id, validate_parent_id, Category, CategoryId, CategoryUpdate, DeleteResult,
    NewCategory, ValidationError,
};
pub use container_key::{ContainerKey, CONTAINER_KEY_PREFIX};
pub use visibility::Visibility;
