//! Tree Events
//!
//! Events emitted by `TreeService` after a mutation commits. Subscribers
//! receive them over a tokio broadcast channel, so the tree service does not
//! know who listens (caches, UI bridges, audit logs).
//!
//! # Event Flow
//!
//! 1. `TreeService` commits a transaction (create, move, update, delete, reorder)
//! 2. The matching event is sent on the broadcast channel
//! 3. Every subscriber receives it asynchronously
//!
//! Events are never emitted for rolled-back work.

use crate::models::{Category, CategoryId, ContainerKey};
use serde::Serialize;

/// Structural change to the category tree
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TreeEvent {
    /// A category was created (state after insertion)
    #[serde(rename = "created")]
    Created { category: Category },

    /// A category changed parent; its subtree moved with it
    #[serde(rename = "moved", rename_all = "camelCase")]
    Moved {
        id: CategoryId,
        old_parent_id: Option<CategoryId>,
        new_parent_id: Option<CategoryId>,
    },

    /// A category's attributes changed (state after the update)
    #[serde(rename = "updated")]
    Updated { category: Category },

    /// A category and its subtree were removed
    #[serde(rename = "deleted")]
    Deleted {
        id: CategoryId,
        removed: Vec<CategoryId>,
    },

    /// A sibling group was given an explicit order
    #[serde(rename = "reordered")]
    Reordered {
        container: ContainerKey,
        ids: Vec<CategoryId>,
    },
}

impl TreeEvent {
    /// Get a string representation of the event type
    pub fn event_type(&self) -> &str {
        match self {
            TreeEvent::Created { .. } => "category:created",
            TreeEvent::Moved { .. } => "category:moved",
            TreeEvent::Updated { .. } => "category:updated",
            TreeEvent::Deleted { .. } => "category:deleted",
            TreeEvent::Reordered { .. } => "category:reordered",
        }
    }
}
