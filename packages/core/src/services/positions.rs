//! Position Manager
//!
//! Sibling groups keep dense 1-based positions: a group of `N` categories
//! holds exactly the positions `1..=N`. New categories append at `N + 1`;
//! removals and moves out of a group close the gap by renumbering.
//!
//! All methods take the connection of an open transaction; the tree service
//! owns transaction boundaries.

use crate::db::DatabaseService;
use crate::models::{CategoryId, ContainerKey};
use crate::services::error::TreeError;
use libsql::Connection;
use std::collections::HashSet;
use std::sync::Arc;

/// Maintains dense sibling positions
#[derive(Debug, Clone)]
pub struct PositionManager {
    db: Arc<DatabaseService>,
}

impl PositionManager {
    pub fn new(db: Arc<DatabaseService>) -> Self {
        Self { db }
    }

    /// Position for a category appended to the group under `parent_id`
    pub async fn next_position(
        &self,
        conn: &Connection,
        parent_id: Option<CategoryId>,
    ) -> Result<i64, TreeError> {
        Ok(self.db.db_count_group(conn, parent_id).await? + 1)
    }

    /// Reassign positions `1..=N` in the group under `parent_id`, keeping order
    ///
    /// Only rows whose position actually changes are written.
    ///
    /// # Returns
    ///
    /// Number of categories renumbered
    pub async fn renumber_siblings(
        &self,
        conn: &Connection,
        parent_id: Option<CategoryId>,
    ) -> Result<usize, TreeError> {
        let group = self.db.db_select_group(conn, parent_id, "").await?;

        let mut renumbered = 0;
        for (index, category) in group.iter().enumerate() {
            let position = index as i64 + 1;
            if category.position() != position {
                self.db
                    .db_set_position(conn, category.id(), position)
                    .await?;
                renumbered += 1;
            }
        }

        if renumbered > 0 {
            tracing::debug!(
                "Renumbered {} of {} categories in {}",
                renumbered,
                group.len(),
                ContainerKey::for_parent(parent_id)
            );
        }
        Ok(renumbered)
    }

    /// Give the group named by `key` the order of `ordered_ids`
    ///
    /// The list must be a permutation of the group: same length, every id a
    /// member, no repeats. The parent named in the key must exist (`0` names
    /// the root group). On success `ordered_ids[i]` gets position `i + 1`.
    ///
    /// # Errors
    ///
    /// `TreeError::InvalidArgument` for a malformed key, unknown parent,
    /// length mismatch, foreign id or repeated id. Nothing is written in
    /// that case.
    pub async fn apply_order(
        &self,
        conn: &Connection,
        key: &str,
        ordered_ids: &[CategoryId],
    ) -> Result<ContainerKey, TreeError> {
        let container = ContainerKey::parse(key).ok_or_else(|| {
            TreeError::invalid_argument(format!("Malformed container key '{}'", key))
        })?;

        self.validate_order(conn, &container, ordered_ids).await?;

        for (index, id) in ordered_ids.iter().enumerate() {
            self.db
                .db_set_position(conn, *id, index as i64 + 1)
                .await?;
        }

        tracing::debug!("Applied order of {} ids to {}", ordered_ids.len(), container);
        Ok(container)
    }

    async fn validate_order(
        &self,
        conn: &Connection,
        container: &ContainerKey,
        ordered_ids: &[CategoryId],
    ) -> Result<(), TreeError> {
        if let Some(parent_id) = container.parent_id() {
            if self.db.db_get_category(conn, parent_id, "").await?.is_none() {
                return Err(TreeError::invalid_argument(format!(
                    "Container {} names a category that does not exist",
                    container
                )));
            }
        }

        let group: HashSet<CategoryId> = self
            .db
            .db_group_ids(conn, container.parent_id())
            .await?
            .into_iter()
            .collect();

        if ordered_ids.len() != group.len() {
            return Err(TreeError::invalid_argument(format!(
                "Order for {} lists {} ids but the group has {}",
                container,
                ordered_ids.len(),
                group.len()
            )));
        }

        let mut seen = HashSet::with_capacity(ordered_ids.len());
        for id in ordered_ids {
            if !group.contains(id) {
                return Err(TreeError::invalid_argument(format!(
                    "Category {} is not in {}",
                    id, container
                )));
            }
            if !seen.insert(*id) {
                return Err(TreeError::invalid_argument(format!(
                    "Category {} is listed twice for {}",
                    id, container
                )));
            }
        }

        Ok(())
    }
}
