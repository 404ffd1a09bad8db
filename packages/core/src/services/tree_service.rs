//! Tree Service
//!
//! Every structural change to the category tree goes through `TreeService`:
//! create, move, update, delete and explicit reordering. Each call runs as one
//! `BEGIN IMMEDIATE` transaction on its own connection:
//!
//! 1. Validate the request (self-parent and malformed ids fail before storage)
//! 2. Read what the change depends on (parent, ancestor chains, sibling group)
//! 3. Write the row change, counters and positions
//! 4. Commit, then broadcast a [`TreeEvent`]
//!
//! Any error rolls the transaction back, so a failed call leaves the tree
//! exactly as it was. SQLite's writer lock serializes concurrent mutations.

use crate::db::{DatabaseService, DbInsertCategoryParams, TreeEvent};
use crate::models::{
    id_from_json, validate_parent_id, Category, CategoryId, CategoryUpdate, ContainerKey, DeleteResult,
    NewCategory, ValidationError, Visibility,
};
use crate::services::counter_cache::{CounterCache, CounterMismatch};
use crate::services::error::TreeError;
use crate::services::positions::PositionManager;
use crate::services::tree_reader::TreeReader;
use libsql::Connection;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Capacity of the tree event channel; slow subscribers lag beyond this
const TREE_EVENT_CHANNEL_CAPACITY: usize = 128;

/// Mutation entry point for the category tree
///
/// # Examples
///
/// ```no_run
/// # use canopy_core::{DatabaseService, NewCategory, TreeService, Visibility};
/// # use std::sync::Arc;
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let db = Arc::new(DatabaseService::new("./data/canopy.db".into()).await?);
/// let service = TreeService::new(db);
///
/// let books = service.create(NewCategory::root("Books")).await?;
/// let fiction = service.create(NewCategory::child("Fiction", books.id())).await?;
///
/// let reader = service.reader(Visibility::none());
/// assert_eq!(reader.ancestors_ids(fiction.id()).await?, vec![books.id()]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TreeService {
    db: Arc<DatabaseService>,
    counters: CounterCache,
    positions: PositionManager,

    /// Broadcast channel for tree events
    event_tx: broadcast::Sender<TreeEvent>,
}

impl TreeService {
    pub fn new(db: Arc<DatabaseService>) -> Self {
        let (event_tx, _) = broadcast::channel(TREE_EVENT_CHANNEL_CAPACITY);

        Self {
            counters: CounterCache::new(db.clone()),
            positions: PositionManager::new(db.clone()),
            db,
            event_tx,
        }
    }

    /// Get access to the underlying database service
    pub fn database(&self) -> &Arc<DatabaseService> {
        &self.db
    }

    /// Subscribe to tree events
    ///
    /// Events are sent after the mutation commits.
    pub fn subscribe(&self) -> broadcast::Receiver<TreeEvent> {
        self.event_tx.subscribe()
    }

    /// Ignores send errors: having no subscribers is normal
    fn emit_event(&self, event: TreeEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Read-side view of the tree under `visibility`
    pub fn reader(&self, visibility: Visibility) -> TreeReader {
        TreeReader::new(self.db.clone(), visibility)
    }

    /// Open a connection and start a write transaction on it
    async fn begin(&self) -> Result<Connection, TreeError> {
        let conn = self.db.connect_with_timeout().await?;
        self.db.begin_immediate(&conn).await?;
        Ok(conn)
    }

    /// Commit on success, roll back on failure
    async fn finish<T>(
        &self,
        conn: &Connection,
        operation: &str,
        result: Result<T, TreeError>,
    ) -> Result<T, TreeError> {
        match result {
            Ok(value) => {
                self.db.commit(conn).await?;
                Ok(value)
            }
            Err(e) => {
                self.db.rollback(conn).await;
                tracing::warn!("{} rejected: {}", operation, e);
                Err(e)
            }
        }
    }

    async fn fetch(&self, conn: &Connection, id: CategoryId) -> Result<Category, TreeError> {
        self.db
            .db_get_category(conn, id, "")
            .await?
            .ok_or_else(|| TreeError::not_found(id))
    }

    /// Ancestor ids a category would have directly under `parent_id`, nearest first
    ///
    /// Fails with `ReferentialIntegrity` if the parent does not exist.
    async fn chain_under(
        &self,
        conn: &Connection,
        parent_id: Option<CategoryId>,
    ) -> Result<Vec<CategoryId>, TreeError> {
        let Some(parent_id) = parent_id else {
            return Ok(Vec::new());
        };

        if self.db.db_get_category(conn, parent_id, "").await?.is_none() {
            return Err(TreeError::referential_integrity(parent_id));
        }

        let mut chain = vec![parent_id];
        chain.extend(self.db.db_ancestor_ids(conn, parent_id).await?);
        Ok(chain)
    }

    //
    // CREATE
    //

    /// Create a category at the end of its sibling group
    ///
    /// # Errors
    ///
    /// - `Validation` if the parent id is not a positive integer
    /// - `ReferentialIntegrity` if the parent does not exist
    pub async fn create(&self, new: NewCategory) -> Result<Category, TreeError> {
        new.validate()?;

        let conn = self.begin().await?;
        let result = self.create_in(&conn, &new).await;
        let category = self.finish(&conn, "Create", result).await?;

        tracing::info!(
            "Created category {} under {:?} at position {}",
            category.id(),
            category.parent_id(),
            category.position()
        );
        self.emit_event(TreeEvent::Created {
            category: category.clone(),
        });
        Ok(category)
    }

    /// Create from untyped JSON such as `{"name": "Books", "parentId": 3}`
    ///
    /// Malformed parent references (`0`, `1.5`, `"string"`) fail validation
    /// before any storage access.
    pub async fn create_from_json(&self, value: &Value) -> Result<Category, TreeError> {
        let new = NewCategory::from_json(value).inspect_err(|e| {
            tracing::warn!("Create rejected: {}", e);
        })?;
        self.create(new).await
    }

    async fn create_in(&self, conn: &Connection, new: &NewCategory) -> Result<Category, TreeError> {
        let chain = self.chain_under(conn, new.parent_id).await?;
        let position = self.positions.next_position(conn, new.parent_id).await?;

        let id = self
            .db
            .db_insert_category(
                conn,
                DbInsertCategoryParams {
                    parent_id: new.parent_id,
                    position,
                    ancestors_count: chain.len() as i64,
                    name: &new.name,
                },
            )
            .await
            .map_err(|e| TreeError::from_attach_failure(e, new.parent_id))?;

        self.counters.recompute_on_insert(conn, id, &chain).await?;
        self.fetch(conn, id).await
    }

    //
    // MOVE / UPDATE
    //

    /// Move a category (with its subtree) to the end of another sibling group
    ///
    /// `new_parent_id = None` makes it a root. Moving to the current parent
    /// is a no-op and leaves positions untouched.
    ///
    /// # Errors
    ///
    /// - `Validation` if the new parent is the category itself or one of its
    ///   descendants, or is not a positive integer
    /// - `ReferentialIntegrity` if the new parent does not exist
    /// - `NotFound` if the category does not exist
    pub async fn move_category(
        &self,
        id: CategoryId,
        new_parent_id: Option<CategoryId>,
    ) -> Result<Category, TreeError> {
        self.update(id, CategoryUpdate::new().with_parent(new_parent_id))
            .await
    }

    /// Apply a partial update: rename and/or reparent in one transaction
    pub async fn update(
        &self,
        id: CategoryId,
        update: CategoryUpdate,
    ) -> Result<Category, TreeError> {
        if let Some(Some(parent_id)) = update.parent_id {
            Self::validate_new_parent(id, parent_id).inspect_err(|e| {
                tracing::warn!("Update of category {} rejected: {}", id, e);
            })?;
        }

        let conn = self.begin().await?;
        let result = self.update_in(&conn, id, &update).await;
        let (category, moved_from) = self.finish(&conn, "Update", result).await?;

        if let Some(old_parent_id) = moved_from {
            tracing::info!(
                "Moved category {} from {:?} to {:?}",
                id,
                old_parent_id,
                category.parent_id()
            );
            self.emit_event(TreeEvent::Moved {
                id,
                old_parent_id,
                new_parent_id: category.parent_id(),
            });
        }
        if update.name.is_some() {
            tracing::info!("Renamed category {}", id);
            self.emit_event(TreeEvent::Updated {
                category: category.clone(),
            });
        }

        Ok(category)
    }

    fn validate_new_parent(id: CategoryId, parent_id: CategoryId) -> Result<(), ValidationError> {
        if parent_id == id {
            return Err(ValidationError::SelfParent(id));
        }
        validate_parent_id(parent_id)?;
        Ok(())
    }

    /// Returns the updated category and, if it moved, its former parent
    async fn update_in(
        &self,
        conn: &Connection,
        id: CategoryId,
        update: &CategoryUpdate,
    ) -> Result<(Category, Option<Option<CategoryId>>), TreeError> {
        let category = self.fetch(conn, id).await?;

        let mut moved_from = None;
        if let Some(new_parent_id) = update.parent_id {
            if new_parent_id != category.parent_id() {
                self.move_in(conn, &category, new_parent_id).await?;
                moved_from = Some(category.parent_id());
            }
        }

        if let Some(name) = &update.name {
            self.db.db_set_name(conn, id, name).await?;
        }

        Ok((self.fetch(conn, id).await?, moved_from))
    }

    async fn move_in(
        &self,
        conn: &Connection,
        category: &Category,
        new_parent_id: Option<CategoryId>,
    ) -> Result<(), TreeError> {
        let id = category.id();
        let new_chain = self.chain_under(conn, new_parent_id).await?;

        // The new parent's ancestry must not pass through the moved category
        if new_chain.contains(&id) {
            return Err(ValidationError::ParentIsDescendant {
                id,
                // chain_under returns the parent first when it is non-empty
                parent_id: new_chain[0],
            }
            .into());
        }

        let old_chain = self.db.db_ancestor_ids(conn, id).await?;
        self.counters
            .recompute_path_after_structural_change(conn, category, &old_chain, &new_chain)
            .await?;

        let position = self.positions.next_position(conn, new_parent_id).await?;
        self.db
            .db_set_parent(conn, id, new_parent_id, position)
            .await
            .map_err(|e| TreeError::from_attach_failure(e, new_parent_id))?;

        self.positions
            .renumber_siblings(conn, category.parent_id())
            .await?;
        Ok(())
    }

    //
    // DELETE
    //

    /// Delete a category and its whole subtree
    ///
    /// Former siblings are renumbered and every former ancestor loses the
    /// removed subtree from its `descendants_count`. Deleting a missing id
    /// is not an error and returns [`DeleteResult::not_found`].
    pub async fn delete(&self, id: CategoryId) -> Result<DeleteResult, TreeError> {
        let conn = self.begin().await?;
        let result = self.delete_in(&conn, id).await;
        let deleted = self.finish(&conn, "Delete", result).await?;

        if deleted.existed {
            tracing::info!(
                "Deleted category {} ({} categories removed)",
                id,
                deleted.removed.len()
            );
            self.emit_event(TreeEvent::Deleted {
                id,
                removed: deleted.removed.clone(),
            });
        } else {
            tracing::debug!("Delete of missing category {} ignored", id);
        }
        Ok(deleted)
    }

    async fn delete_in(&self, conn: &Connection, id: CategoryId) -> Result<DeleteResult, TreeError> {
        let Some(category) = self.db.db_get_category(conn, id, "").await? else {
            return Ok(DeleteResult::not_found());
        };

        let mut subtree: Vec<CategoryId> = self
            .db
            .db_subtree(conn, id)
            .await?
            .iter()
            .map(Category::id)
            .collect();
        subtree.sort_unstable();

        let mut removed = Vec::with_capacity(subtree.len() + 1);
        removed.push(id);
        removed.extend(subtree);

        let chain = self.db.db_ancestor_ids(conn, id).await?;

        self.db.db_delete_categories(conn, &removed).await?;
        self.counters
            .recompute_on_delete(conn, &chain, removed.len() as i64)
            .await?;
        self.positions
            .renumber_siblings(conn, category.parent_id())
            .await?;

        Ok(DeleteResult {
            existed: true,
            removed,
        })
    }

    //
    // ORDERING
    //

    /// Reorder one sibling group named by a container key
    ///
    /// See [`PositionManager::apply_order`] for the accepted input.
    pub async fn apply_order(
        &self,
        key: &str,
        ordered_ids: &[CategoryId],
    ) -> Result<ContainerKey, TreeError> {
        let conn = self.begin().await?;
        let result = self.positions.apply_order(&conn, key, ordered_ids).await;
        let container = self.finish(&conn, "Reorder", result).await?;

        tracing::info!("Reordered {}", container);
        self.emit_event(TreeEvent::Reordered {
            container,
            ids: ordered_ids.to_vec(),
        });
        Ok(container)
    }

    /// Reorder several sibling groups in one transaction
    ///
    /// Accepts the payload of a drag-and-drop endpoint:
    /// `{"sortable_categories_2": [5, 3, 4], ...}`. If any group is invalid
    /// none of them is applied.
    pub async fn update_positions(
        &self,
        orders: &BTreeMap<String, Vec<CategoryId>>,
    ) -> Result<Vec<ContainerKey>, TreeError> {
        let conn = self.begin().await?;
        let result = self.update_positions_in(&conn, orders).await;
        let applied = self.finish(&conn, "Position update", result).await?;

        tracing::info!("Reordered {} sibling groups", applied.len());
        let mut containers = Vec::with_capacity(applied.len());
        for (container, ids) in applied {
            containers.push(container);
            self.emit_event(TreeEvent::Reordered { container, ids });
        }
        Ok(containers)
    }

    async fn update_positions_in(
        &self,
        conn: &Connection,
        orders: &BTreeMap<String, Vec<CategoryId>>,
    ) -> Result<Vec<(ContainerKey, Vec<CategoryId>)>, TreeError> {
        let mut applied = Vec::with_capacity(orders.len());
        for (key, ids) in orders {
            let container = self.positions.apply_order(conn, key, ids).await?;
            applied.push((container, ids.clone()));
        }
        Ok(applied)
    }

    /// Parse a JSON reordering payload and apply it with [`Self::update_positions`]
    ///
    /// The payload maps container keys to id lists. Ids may be integers or
    /// strings of ASCII digits, as sortable list widgets send them. Any other
    /// shape is `InvalidArgument`.
    pub async fn update_positions_from_json(
        &self,
        value: &Value,
    ) -> Result<Vec<ContainerKey>, TreeError> {
        let orders = Self::parse_orders(value)?;
        self.update_positions(&orders).await
    }

    fn parse_orders(value: &Value) -> Result<BTreeMap<String, Vec<CategoryId>>, TreeError> {
        let Value::Object(entries) = value else {
            return Err(TreeError::invalid_argument(format!(
                "reorder payload must map container keys to id lists, got {}",
                value
            )));
        };

        let mut orders = BTreeMap::new();
        for (key, list) in entries {
            let Value::Array(items) = list else {
                return Err(TreeError::invalid_argument(format!(
                    "ids for {} must be a list, got {}",
                    key, list
                )));
            };
            let ids = items
                .iter()
                .map(|item| {
                    id_from_json(item).filter(|id| *id > 0).ok_or_else(|| {
                        TreeError::invalid_argument(format!(
                            "invalid category id in {}: {}",
                            key, item
                        ))
                    })
                })
                .collect::<Result<Vec<CategoryId>, TreeError>>()?;
            orders.insert(key.clone(), ids);
        }
        Ok(orders)
    }

    //
    // AUDIT
    //

    /// Compare every cached counter against a full walk of the tree
    pub async fn verify_counters(&self) -> Result<Vec<CounterMismatch>, TreeError> {
        let conn = self.db.connect_with_timeout().await?;
        self.counters.verify(&conn).await
    }
}

// Tree behavior tests in separate module
#[cfg(test)]
#[path = "tree_service_test.rs"]
mod tree_service_test;
