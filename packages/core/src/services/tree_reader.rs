//! Tree Reader
//!
//! Read-only queries over the category tree, filtered by a [`Visibility`]
//! value fixed when the reader is created. Listings (`roots`, `children`,
//! `siblings`, `self_and_siblings`, `descendants`) and `get` skip hidden
//! categories; ancestry (`ancestors`, `parent`, `root`) reports the real
//! structure regardless of visibility.
//!
//! Readers take no locks and open a fresh connection per call, so they
//! never block writers (WAL mode).

use crate::db::DatabaseService;
use crate::models::{Category, CategoryId, Visibility};
use crate::services::error::TreeError;
use libsql::Connection;
use std::collections::HashMap;
use std::sync::Arc;

/// Visibility-filtered view of the category tree
#[derive(Debug, Clone)]
pub struct TreeReader {
    db: Arc<DatabaseService>,
    visibility: Visibility,
}

impl TreeReader {
    pub fn new(db: Arc<DatabaseService>, visibility: Visibility) -> Self {
        Self { db, visibility }
    }

    /// The hidden set this reader filters with
    pub fn visibility(&self) -> &Visibility {
        &self.visibility
    }

    pub(crate) fn database(&self) -> &Arc<DatabaseService> {
        &self.db
    }

    async fn conn(&self) -> Result<Connection, TreeError> {
        Ok(self.db.connect_with_timeout().await?)
    }

    /// Fetch a category ignoring visibility; `NotFound` if it does not exist
    async fn existing(&self, conn: &Connection, id: CategoryId) -> Result<Category, TreeError> {
        self.db
            .db_get_category(conn, id, "")
            .await?
            .ok_or_else(|| TreeError::not_found(id))
    }

    /// Direct lookup; `None` if the category is missing or hidden
    pub async fn get(&self, id: CategoryId) -> Result<Option<Category>, TreeError> {
        let conn = self.conn().await?;
        Ok(self
            .db
            .db_get_category(&conn, id, &self.visibility.exclusion_clause("AND"))
            .await?)
    }

    /// Direct lookup; `NotFound` if the category is missing or hidden
    pub async fn find(&self, id: CategoryId) -> Result<Category, TreeError> {
        self.get(id).await?.ok_or_else(|| TreeError::not_found(id))
    }

    /// Top-level categories by position
    pub async fn roots(&self) -> Result<Vec<Category>, TreeError> {
        let conn = self.conn().await?;
        Ok(self
            .db
            .db_select_group(&conn, None, &self.visibility.exclusion_clause("AND"))
            .await?)
    }

    /// Direct children of `id` by position
    pub async fn children(&self, id: CategoryId) -> Result<Vec<Category>, TreeError> {
        let conn = self.conn().await?;
        Ok(self
            .db
            .db_select_group(&conn, Some(id), &self.visibility.exclusion_clause("AND"))
            .await?)
    }

    /// Parent of `id`, or `None` for a root
    pub async fn parent(&self, id: CategoryId) -> Result<Option<Category>, TreeError> {
        let conn = self.conn().await?;
        let category = self.existing(&conn, id).await?;
        match category.parent_id() {
            Some(parent_id) => Ok(self.db.db_get_category(&conn, parent_id, "").await?),
            None => Ok(None),
        }
    }

    /// The category's sibling group by position, itself included
    pub async fn self_and_siblings(&self, id: CategoryId) -> Result<Vec<Category>, TreeError> {
        let conn = self.conn().await?;
        let category = self.existing(&conn, id).await?;
        Ok(self
            .db
            .db_select_group(
                &conn,
                category.parent_id(),
                &self.visibility.exclusion_clause("AND"),
            )
            .await?)
    }

    /// The category's sibling group by position, itself excluded
    pub async fn siblings(&self, id: CategoryId) -> Result<Vec<Category>, TreeError> {
        let mut group = self.self_and_siblings(id).await?;
        group.retain(|sibling| sibling.id() != id);
        Ok(group)
    }

    /// Ancestors nearest first, up to the root
    pub async fn ancestors(&self, id: CategoryId) -> Result<Vec<Category>, TreeError> {
        let conn = self.conn().await?;
        self.existing(&conn, id).await?;
        Ok(self.db.db_ancestors(&conn, id).await?)
    }

    pub async fn ancestors_ids(&self, id: CategoryId) -> Result<Vec<CategoryId>, TreeError> {
        let conn = self.conn().await?;
        self.existing(&conn, id).await?;
        Ok(self.db.db_ancestor_ids(&conn, id).await?)
    }

    /// Topmost ancestor, or the category itself if it is a root
    pub async fn root(&self, id: CategoryId) -> Result<Category, TreeError> {
        let conn = self.conn().await?;
        let category = self.existing(&conn, id).await?;
        let ancestors = self.db.db_ancestors(&conn, id).await?;
        Ok(ancestors.into_iter().last().unwrap_or(category))
    }

    /// Every category below `id` in pre-order, siblings by position
    ///
    /// A hidden category is left out of the listing, but its own descendants
    /// are still visited and listed unless they are hidden too.
    pub async fn descendants(&self, id: CategoryId) -> Result<Vec<Category>, TreeError> {
        let conn = self.conn().await?;
        self.existing(&conn, id).await?;
        let subtree = self.db.db_subtree(&conn, id).await?;

        let mut children: HashMap<CategoryId, Vec<Category>> = HashMap::new();
        for category in subtree {
            if let Some(parent_id) = category.parent_id() {
                children.entry(parent_id).or_default().push(category);
            }
        }
        for group in children.values_mut() {
            // Reversed so popping from the stack yields position order
            group.sort_by_key(|c| std::cmp::Reverse((c.position(), c.id())));
        }

        let mut listed = Vec::new();
        let mut stack: Vec<Category> = children.remove(&id).unwrap_or_default();
        while let Some(category) = stack.pop() {
            if let Some(kids) = children.remove(&category.id()) {
                stack.extend(kids);
            }
            if !self.visibility.is_hidden_category(&category) {
                listed.push(category);
            }
        }

        tracing::debug!("Listed {} descendants of category {}", listed.len(), id);
        Ok(listed)
    }

    pub async fn descendants_ids(&self, id: CategoryId) -> Result<Vec<CategoryId>, TreeError> {
        Ok(self
            .descendants(id)
            .await?
            .iter()
            .map(Category::id)
            .collect())
    }

    /// Physical size of the sibling group under `parent_id`, hidden ones included
    pub async fn group_size(&self, parent_id: Option<CategoryId>) -> Result<i64, TreeError> {
        let conn = self.conn().await?;
        Ok(self.db.db_count_group(&conn, parent_id).await?)
    }

    /// Total number of stored categories, hidden ones included
    pub async fn count(&self) -> Result<i64, TreeError> {
        let conn = self.conn().await?;
        Ok(self.db.db_count(&conn).await?)
    }
}
