//! Counter Cache
//!
//! Keeps `ancestors_count` and `descendants_count` on every category equal to
//! the counts a full walk of the tree would produce. The tree service calls
//! these hooks inside the same transaction as the structural write, so the
//! counters commit or roll back together with it.

use crate::db::DatabaseService;
use crate::models::{Category, CategoryId};
use crate::services::error::TreeError;
use libsql::Connection;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A category whose cached counters disagree with the live tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterMismatch {
    pub id: CategoryId,
    pub cached_ancestors: i64,
    pub actual_ancestors: i64,
    pub cached_descendants: i64,
    pub actual_descendants: i64,
}

/// Maintains the cached depth and subtree-size counters
#[derive(Debug, Clone)]
pub struct CounterCache {
    db: Arc<DatabaseService>,
}

impl CounterCache {
    pub fn new(db: Arc<DatabaseService>) -> Self {
        Self { db }
    }

    /// Cached number of ancestors (O(1))
    pub fn ancestors_count_of(category: &Category) -> i64 {
        category.ancestors_count()
    }

    /// Cached number of descendants (O(1))
    pub fn descendants_count_of(category: &Category) -> i64 {
        category.descendants_count()
    }

    /// Counters for a freshly inserted leaf
    ///
    /// `chain` is the new node's ancestor ids, nearest first. The node gets
    /// `ancestors_count = chain.len()` and every ancestor gains one descendant.
    pub async fn recompute_on_insert(
        &self,
        conn: &Connection,
        id: CategoryId,
        chain: &[CategoryId],
    ) -> Result<(), TreeError> {
        self.db
            .db_init_counters(conn, id, chain.len() as i64)
            .await?;
        self.db.db_adjust_descendants_count(conn, chain, 1).await?;

        tracing::debug!(
            "Counters initialized for category {} ({} ancestors updated)",
            id,
            chain.len()
        );
        Ok(())
    }

    /// Counters after `category` and its subtree moved from `old_chain` to `new_chain`
    ///
    /// `category` is the state read before the move. Ancestors present in only
    /// one chain change by the size of the moved subtree; every node in the
    /// subtree shifts its depth by the difference in chain length.
    pub async fn recompute_path_after_structural_change(
        &self,
        conn: &Connection,
        category: &Category,
        old_chain: &[CategoryId],
        new_chain: &[CategoryId],
    ) -> Result<(), TreeError> {
        let subtree_size = 1 + category.descendants_count();

        let old_set: HashSet<CategoryId> = old_chain.iter().copied().collect();
        let new_set: HashSet<CategoryId> = new_chain.iter().copied().collect();

        let left: Vec<CategoryId> = old_chain
            .iter()
            .copied()
            .filter(|id| !new_set.contains(id))
            .collect();
        let joined: Vec<CategoryId> = new_chain
            .iter()
            .copied()
            .filter(|id| !old_set.contains(id))
            .collect();

        self.db
            .db_adjust_descendants_count(conn, &left, -subtree_size)
            .await?;
        self.db
            .db_adjust_descendants_count(conn, &joined, subtree_size)
            .await?;

        let depth_delta = new_chain.len() as i64 - old_chain.len() as i64;
        if depth_delta != 0 {
            let mut moved: Vec<CategoryId> = self
                .db
                .db_subtree(conn, category.id())
                .await?
                .iter()
                .map(Category::id)
                .collect();
            moved.push(category.id());
            self.db
                .db_adjust_ancestors_count(conn, &moved, depth_delta)
                .await?;
        }

        tracing::debug!(
            "Counters shifted for category {}: subtree size {}, depth delta {}, {} ancestors left, {} joined",
            category.id(),
            subtree_size,
            depth_delta,
            left.len(),
            joined.len()
        );
        Ok(())
    }

    /// Counters after removing `removed_count` nodes below the ancestors in `chain`
    pub async fn recompute_on_delete(
        &self,
        conn: &Connection,
        chain: &[CategoryId],
        removed_count: i64,
    ) -> Result<(), TreeError> {
        self.db
            .db_adjust_descendants_count(conn, chain, -removed_count)
            .await?;
        Ok(())
    }

    /// Walk the whole tree and report every category whose counters are stale
    ///
    /// An empty result means the cache is exact.
    pub async fn verify(&self, conn: &Connection) -> Result<Vec<CounterMismatch>, TreeError> {
        let categories = self.db.db_select_all(conn, "").await?;

        let mut children: HashMap<Option<CategoryId>, Vec<CategoryId>> = HashMap::new();
        for category in &categories {
            children
                .entry(category.parent_id())
                .or_default()
                .push(category.id());
        }

        // Depths top-down from the roots
        let mut depth: HashMap<CategoryId, i64> = HashMap::new();
        let mut order: Vec<CategoryId> = Vec::with_capacity(categories.len());
        let mut stack: Vec<(CategoryId, i64)> = children
            .get(&None)
            .map(|roots| roots.iter().map(|id| (*id, 0)).collect())
            .unwrap_or_default();
        while let Some((id, d)) = stack.pop() {
            depth.insert(id, d);
            order.push(id);
            if let Some(kids) = children.get(&Some(id)) {
                stack.extend(kids.iter().map(|kid| (*kid, d + 1)));
            }
        }

        // Subtree sizes bottom-up: reversed discovery order visits children first
        let mut below: HashMap<CategoryId, i64> = HashMap::new();
        for id in order.iter().rev() {
            let size = children
                .get(&Some(*id))
                .map(|kids| {
                    kids.iter()
                        .map(|kid| 1 + below.get(kid).copied().unwrap_or(0))
                        .sum()
                })
                .unwrap_or(0);
            below.insert(*id, size);
        }

        let mismatches: Vec<CounterMismatch> = categories
            .iter()
            .filter_map(|category| {
                let actual_ancestors = depth.get(&category.id()).copied().unwrap_or(-1);
                let actual_descendants = below.get(&category.id()).copied().unwrap_or(-1);
                let stale = actual_ancestors != category.ancestors_count()
                    || actual_descendants != category.descendants_count();
                stale.then(|| CounterMismatch {
                    id: category.id(),
                    cached_ancestors: category.ancestors_count(),
                    actual_ancestors,
                    cached_descendants: category.descendants_count(),
                    actual_descendants,
                })
            })
            .collect();

        if !mismatches.is_empty() {
            tracing::warn!("Counter audit found {} stale categories", mismatches.len());
        }
        Ok(mismatches)
    }
}
