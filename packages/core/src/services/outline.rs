//! Outline
//!
//! Nested, render-ready snapshot of the visible tree. Each entry carries what
//! a sortable list widget needs: its container key, whether it opens or
//! closes its group, and its visible children. Hidden categories are left out
//! together with everything below them.

use crate::models::{Category, CategoryId, ContainerKey};
use crate::services::error::TreeError;
use crate::services::tree_reader::TreeReader;
use serde::Serialize;
use std::collections::HashMap;

/// One category in the outline
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlineEntry {
    pub category: Category,

    /// Key of the group this entry sits in (`sortable_categories_<parent or 0>`)
    pub container_key: String,

    /// First visible entry of its group
    pub first_in_group: bool,

    /// Last visible entry of its group
    pub last_in_group: bool,

    pub children: Vec<OutlineEntry>,
}

impl TreeReader {
    /// Build the visible tree as nested entries, roots first
    ///
    /// Built without recursion: a pre-order pass collects visible categories,
    /// then entries are assembled in reverse so children exist before parents.
    pub async fn outline(&self) -> Result<Vec<OutlineEntry>, TreeError> {
        let db = self.database();
        let conn = db.connect_with_timeout().await?;
        let categories = db
            .db_select_all(&conn, &self.visibility().exclusion_clause(""))
            .await?;

        let mut groups: HashMap<Option<CategoryId>, Vec<Category>> = HashMap::new();
        for category in categories {
            groups.entry(category.parent_id()).or_default().push(category);
        }
        for group in groups.values_mut() {
            group.sort_by_key(|c| (c.position(), c.id()));
        }

        // Pre-order over visible categories reachable from the visible roots
        let mut visited: Vec<(Category, bool, bool)> = Vec::new();
        let mut stack: Vec<(Category, bool, bool)> = Vec::new();
        Self::push_group(&mut stack, groups.remove(&None).unwrap_or_default());
        while let Some(item) = stack.pop() {
            let kids = groups.remove(&Some(item.0.id())).unwrap_or_default();
            visited.push(item);
            Self::push_group(&mut stack, kids);
        }

        // Assemble bottom-up
        let mut built: HashMap<Option<CategoryId>, Vec<OutlineEntry>> = HashMap::new();
        for (category, first_in_group, last_in_group) in visited.into_iter().rev() {
            let mut children = built.remove(&Some(category.id())).unwrap_or_default();
            // Reverse pre-order meets siblings last-to-first
            children.reverse();
            let container_key = ContainerKey::for_parent(category.parent_id()).to_string();
            built
                .entry(category.parent_id())
                .or_default()
                .push(OutlineEntry {
                    category,
                    container_key,
                    first_in_group,
                    last_in_group,
                    children,
                });
        }

        let mut roots = built.remove(&None).unwrap_or_default();
        roots.reverse();
        Ok(roots)
    }

    /// Push a position-ordered group so that popping yields it in order
    fn push_group(stack: &mut Vec<(Category, bool, bool)>, group: Vec<Category>) {
        let last = group.len().saturating_sub(1);
        for (index, category) in group.into_iter().enumerate().rev() {
            stack.push((category, index == 0, index == last));
        }
    }
}
