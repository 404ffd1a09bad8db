//! Visibility filter for tree reads
//!
//! A `Visibility` value names the categories that listings must skip. It is
//! passed explicitly to [`crate::TreeReader`], so callers with different views
//! never share state and nothing needs resetting between units of work.
//!
//! Hidden categories still exist in storage. They disappear from `roots`,
//! `children`, `siblings`, `self_and_siblings` and direct lookup; their own
//! descendants are filtered only if they are hidden too.

use crate::models::category::{id_from_json, Category, CategoryId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ordered set of hidden category ids
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visibility {
    hidden: Vec<CategoryId>,
}

impl Visibility {
    /// Nothing hidden
    pub fn none() -> Self {
        Self::default()
    }

    /// Hide the given ids
    ///
    /// Non-positive ids are dropped and duplicates keep their first position.
    pub fn from_ids<I>(ids: I) -> Self
    where
        I: IntoIterator<Item = CategoryId>,
    {
        let mut visibility = Self::none();
        visibility.set_hidden(ids);
        visibility
    }

    /// Coerce untyped input into a hidden set
    ///
    /// Anything that is not an array yields the empty set. Inside an array,
    /// positive integers and strings of ASCII digits are kept; `null`, zero,
    /// negatives, fractions and non-numeric values are discarded.
    pub fn from_json(value: &Value) -> Self {
        let Value::Array(items) = value else {
            return Self::none();
        };

        Self::from_ids(items.iter().filter_map(id_from_json))
    }

    /// Replace the hidden set
    pub fn set_hidden<I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = CategoryId>,
    {
        self.hidden.clear();
        for id in ids {
            if id > 0 && !self.hidden.contains(&id) {
                self.hidden.push(id);
            }
        }
    }

    /// Hidden ids in first-seen order
    pub fn hidden(&self) -> &[CategoryId] {
        &self.hidden
    }

    pub fn is_empty(&self) -> bool {
        self.hidden.is_empty()
    }

    pub fn is_hidden(&self, id: CategoryId) -> bool {
        self.hidden.contains(&id)
    }

    pub fn is_hidden_category(&self, category: &Category) -> bool {
        self.is_hidden(category.id)
    }

    /// SQL condition excluding hidden rows, for appending to a `WHERE` clause
    ///
    /// Returns an empty string when nothing is hidden. Otherwise returns
    /// `"<connector> id NOT IN (..)"`, or just `"id NOT IN (..)"` when
    /// `connector` is empty. Ids are integers, so inlining them is safe.
    pub fn exclusion_clause(&self, connector: &str) -> String {
        if self.hidden.is_empty() {
            return String::new();
        }

        let ids = self
            .hidden
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let connector = connector.trim();

        if connector.is_empty() {
            format!("id NOT IN ({})", ids)
        } else {
            format!("{} id NOT IN ({})", connector, ids)
        }
    }
}
