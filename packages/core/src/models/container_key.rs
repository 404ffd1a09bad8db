//! Container keys for sibling groups
//!
//! Reordering endpoints identify a sibling group by a string key of the form
//! `sortable_categories_<parent id>`, with `0` standing for the root group.

use crate::models::category::CategoryId;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Prefix shared by every container key
pub const CONTAINER_KEY_PREFIX: &str = "sortable_categories_";

/// Key pattern: prefix followed by the parent id (digits only)
const CONTAINER_KEY_PATTERN: &str = r"^sortable_categories_(\d+)$";

/// Identifies one sibling group: the children of a parent, or the roots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerKey {
    parent_id: Option<CategoryId>,
}

impl ContainerKey {
    /// The group of root categories
    pub fn roots() -> Self {
        Self { parent_id: None }
    }

    pub fn for_parent(parent_id: Option<CategoryId>) -> Self {
        Self { parent_id }
    }

    pub fn parent_id(&self) -> Option<CategoryId> {
        self.parent_id
    }

    /// Parse `sortable_categories_<n>`; `None` if the key is malformed
    pub fn parse(key: &str) -> Option<Self> {
        static CONTAINER_KEY_REGEX: OnceLock<Regex> = OnceLock::new();
        let key_regex =
            CONTAINER_KEY_REGEX.get_or_init(|| Regex::new(CONTAINER_KEY_PATTERN).unwrap());

        let captures = key_regex.captures(key.trim())?;
        let parent_id = captures.get(1)?.as_str().parse::<CategoryId>().ok()?;

        Some(Self {
            parent_id: (parent_id != 0).then_some(parent_id),
        })
    }
}

impl fmt::Display for ContainerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", CONTAINER_KEY_PREFIX, self.parent_id.unwrap_or(0))
    }
}
