//! Category record and mutation inputs
//!
//! A `Category` is one node of the tree. The tree-maintenance fields
//! (`parent_id`, `position`, `ancestors_count`, `descendants_count`) are
//! written only by the tree service; application code reads them through
//! accessors and requests structural changes through [`CategoryUpdate`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Identifier of a category row (SQLite `INTEGER PRIMARY KEY`, always positive)
pub type CategoryId = i64;

/// Validation errors raised before any storage access
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Category {0} cannot be its own parent")]
    SelfParent(CategoryId),

    #[error("Category {id} cannot be moved under its own descendant {parent_id}")]
    ParentIsDescendant {
        id: CategoryId,
        parent_id: CategoryId,
    },

    #[error("Invalid parent reference: {0}")]
    InvalidParent(String),
}

/// Check that a parent identifier is usable as a row id
pub fn validate_parent_id(parent_id: CategoryId) -> Result<CategoryId, ValidationError> {
    if parent_id <= 0 {
        return Err(ValidationError::InvalidParent(format!(
            "parent id must be a positive integer, got {}",
            parent_id
        )));
    }
    Ok(parent_id)
}

/// Read a category id from JSON: an integer or a string of ASCII digits
///
/// Anything else is `None`; sign and range checks are left to the caller.
pub fn id_from_json(value: &Value) -> Option<CategoryId> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => {
            s.parse::<CategoryId>().ok()
        }
        _ => None,
    }
}

/// Coerce an untyped parent reference (JSON input) into a parent id
///
/// - `null` → root (`Ok(None)`)
/// - positive integer, or a string of ASCII digits → `Ok(Some(id))`
/// - zero, negative, fractional (including `0.0` and `2.0`), other strings,
///   booleans, arrays, objects → `ValidationError::InvalidParent`
pub fn parse_parent_id(value: &Value) -> Result<Option<CategoryId>, ValidationError> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => match n.as_i64() {
            Some(id) => validate_parent_id(id).map(Some),
            None => Err(ValidationError::InvalidParent(format!(
                "parent id must be an integer, got {}",
                n
            ))),
        },
        Value::String(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => s
            .parse::<CategoryId>()
            .map_err(|_| ValidationError::InvalidParent(format!("parent id out of range: {}", s)))
            .and_then(validate_parent_id)
            .map(Some),
        other => Err(ValidationError::InvalidParent(format!(
            "parent id must be an integer, got {}",
            other
        ))),
    }
}

/// One node of the category tree
///
/// Only the tree service writes these fields, so the record serializes for
/// events and outlines but is never built from untrusted input.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub(crate) id: CategoryId,
    pub(crate) parent_id: Option<CategoryId>,
    pub(crate) position: i64,
    pub(crate) ancestors_count: i64,
    pub(crate) descendants_count: i64,
    pub(crate) name: String,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) modified_at: DateTime<Utc>,
}

impl Category {
    pub fn id(&self) -> CategoryId {
        self.id
    }

    pub fn parent_id(&self) -> Option<CategoryId> {
        self.parent_id
    }

    /// 1-based rank within the sibling group
    pub fn position(&self) -> i64 {
        self.position
    }

    /// Cached number of nodes strictly above this one
    pub fn ancestors_count(&self) -> i64 {
        self.ancestors_count
    }

    /// Cached number of nodes strictly below this one
    pub fn descendants_count(&self) -> i64 {
        self.descendants_count
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn modified_at(&self) -> DateTime<Utc> {
        self.modified_at
    }

    /// Check if this category is a root (no parent)
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Check if this category has no descendants, using the cached counter
    pub fn is_leaf(&self) -> bool {
        self.descendants_count == 0
    }

    /// Depth below the root (roots are depth 0)
    pub fn depth(&self) -> i64 {
        self.ancestors_count
    }
}

/// Input for creating a category
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCategory {
    /// Display name
    #[serde(default)]
    pub name: String,

    /// Parent to attach under (`None` creates a root)
    #[serde(default)]
    pub parent_id: Option<CategoryId>,
}

impl NewCategory {
    /// A new root category
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent_id: None,
        }
    }

    /// A new category under `parent_id`
    pub fn child(name: impl Into<String>, parent_id: CategoryId) -> Self {
        Self {
            name: name.into(),
            parent_id: Some(parent_id),
        }
    }

    /// Build from untyped JSON input such as `{"name": "Books", "parentId": 3}`
    ///
    /// `parentId` (or `parent_id`) goes through [`parse_parent_id`], so malformed
    /// references are rejected before any storage access.
    pub fn from_json(value: &Value) -> Result<Self, ValidationError> {
        let name = value
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let parent = value
            .get("parentId")
            .or_else(|| value.get("parent_id"))
            .unwrap_or(&Value::Null);

        Ok(Self {
            name,
            parent_id: parse_parent_id(parent)?,
        })
    }

    /// Validate the typed input
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(parent_id) = self.parent_id {
            validate_parent_id(parent_id)?;
        }
        Ok(())
    }
}

/// Maps a present JSON field (value or null) to `Some(..)` for double-Option fields.
///
/// - Missing field → None (don't update)
/// - null → Some(None) (make the category a root)
/// - 5 → Some(Some(5)) (move under category 5)
fn deserialize_optional_field<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Some(Option::<T>::deserialize(deserializer)?))
}

/// Partial category update
///
/// `parent_id` uses the double-`Option` pattern:
///
/// - `None`: leave the parent unchanged
/// - `Some(None)`: detach and make the category a root
/// - `Some(Some(id))`: move the category under `id`
///
/// A parent change is executed as a reparent, so it is subject to the same
/// cycle checks and counter maintenance as [`crate::TreeService::move_category`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(
        default,
        deserialize_with = "deserialize_optional_field",
        skip_serializing_if = "Option::is_none"
    )]
    pub parent_id: Option<Option<CategoryId>>,
}

impl CategoryUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_parent(mut self, parent_id: Option<CategoryId>) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Check if the update changes nothing
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.parent_id.is_none()
    }
}

/// Outcome of a delete (idempotent: deleting a missing id is not an error)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    /// Whether the category existed before the delete
    pub existed: bool,

    /// Every removed id: the category itself followed by its subtree
    pub removed: Vec<CategoryId>,
}

impl DeleteResult {
    pub fn not_found() -> Self {
        Self {
            existed: false,
            removed: Vec::new(),
        }
    }
}
