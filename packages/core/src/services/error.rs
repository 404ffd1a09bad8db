//! Service Layer Error Types
//!
//! Errors surfaced by the tree services. Validation and argument failures are
//! detected before any write; referential failures are reported whether the
//! service catches them first or SQLite rejects the statement.

use crate::db::DatabaseError;
use crate::models::{CategoryId, ValidationError};
use thiserror::Error;

/// Tree operation errors
#[derive(Error, Debug)]
pub enum TreeError {
    /// Structural rule violated (self-parent, cycle, malformed parent)
    #[error("Category validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Parent reference names no existing category
    #[error("Parent category {parent_id} does not exist")]
    ReferentialIntegrity { parent_id: CategoryId },

    /// Malformed request argument (container key, ordering payload)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Category not found by id
    #[error("Category not found: {id}")]
    NotFound { id: CategoryId },

    /// Database operation failed
    #[error("Database operation failed: {0}")]
    Database(#[from] DatabaseError),
}

impl TreeError {
    /// Create a referential integrity error
    pub fn referential_integrity(parent_id: CategoryId) -> Self {
        Self::ReferentialIntegrity { parent_id }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a not found error
    pub fn not_found(id: CategoryId) -> Self {
        Self::NotFound { id }
    }

    /// Map a storage failure raised while attaching under `parent_id`
    ///
    /// Foreign key rejections become `ReferentialIntegrity`; anything else
    /// stays a database error.
    pub fn from_attach_failure(err: DatabaseError, parent_id: Option<CategoryId>) -> Self {
        match parent_id {
            Some(parent_id) if err.is_foreign_key_violation() => {
                Self::referential_integrity(parent_id)
            }
            _ => Self::Database(err),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }

    pub fn is_referential_integrity(&self) -> bool {
        matches!(self, Self::ReferentialIntegrity { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attach_failure_mapping() {
        let fk = DatabaseError::statement("FOREIGN KEY constraint failed");
        assert!(TreeError::from_attach_failure(fk, Some(42)).is_referential_integrity());

        let fk = DatabaseError::statement("FOREIGN KEY constraint failed");
        assert!(matches!(
            TreeError::from_attach_failure(fk, None),
            TreeError::Database(_)
        ));

        let io = DatabaseError::statement("disk I/O error");
        assert!(matches!(
            TreeError::from_attach_failure(io, Some(1)),
            TreeError::Database(_)
        ));
    }

    #[test]
    fn test_error_classification() {
        assert!(TreeError::from(ValidationError::SelfParent(1)).is_validation());
        assert!(TreeError::invalid_argument("bad key").is_argument());
        assert_eq!(
            TreeError::not_found(9).to_string(),
            "Category not found: 9"
        );
    }
}
