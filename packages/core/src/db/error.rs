//! Storage errors for the category database
//!
//! Everything that can go wrong below the tree services: opening the file,
//! preparing the schema, running a statement, or reading a row back. Rule
//! violations (cycles, missing parents, bad reorder requests) are reported by
//! `TreeError` in the service layer instead.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    /// The configured path is not usable as a database file
    #[error("Not a database file path: {path}")]
    InvalidPath { path: PathBuf },

    /// The directory holding the database could not be created
    #[error("Cannot create database directory for {path}: {source}")]
    Directory {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to open category database at {path}: {source}")]
    Open {
        path: PathBuf,
        source: libsql::Error,
    },

    /// Configuration, pragmas or schema creation failed
    #[error("Database setup failed: {0}")]
    Setup(String),

    /// Any other libsql failure (connecting, stepping rows, reading columns)
    #[error("libsql error: {0}")]
    Libsql(#[from] libsql::Error),

    /// A statement was rejected; the context names what it was doing
    #[error("Statement failed: {context}")]
    Statement { context: String },

    /// A stored row does not decode into a category
    #[error("Invalid category row: {context}")]
    InvalidRow { context: String },
}

impl DatabaseError {
    pub fn invalid_path(path: PathBuf) -> Self {
        Self::InvalidPath { path }
    }

    pub fn directory(path: PathBuf, source: std::io::Error) -> Self {
        Self::Directory { path, source }
    }

    pub fn open(path: PathBuf, source: libsql::Error) -> Self {
        Self::Open { path, source }
    }

    pub fn setup(msg: impl Into<String>) -> Self {
        Self::Setup(msg.into())
    }

    pub fn statement(context: impl Into<String>) -> Self {
        Self::Statement {
            context: context.into(),
        }
    }

    pub fn invalid_row(context: impl Into<String>) -> Self {
        Self::InvalidRow {
            context: context.into(),
        }
    }

    /// Whether SQLite rejected the statement because of a foreign key
    pub fn is_foreign_key_violation(&self) -> bool {
        self.to_string().contains("FOREIGN KEY constraint failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_foreign_key_violation_detection() {
        let err = DatabaseError::statement(
            "Failed to insert category: SQLite failure: `FOREIGN KEY constraint failed`",
        );
        assert!(err.is_foreign_key_violation());

        let err = DatabaseError::statement("Failed to insert category: disk I/O error");
        assert!(!err.is_foreign_key_violation());
    }

    #[test]
    fn test_messages_name_the_path() {
        let err = DatabaseError::directory(
            PathBuf::from("/readonly/tree.db"),
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert!(err.to_string().contains("/readonly/tree.db"));
        assert!(DatabaseError::setup("busy timeout must be positive")
            .to_string()
            .starts_with("Database setup failed"));
    }
}
