//! Database Connection Management
//!
//! This module provides the database connection, schema bootstrap and the
//! row-level SQL used by the tree services, on top of libsql (embedded SQLite).
//!
//! # Architecture
//!
//! - **Path-agnostic**: Accepts any valid PathBuf
//! - **WAL mode**: Readers proceed while one writer holds the lock
//! - **Foreign keys**: Enabled on every connection for referential integrity
//! - **Idempotent bootstrap**: `CREATE TABLE/INDEX IF NOT EXISTS`
//!
//! # Transactions
//!
//! Every `db_*` method takes a `&libsql::Connection` so the tree services can
//! run several statements inside one transaction opened with
//! [`DatabaseService::begin_immediate`]. `BEGIN IMMEDIATE` takes the write lock
//! up front, so two mutations never interleave between their reads and writes.
//!
//! # Async contexts
//!
//! Use `connect_with_timeout()` in async code. It configures the busy timeout
//! and foreign keys on the new connection; plain `connect()` does neither.

use crate::config::CanopyConfig;
use crate::db::error::DatabaseError;
use crate::models::{Category, CategoryId};
use chrono::{DateTime, NaiveDateTime, Utc};
use libsql::{Builder, Connection, Database, Row, Rows};
use std::path::PathBuf;
use std::sync::Arc;

/// Columns selected for every category read, in `row_to_category` order
const CATEGORY_COLUMNS: &str =
    "id, parent_id, position, ancestors_count, descendants_count, name, created_at, modified_at";

/// Database service for managing the libsql connection and schema
///
/// # Examples
///
/// ```no_run
/// use canopy_core::db::DatabaseService;
/// use std::path::PathBuf;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let db_service = DatabaseService::new(PathBuf::from("./data/canopy.db")).await?;
///     let conn = db_service.connect_with_timeout().await?;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DatabaseService {
    /// libsql database handle (wrapped in Arc for sharing)
    pub db: Arc<Database>,

    /// Path to the database file
    pub db_path: PathBuf,

    /// Busy timeout applied to every async connection
    busy_timeout_ms: u64,
}

/// Parameters for category insertion
pub struct DbInsertCategoryParams<'a> {
    pub parent_id: Option<CategoryId>,
    pub position: i64,
    pub ancestors_count: i64,
    pub name: &'a str,
}

impl DatabaseService {
    /// Open (or create) the database at `db_path` with default settings
    ///
    /// This will:
    /// 1. Ensure the parent directory exists (create if needed)
    /// 2. Open/create the database file
    /// 3. Initialize the schema (CREATE TABLE IF NOT EXISTS)
    /// 4. Enable WAL mode and foreign keys
    pub async fn new(db_path: PathBuf) -> Result<Self, DatabaseError> {
        Self::from_config(&CanopyConfig::with_database_path(db_path)).await
    }

    /// Open (or create) the database described by `config`
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if:
    /// - The configuration is invalid
    /// - Parent directory cannot be created
    /// - Database connection fails
    /// - Schema initialization fails
    pub async fn from_config(config: &CanopyConfig) -> Result<Self, DatabaseError> {
        config
            .validate()
            .map_err(DatabaseError::setup)?;

        let db_path = config.database_path.clone();
        if db_path.is_dir() {
            return Err(DatabaseError::invalid_path(db_path));
        }

        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| DatabaseError::directory(db_path.clone(), e))?;
            }
        }

        let db = Builder::new_local(&db_path)
            .build()
            .await
            .map_err(|e| DatabaseError::open(db_path.clone(), e))?;

        let service = Self {
            db: Arc::new(db),
            db_path,
            busy_timeout_ms: config.busy_timeout_ms,
        };

        service.initialize_schema(config.wal_mode).await?;

        tracing::debug!("Opened category database at {:?}", service.db_path);
        Ok(service)
    }

    /// Execute a PRAGMA statement
    ///
    /// PRAGMA statements return rows, so we must use query() instead of execute().
    async fn execute_pragma(&self, conn: &Connection, pragma: &str) -> Result<(), DatabaseError> {
        let mut stmt = conn.prepare(pragma).await.map_err(|e| {
            DatabaseError::statement(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        let _ = stmt.query(()).await.map_err(|e| {
            DatabaseError::statement(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        Ok(())
    }

    /// Initialize database schema and configuration
    ///
    /// # Schema
    ///
    /// - `categories` table: one row per tree node with its cached counters
    /// - `idx_categories_parent_position`: sibling group scans in order
    async fn initialize_schema(&self, wal_mode: bool) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        if wal_mode {
            self.execute_pragma(&conn, "PRAGMA journal_mode = WAL")
                .await?;
        }

        conn.execute(
            "CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                parent_id INTEGER,
                position INTEGER NOT NULL CHECK (position > 0),
                ancestors_count INTEGER NOT NULL DEFAULT 0 CHECK (ancestors_count >= 0),
                descendants_count INTEGER NOT NULL DEFAULT 0 CHECK (descendants_count >= 0),
                name TEXT NOT NULL DEFAULT '',
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                modified_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                -- Subtrees are removed explicitly; the cascade is a backstop
                FOREIGN KEY (parent_id) REFERENCES categories(id) ON DELETE CASCADE
            )",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::setup(format!(
                "Failed to create categories table: {}",
                e
            ))
        })?;

        // Not UNIQUE: renumbering passes through duplicate positions mid-transaction
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_categories_parent_position
             ON categories(parent_id, position)",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::setup(format!(
                "Failed to create index 'idx_categories_parent_position': {}",
                e
            ))
        })?;

        Ok(())
    }

    /// Get a synchronous connection to the database
    ///
    /// Does not configure the busy timeout or foreign keys; prefer
    /// `connect_with_timeout()` in async code.
    pub fn connect(&self) -> Result<Connection, DatabaseError> {
        self.db.connect().map_err(DatabaseError::Libsql)
    }

    /// Get an async connection with busy timeout and foreign keys configured
    ///
    /// Concurrent writers wait up to the configured busy timeout for the
    /// write lock instead of failing with `SQLITE_BUSY`.
    pub async fn connect_with_timeout(&self) -> Result<Connection, DatabaseError> {
        let conn = self.connect()?;

        self.execute_pragma(
            &conn,
            &format!("PRAGMA busy_timeout = {}", self.busy_timeout_ms),
        )
        .await?;

        // Foreign key enforcement is per connection in SQLite
        self.execute_pragma(&conn, "PRAGMA foreign_keys = ON")
            .await?;

        Ok(conn)
    }

    //
    // TRANSACTIONS
    //

    /// Begin a write transaction, taking the database write lock immediately
    pub async fn begin_immediate(&self, conn: &Connection) -> Result<(), DatabaseError> {
        conn.execute("BEGIN IMMEDIATE", ()).await.map_err(|e| {
            DatabaseError::statement(format!("Failed to begin transaction: {}", e))
        })?;
        Ok(())
    }

    /// Commit the open transaction, rolling back if the commit fails
    pub async fn commit(&self, conn: &Connection) -> Result<(), DatabaseError> {
        if let Err(e) = conn.execute("COMMIT", ()).await {
            self.rollback(conn).await;
            return Err(DatabaseError::statement(format!(
                "Failed to commit transaction: {}",
                e
            )));
        }
        Ok(())
    }

    /// Roll back the open transaction
    pub async fn rollback(&self, conn: &Connection) {
        if let Err(e) = conn.execute("ROLLBACK", ()).await {
            tracing::warn!("Failed to roll back transaction: {}", e);
        }
    }

    //
    // ROW CONVERSION
    //

    /// Parse timestamp from database - handles both SQLite and RFC3339 formats
    ///
    /// SQLite CURRENT_TIMESTAMP returns: "YYYY-MM-DD HH:MM:SS"
    fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
            return Ok(naive.and_utc());
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(dt.with_timezone(&Utc));
        }

        Err(DatabaseError::invalid_row(format!(
            "Unable to parse timestamp '{}' as SQLite or RFC3339 format",
            s
        )))
    }

    /// Convert a row selected with `CATEGORY_COLUMNS` into a Category
    fn row_to_category(row: &Row) -> Result<Category, DatabaseError> {
        let column = |name: &str, e: libsql::Error| {
            DatabaseError::invalid_row(format!("Failed to get {}: {}", name, e))
        };

        let created_at: String = row.get(6).map_err(|e| column("created_at", e))?;
        let modified_at: String = row.get(7).map_err(|e| column("modified_at", e))?;

        Ok(Category {
            id: row.get(0).map_err(|e| column("id", e))?,
            parent_id: row.get(1).map_err(|e| column("parent_id", e))?,
            position: row.get(2).map_err(|e| column("position", e))?,
            ancestors_count: row.get(3).map_err(|e| column("ancestors_count", e))?,
            descendants_count: row.get(4).map_err(|e| column("descendants_count", e))?,
            name: row.get(5).map_err(|e| column("name", e))?,
            created_at: Self::parse_timestamp(&created_at)?,
            modified_at: Self::parse_timestamp(&modified_at)?,
        })
    }

    async fn collect_categories(mut rows: Rows) -> Result<Vec<Category>, DatabaseError> {
        let mut categories = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::statement(format!("Failed to fetch row: {}", e)))?
        {
            categories.push(Self::row_to_category(&row)?);
        }
        Ok(categories)
    }

    async fn collect_ids(mut rows: Rows) -> Result<Vec<CategoryId>, DatabaseError> {
        let mut ids = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::statement(format!("Failed to fetch row: {}", e)))?
        {
            ids.push(
                row.get::<i64>(0)
                    .map_err(|e| DatabaseError::invalid_row(format!("Failed to get id: {}", e)))?,
            );
        }
        Ok(ids)
    }

    async fn query_scalar(
        conn: &Connection,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<i64, DatabaseError> {
        let mut rows = conn
            .query(sql, params)
            .await
            .map_err(|e| DatabaseError::statement(format!("Failed to execute query: {}", e)))?;
        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::statement(format!("Failed to fetch row: {}", e)))?
            .ok_or_else(|| DatabaseError::statement("Scalar query returned no rows"))?;
        row.get::<i64>(0)
            .map_err(|e| DatabaseError::invalid_row(format!("Failed to get scalar: {}", e)))
    }

    /// Comma-separated id list for `IN (..)` clauses (ids are integers)
    fn id_list(ids: &[CategoryId]) -> String {
        ids.iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    //
    // CATEGORY OPERATIONS
    //

    /// Insert a category row and return its new id
    ///
    /// `descendants_count` starts at 0; the caller owns position and counter
    /// correctness.
    pub async fn db_insert_category(
        &self,
        conn: &Connection,
        params: DbInsertCategoryParams<'_>,
    ) -> Result<CategoryId, DatabaseError> {
        conn.execute(
            "INSERT INTO categories (parent_id, position, ancestors_count, descendants_count, name)
             VALUES (?, ?, ?, 0, ?)",
            (
                params.parent_id,
                params.position,
                params.ancestors_count,
                params.name,
            ),
        )
        .await
        .map_err(|e| DatabaseError::statement(format!("Failed to insert category: {}", e)))?;

        Ok(conn.last_insert_rowid())
    }

    /// Fetch one category by id
    ///
    /// `filter` is appended to the `WHERE` clause (e.g. a visibility
    /// exclusion starting with `AND`); pass `""` for an unfiltered lookup.
    pub async fn db_get_category(
        &self,
        conn: &Connection,
        id: CategoryId,
        filter: &str,
    ) -> Result<Option<Category>, DatabaseError> {
        let rows = conn
            .query(
                &format!(
                    "SELECT {} FROM categories WHERE id = ? {}",
                    CATEGORY_COLUMNS, filter
                ),
                [id],
            )
            .await
            .map_err(|e| {
                DatabaseError::statement(format!("Failed to execute get_category: {}", e))
            })?;

        Ok(Self::collect_categories(rows).await?.into_iter().next())
    }

    /// Fetch a sibling group ordered by position
    ///
    /// `parent_id = None` selects the roots (`parent_id IS NULL`).
    pub async fn db_select_group(
        &self,
        conn: &Connection,
        parent_id: Option<CategoryId>,
        filter: &str,
    ) -> Result<Vec<Category>, DatabaseError> {
        let rows = conn
            .query(
                &format!(
                    "SELECT {} FROM categories WHERE parent_id IS ? {} ORDER BY position, id",
                    CATEGORY_COLUMNS, filter
                ),
                [parent_id],
            )
            .await
            .map_err(|e| {
                DatabaseError::statement(format!("Failed to select sibling group: {}", e))
            })?;

        Self::collect_categories(rows).await
    }

    /// Ids of a sibling group ordered by position
    pub async fn db_group_ids(
        &self,
        conn: &Connection,
        parent_id: Option<CategoryId>,
    ) -> Result<Vec<CategoryId>, DatabaseError> {
        let rows = conn
            .query(
                "SELECT id FROM categories WHERE parent_id IS ? ORDER BY position, id",
                [parent_id],
            )
            .await
            .map_err(|e| {
                DatabaseError::statement(format!("Failed to select sibling ids: {}", e))
            })?;

        Self::collect_ids(rows).await
    }

    /// Number of categories in a sibling group (hidden ones included)
    pub async fn db_count_group(
        &self,
        conn: &Connection,
        parent_id: Option<CategoryId>,
    ) -> Result<i64, DatabaseError> {
        Self::query_scalar(
            conn,
            "SELECT COUNT(*) FROM categories WHERE parent_id IS ?",
            [parent_id],
        )
        .await
    }

    /// Total number of categories
    pub async fn db_count(&self, conn: &Connection) -> Result<i64, DatabaseError> {
        Self::query_scalar(conn, "SELECT COUNT(*) FROM categories", ()).await
    }

    /// Every category ordered by id
    pub async fn db_select_all(
        &self,
        conn: &Connection,
        filter: &str,
    ) -> Result<Vec<Category>, DatabaseError> {
        let where_clause = if filter.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", filter)
        };

        let rows = conn
            .query(
                &format!(
                    "SELECT {} FROM categories {} ORDER BY id",
                    CATEGORY_COLUMNS, where_clause
                ),
                (),
            )
            .await
            .map_err(|e| {
                DatabaseError::statement(format!("Failed to select categories: {}", e))
            })?;

        Self::collect_categories(rows).await
    }

    /// Ancestors of a category, nearest first
    pub async fn db_ancestors(
        &self,
        conn: &Connection,
        id: CategoryId,
    ) -> Result<Vec<Category>, DatabaseError> {
        let rows = conn
            .query(
                &format!(
                    "WITH RECURSIVE chain(id, parent_id, depth) AS (
                        SELECT id, parent_id, 0 FROM categories WHERE id = ?
                        UNION ALL
                        SELECT c.id, c.parent_id, chain.depth + 1
                        FROM categories c JOIN chain ON c.id = chain.parent_id
                    )
                    SELECT {} FROM categories
                    JOIN chain USING (id)
                    WHERE chain.depth > 0
                    ORDER BY chain.depth",
                    Self::qualified_columns("categories")
                ),
                [id],
            )
            .await
            .map_err(|e| DatabaseError::statement(format!("Failed to walk ancestors: {}", e)))?;

        Self::collect_categories(rows).await
    }

    /// Ancestor ids of a category, nearest first
    pub async fn db_ancestor_ids(
        &self,
        conn: &Connection,
        id: CategoryId,
    ) -> Result<Vec<CategoryId>, DatabaseError> {
        let rows = conn
            .query(
                "WITH RECURSIVE chain(id, parent_id, depth) AS (
                    SELECT id, parent_id, 0 FROM categories WHERE id = ?
                    UNION ALL
                    SELECT c.id, c.parent_id, chain.depth + 1
                    FROM categories c JOIN chain ON c.id = chain.parent_id
                )
                SELECT id FROM chain WHERE depth > 0 ORDER BY depth",
                [id],
            )
            .await
            .map_err(|e| DatabaseError::statement(format!("Failed to walk ancestors: {}", e)))?;

        Self::collect_ids(rows).await
    }

    /// Every category strictly below `id`, in no particular order
    pub async fn db_subtree(
        &self,
        conn: &Connection,
        id: CategoryId,
    ) -> Result<Vec<Category>, DatabaseError> {
        let rows = conn
            .query(
                &format!(
                    "WITH RECURSIVE subtree(id) AS (
                        SELECT id FROM categories WHERE parent_id = ?
                        UNION ALL
                        SELECT c.id FROM categories c JOIN subtree s ON c.parent_id = s.id
                    )
                    SELECT {} FROM categories WHERE id IN (SELECT id FROM subtree)",
                    CATEGORY_COLUMNS
                ),
                [id],
            )
            .await
            .map_err(|e| DatabaseError::statement(format!("Failed to walk subtree: {}", e)))?;

        Self::collect_categories(rows).await
    }

    fn qualified_columns(table: &str) -> String {
        CATEGORY_COLUMNS
            .split(", ")
            .map(|column| format!("{}.{}", table, column))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Set one category's position
    pub async fn db_set_position(
        &self,
        conn: &Connection,
        id: CategoryId,
        position: i64,
    ) -> Result<u64, DatabaseError> {
        conn.execute(
            "UPDATE categories SET position = ?, modified_at = CURRENT_TIMESTAMP WHERE id = ?",
            (position, id),
        )
        .await
        .map_err(|e| DatabaseError::statement(format!("Failed to set position: {}", e)))
    }

    /// Attach a category to a new parent at `position`
    pub async fn db_set_parent(
        &self,
        conn: &Connection,
        id: CategoryId,
        parent_id: Option<CategoryId>,
        position: i64,
    ) -> Result<u64, DatabaseError> {
        conn.execute(
            "UPDATE categories SET parent_id = ?, position = ?, modified_at = CURRENT_TIMESTAMP
             WHERE id = ?",
            (parent_id, position, id),
        )
        .await
        .map_err(|e| DatabaseError::statement(format!("Failed to move category: {}", e)))
    }

    /// Rename a category
    pub async fn db_set_name(
        &self,
        conn: &Connection,
        id: CategoryId,
        name: &str,
    ) -> Result<u64, DatabaseError> {
        conn.execute(
            "UPDATE categories SET name = ?, modified_at = CURRENT_TIMESTAMP WHERE id = ?",
            (name, id),
        )
        .await
        .map_err(|e| DatabaseError::statement(format!("Failed to rename category: {}", e)))
    }

    /// Set `ancestors_count` for one category and reset `descendants_count`
    pub async fn db_init_counters(
        &self,
        conn: &Connection,
        id: CategoryId,
        ancestors_count: i64,
    ) -> Result<u64, DatabaseError> {
        conn.execute(
            "UPDATE categories SET ancestors_count = ?, descendants_count = 0 WHERE id = ?",
            (ancestors_count, id),
        )
        .await
        .map_err(|e| {
            DatabaseError::statement(format!("Failed to initialize counters: {}", e))
        })
    }

    /// Add `delta` to `descendants_count` of every listed category
    pub async fn db_adjust_descendants_count(
        &self,
        conn: &Connection,
        ids: &[CategoryId],
        delta: i64,
    ) -> Result<u64, DatabaseError> {
        if ids.is_empty() || delta == 0 {
            return Ok(0);
        }

        conn.execute(
            &format!(
                "UPDATE categories SET descendants_count = descendants_count + ? WHERE id IN ({})",
                Self::id_list(ids)
            ),
            [delta],
        )
        .await
        .map_err(|e| {
            DatabaseError::statement(format!("Failed to adjust descendants_count: {}", e))
        })
    }

    /// Add `delta` to `ancestors_count` of every listed category
    pub async fn db_adjust_ancestors_count(
        &self,
        conn: &Connection,
        ids: &[CategoryId],
        delta: i64,
    ) -> Result<u64, DatabaseError> {
        if ids.is_empty() || delta == 0 {
            return Ok(0);
        }

        conn.execute(
            &format!(
                "UPDATE categories SET ancestors_count = ancestors_count + ? WHERE id IN ({})",
                Self::id_list(ids)
            ),
            [delta],
        )
        .await
        .map_err(|e| {
            DatabaseError::statement(format!("Failed to adjust ancestors_count: {}", e))
        })
    }

    /// Delete the listed categories in one statement
    ///
    /// # Returns
    ///
    /// Number of rows affected
    pub async fn db_delete_categories(
        &self,
        conn: &Connection,
        ids: &[CategoryId],
    ) -> Result<u64, DatabaseError> {
        if ids.is_empty() {
            return Ok(0);
        }

        conn.execute(
            &format!("DELETE FROM categories WHERE id IN ({})", Self::id_list(ids)),
            (),
        )
        .await
        .map_err(|e| DatabaseError::statement(format!("Failed to delete categories: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open() -> (DatabaseService, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db_service = DatabaseService::new(db_path).await.unwrap();
        (db_service, temp_dir)
    }

    async fn insert(
        db: &DatabaseService,
        conn: &Connection,
        parent_id: Option<CategoryId>,
        position: i64,
        ancestors_count: i64,
    ) -> CategoryId {
        db.db_insert_category(
            conn,
            DbInsertCategoryParams {
                parent_id,
                position,
                ancestors_count,
                name: "",
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_database_creation() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let db_service = DatabaseService::new(db_path.clone()).await.unwrap();

        assert_eq!(db_service.db_path, db_path);
        assert!(db_path.exists());
    }

    #[tokio::test]
    async fn test_parent_directory_creation() {
        let temp_dir = TempDir::new().unwrap();
        let nested_path = temp_dir.path().join("nested").join("dirs").join("test.db");

        let _db_service = DatabaseService::new(nested_path.clone()).await.unwrap();

        assert!(nested_path.exists());
    }

    #[tokio::test]
    async fn test_directory_path_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let result = DatabaseService::new(temp_dir.path().to_path_buf()).await;
        assert!(matches!(result, Err(DatabaseError::InvalidPath { .. })));
    }

    #[tokio::test]
    async fn test_idempotent_initialization() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let _first = DatabaseService::new(db_path.clone()).await.unwrap();
        let second = DatabaseService::new(db_path).await.unwrap();

        let conn = second.connect_with_timeout().await.unwrap();
        assert_eq!(second.db_count(&conn).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_wal_mode_enabled() {
        let (db, _temp) = open().await;
        let conn = db.connect().unwrap();

        let mut rows = conn.query("PRAGMA journal_mode", ()).await.unwrap();
        let row = rows.next().await.unwrap().unwrap();
        let mode: String = row.get(0).unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }

    #[tokio::test]
    async fn test_foreign_keys_enabled_per_connection() {
        let (db, _temp) = open().await;
        let conn = db.connect_with_timeout().await.unwrap();

        let mut rows = conn.query("PRAGMA foreign_keys", ()).await.unwrap();
        let row = rows.next().await.unwrap().unwrap();
        let enabled: i64 = row.get(0).unwrap();
        assert_eq!(enabled, 1);

        let err = db
            .db_insert_category(
                &conn,
                DbInsertCategoryParams {
                    parent_id: Some(9876543210),
                    position: 1,
                    ancestors_count: 1,
                    name: "orphan",
                },
            )
            .await
            .unwrap_err();
        assert!(err.is_foreign_key_violation());
    }

    #[tokio::test]
    async fn test_insert_and_get_category() {
        let (db, _temp) = open().await;
        let conn = db.connect_with_timeout().await.unwrap();

        let id = db
            .db_insert_category(
                &conn,
                DbInsertCategoryParams {
                    parent_id: None,
                    position: 1,
                    ancestors_count: 0,
                    name: "Books",
                },
            )
            .await
            .unwrap();

        let category = db.db_get_category(&conn, id, "").await.unwrap().unwrap();
        assert_eq!(category.id(), id);
        assert_eq!(category.name(), "Books");
        assert_eq!(category.parent_id(), None);
        assert_eq!(category.position(), 1);
        assert_eq!(category.descendants_count(), 0);

        let filtered = db
            .db_get_category(&conn, id, &format!("AND id NOT IN ({})", id))
            .await
            .unwrap();
        assert!(filtered.is_none());
    }

    #[tokio::test]
    async fn test_ancestors_and_subtree_queries() {
        let (db, _temp) = open().await;
        let conn = db.connect_with_timeout().await.unwrap();

        let root = insert(&db, &conn, None, 1, 0).await;
        let child = insert(&db, &conn, Some(root), 1, 1).await;
        let grandchild = insert(&db, &conn, Some(child), 1, 2).await;
        let sibling = insert(&db, &conn, Some(root), 2, 1).await;

        assert_eq!(
            db.db_ancestor_ids(&conn, grandchild).await.unwrap(),
            vec![child, root]
        );
        let ancestors: Vec<CategoryId> = db
            .db_ancestors(&conn, grandchild)
            .await
            .unwrap()
            .iter()
            .map(Category::id)
            .collect();
        assert_eq!(ancestors, vec![child, root]);
        assert!(db.db_ancestor_ids(&conn, root).await.unwrap().is_empty());

        let mut subtree: Vec<CategoryId> = db
            .db_subtree(&conn, root)
            .await
            .unwrap()
            .iter()
            .map(Category::id)
            .collect();
        subtree.sort();
        assert_eq!(subtree, vec![child, grandchild, sibling]);

        assert_eq!(db.db_group_ids(&conn, Some(root)).await.unwrap(), vec![child, sibling]);
        assert_eq!(db.db_count_group(&conn, None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_rollback_discards_changes() {
        let (db, _temp) = open().await;
        let conn = db.connect_with_timeout().await.unwrap();

        db.begin_immediate(&conn).await.unwrap();
        insert(&db, &conn, None, 1, 0).await;
        db.rollback(&conn).await;

        assert_eq!(db.db_count(&conn).await.unwrap(), 0);
    }
}
