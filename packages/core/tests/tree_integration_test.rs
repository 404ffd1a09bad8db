//! Integration tests for the category tree
//!
//! Tests cover:
//! - End-to-end build, hide, delete and reorder on the reference tree
//! - Persistence across reopening the database
//! - Concurrent mutations from several tasks
//! - Configuration-driven startup

use anyhow::Result;
use canopy_core::{
    CanopyConfig, Category, CategoryId, DatabaseService, NewCategory, TreeError, TreeService,
    Visibility,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tempfile::TempDir;

/// Test helper: Create a test environment
async fn create_test_env() -> Result<(TreeService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let db = Arc::new(DatabaseService::new(db_path).await?);
    Ok((TreeService::new(db), temp_dir))
}

async fn create(
    service: &TreeService,
    name: &str,
    parent_id: Option<CategoryId>,
) -> Result<CategoryId> {
    let new = match parent_id {
        Some(parent_id) => NewCategory::child(name, parent_id),
        None => NewCategory::root(name),
    };
    Ok(service.create(new).await?.id())
}

fn names(categories: &[Category]) -> Vec<&str> {
    categories.iter().map(Category::name).collect()
}

// =========================================================================
// End-to-end
// =========================================================================

#[tokio::test]
async fn test_reference_tree_end_to_end() -> Result<()> {
    let (service, _temp_dir) = create_test_env().await?;

    let r1 = create(&service, "r1", None).await?;
    let r2 = create(&service, "r2", None).await?;
    let _r3 = create(&service, "r3", None).await?;
    let r11 = create(&service, "r11", Some(r1)).await?;
    let r21 = create(&service, "r21", Some(r2)).await?;
    let r22 = create(&service, "r22", Some(r2)).await?;
    create(&service, "r111", Some(r11)).await?;
    create(&service, "r211", Some(r21)).await?;
    let r221 = create(&service, "r221", Some(r22)).await?;

    let reader = service.reader(Visibility::none());
    assert_eq!(names(&reader.ancestors(r221).await?), vec!["r22", "r2"]);
    assert_eq!(
        names(&reader.descendants(r2).await?),
        vec!["r21", "r211", "r22", "r221"]
    );
    assert_eq!(names(&reader.roots().await?), vec!["r1", "r2", "r3"]);

    // Hiding r22 trims r2's children but leaves the roots alone
    let hidden = service.reader(Visibility::from_ids([r22]));
    assert_eq!(names(&hidden.children(r2).await?), vec!["r21"]);
    assert_eq!(names(&hidden.roots().await?), vec!["r1", "r2", "r3"]);

    // Reorder r2's children
    service
        .apply_order(&format!("sortable_categories_{}", r2), &[r22, r21])
        .await?;
    assert_eq!(reader.find(r22).await?.position(), 1);
    assert_eq!(reader.find(r21).await?.position(), 2);

    // Delete r21: group renumbered, r2 loses r21 and r211
    service.delete(r21).await?;
    assert_eq!(reader.find(r22).await?.position(), 1);
    assert_eq!(reader.find(r2).await?.descendants_count(), 2);
    assert_eq!(reader.count().await?, 7);

    // Cascade delete of r1 drops r11 and r111 as well
    let deleted = service.delete(r1).await?;
    assert_eq!(deleted.removed.len(), 3);
    assert_eq!(reader.count().await?, 4);
    assert_eq!(names(&reader.roots().await?), vec!["r2", "r3"]);
    assert_eq!(reader.find(r2).await?.position(), 1);

    assert!(service.verify_counters().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_visibility_from_untyped_input() -> Result<()> {
    let (service, _temp_dir) = create_test_env().await?;

    let a = create(&service, "a", None).await?;
    create(&service, "b", None).await?;
    create(&service, "c", None).await?;

    let visibility = Visibility::from_json(&serde_json::json!([a, "3", "string", 0]));
    assert_eq!(visibility.hidden(), &[a, 3]);

    let reader = service.reader(visibility);
    assert_eq!(names(&reader.roots().await?), vec!["b"]);
    assert!(reader.get(a).await?.is_none());
    assert_eq!(reader.group_size(None).await?, 3);
    Ok(())
}

// =========================================================================
// Persistence
// =========================================================================

#[tokio::test]
async fn test_tree_survives_reopen() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");

    let (root, leaf) = {
        let service = TreeService::new(Arc::new(DatabaseService::new(db_path.clone()).await?));
        let root = create(&service, "root", None).await?;
        let mid = create(&service, "mid", Some(root)).await?;
        let leaf = create(&service, "leaf", Some(mid)).await?;
        (root, leaf)
    };

    let service = TreeService::new(Arc::new(DatabaseService::new(db_path).await?));
    let reader = service.reader(Visibility::none());

    let root_category = reader.find(root).await?;
    assert_eq!(root_category.descendants_count(), 2);
    assert_eq!(reader.find(leaf).await?.ancestors_count(), 2);
    assert_eq!(reader.root(leaf).await?.id(), root);
    assert!(root_category.created_at() <= root_category.modified_at());
    Ok(())
}

#[tokio::test]
async fn test_open_from_config_file() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config_path = temp_dir.path().join("canopy.json");
    let db_path = temp_dir.path().join("nested").join("tree.db");

    std::fs::write(
        &config_path,
        serde_json::json!({
            "databasePath": db_path,
            "busyTimeoutMs": 2000
        })
        .to_string(),
    )?;

    let config = CanopyConfig::from_json_file(&config_path).map_err(anyhow::Error::msg)?;
    assert!(config.wal_mode);

    let db = DatabaseService::from_config(&config).await?;
    assert!(db_path.exists());

    let service = TreeService::new(Arc::new(db));
    create(&service, "root", None).await?;
    assert_eq!(service.reader(Visibility::none()).count().await?, 1);
    Ok(())
}

// =========================================================================
// Concurrency
// =========================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_keep_positions_dense() -> Result<()> {
    let (service, _temp_dir) = create_test_env().await?;
    let service = Arc::new(service);
    let parent = create(&service, "parent", None).await?;

    let mut handles = Vec::new();
    for i in 0..16 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            service
                .create(NewCategory::child(format!("child {}", i), parent))
                .await
        }));
    }
    for handle in handles {
        handle.await??;
    }

    let reader = service.reader(Visibility::none());
    let children = reader.children(parent).await?;
    let positions: Vec<i64> = children.iter().map(Category::position).collect();
    assert_eq!(positions, (1..=16).collect::<Vec<i64>>());
    assert_eq!(reader.find(parent).await?.descendants_count(), 16);
    assert!(service.verify_counters().await?.is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_moves_keep_counters_exact() -> Result<()> {
    let (service, _temp_dir) = create_test_env().await?;
    let service = Arc::new(service);

    let left = create(&service, "left", None).await?;
    let right = create(&service, "right", None).await?;
    let mut leaves = Vec::new();
    for i in 0..8 {
        leaves.push(create(&service, &format!("leaf {}", i), Some(left)).await?);
    }

    let mut handles = Vec::new();
    for (i, leaf) in leaves.into_iter().enumerate() {
        let service = Arc::clone(&service);
        let target = if i % 2 == 0 { right } else { left };
        handles.push(tokio::spawn(async move {
            service.move_category(leaf, Some(target)).await
        }));
    }
    for handle in handles {
        handle.await??;
    }

    let reader = service.reader(Visibility::none());
    assert_eq!(reader.find(left).await?.descendants_count(), 4);
    assert_eq!(reader.find(right).await?.descendants_count(), 4);
    assert!(service.verify_counters().await?.is_empty());
    Ok(())
}

// =========================================================================
// Reordering endpoint payloads
// =========================================================================

#[tokio::test]
async fn test_multi_group_reorder() -> Result<()> {
    let (service, _temp_dir) = create_test_env().await?;

    let a = create(&service, "a", None).await?;
    let b = create(&service, "b", None).await?;
    let a1 = create(&service, "a1", Some(a)).await?;
    let a2 = create(&service, "a2", Some(a)).await?;

    let orders = BTreeMap::from([
        ("sortable_categories_0".to_string(), vec![b, a]),
        (format!("sortable_categories_{}", a), vec![a2, a1]),
    ]);
    let applied = service.update_positions(&orders).await?;
    assert_eq!(applied.len(), 2);

    let reader = service.reader(Visibility::none());
    assert_eq!(names(&reader.roots().await?), vec!["b", "a"]);
    assert_eq!(names(&reader.children(a).await?), vec!["a2", "a1"]);

    let result = service
        .update_positions(&BTreeMap::from([(
            "sortable_categories_0".to_string(),
            vec![a],
        )]))
        .await;
    assert!(matches!(result, Err(TreeError::InvalidArgument(_))));
    Ok(())
}
