//! Event Emission Tests
//!
//! Tests that every committed mutation emits exactly one event per change,
//! and that rejected mutations emit nothing.

#[cfg(test)]
mod event_emission_tests {
    use anyhow::Result;
    use canopy_core::{
        CategoryUpdate, DatabaseService, NewCategory, TreeEvent, TreeService,
    };
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio::sync::broadcast::error::TryRecvError;
    use tokio::time::{timeout, Duration};

    /// Helper to create test service
    async fn create_test_service() -> Result<(TreeService, TempDir)> {
        let temp_dir = TempDir::new()?;
        let db_path = temp_dir.path().join("test.db");
        let db = Arc::new(DatabaseService::new(db_path).await?);
        Ok((TreeService::new(db), temp_dir))
    }

    async fn next_event(rx: &mut tokio::sync::broadcast::Receiver<TreeEvent>) -> TreeEvent {
        timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("Event should be emitted within 1 second")
            .expect("Should receive event")
    }

    #[tokio::test]
    async fn test_create_emits_created_event() -> Result<()> {
        let (service, _temp_dir) = create_test_service().await?;
        let mut rx = service.subscribe();

        let created = service.create(NewCategory::root("Books")).await?;

        match next_event(&mut rx).await {
            TreeEvent::Created { category } => {
                assert_eq!(category.id(), created.id());
                assert_eq!(category.name(), "Books");
                assert_eq!(category.position(), 1);
            }
            other => panic!("Expected Created event, got {:?}", other),
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_move_emits_moved_event() -> Result<()> {
        let (service, _temp_dir) = create_test_service().await?;
        let a = service.create(NewCategory::root("a")).await?;
        let b = service.create(NewCategory::root("b")).await?;

        let mut rx = service.subscribe();
        service.move_category(b.id(), Some(a.id())).await?;

        match next_event(&mut rx).await {
            TreeEvent::Moved {
                id,
                old_parent_id,
                new_parent_id,
            } => {
                assert_eq!(id, b.id());
                assert_eq!(old_parent_id, None);
                assert_eq!(new_parent_id, Some(a.id()));
            }
            other => panic!("Expected Moved event, got {:?}", other),
        }
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
        Ok(())
    }

    #[tokio::test]
    async fn test_rename_emits_updated_event() -> Result<()> {
        let (service, _temp_dir) = create_test_service().await?;
        let a = service.create(NewCategory::root("a")).await?;

        let mut rx = service.subscribe();
        service
            .update(a.id(), CategoryUpdate::new().with_name("renamed"))
            .await?;

        match next_event(&mut rx).await {
            TreeEvent::Updated { category } => assert_eq!(category.name(), "renamed"),
            other => panic!("Expected Updated event, got {:?}", other),
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_emits_deleted_event_with_subtree() -> Result<()> {
        let (service, _temp_dir) = create_test_service().await?;
        let a = service.create(NewCategory::root("a")).await?;
        let a1 = service.create(NewCategory::child("a1", a.id())).await?;

        let mut rx = service.subscribe();
        service.delete(a.id()).await?;

        match next_event(&mut rx).await {
            TreeEvent::Deleted { id, removed } => {
                assert_eq!(id, a.id());
                assert_eq!(removed, vec![a.id(), a1.id()]);
            }
            other => panic!("Expected Deleted event, got {:?}", other),
        }

        // Deleting again is a no-op and stays silent
        service.delete(a.id()).await?;
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
        Ok(())
    }

    #[tokio::test]
    async fn test_reorder_emits_reordered_event() -> Result<()> {
        let (service, _temp_dir) = create_test_service().await?;
        let a = service.create(NewCategory::root("a")).await?;
        let b = service.create(NewCategory::root("b")).await?;

        let mut rx = service.subscribe();
        service
            .apply_order("sortable_categories_0", &[b.id(), a.id()])
            .await?;

        match next_event(&mut rx).await {
            TreeEvent::Reordered { container, ids } => {
                assert_eq!(container.parent_id(), None);
                assert_eq!(ids, vec![b.id(), a.id()]);
            }
            other => panic!("Expected Reordered event, got {:?}", other),
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_rejected_mutations_emit_nothing() -> Result<()> {
        let (service, _temp_dir) = create_test_service().await?;
        let a = service.create(NewCategory::root("a")).await?;
        let a1 = service.create(NewCategory::child("a1", a.id())).await?;

        let mut rx = service.subscribe();
        assert!(service.move_category(a.id(), Some(a1.id())).await.is_err());
        assert!(service.create(NewCategory::child("x", 9876543210)).await.is_err());
        assert!(service
            .apply_order("sortable_categories_0", &[a1.id()])
            .await
            .is_err());

        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
        Ok(())
    }
}
